//! Static catalog of Apple build platforms and Boost libraries.
//!
//! The catalog is read-only: it answers which platforms and architectures
//! exist, where their SDKs live, how composite platform tokens expand into
//! build units, and which physical archives a Boost library produces.

mod env;
mod library;
mod platform;

pub use env::{HostEnv, MinVersions};
pub use library::{
    default_libraries, is_known_library, physical_archives, CONDITIONAL_LIBRARY,
    CONDITIONAL_MIN_CLANG, LIBRARIES,
};
pub use platform::{Arch, BareExpansion, BuildUnit, Platform, PlatformSpec};

use std::path::PathBuf;

/// Errors raised by catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Token does not name a platform (or a supported arch of one).
    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),
}

/// Platform catalog bound to one host environment.
///
/// Holds no mutable state; SDK presence is re-checked on every query.
#[derive(Debug, Clone)]
pub struct PlatformCatalog {
    host: HostEnv,
    min_versions: MinVersions,
}

impl PlatformCatalog {
    /// Create a catalog for the given host and deployment targets.
    pub fn new(host: HostEnv, min_versions: MinVersions) -> Self {
        Self { host, min_versions }
    }

    /// The host environment this catalog was built for.
    pub fn host(&self) -> &HostEnv {
        &self.host
    }

    /// Configured minimum OS versions.
    pub fn min_versions(&self) -> &MinVersions {
        &self.min_versions
    }

    /// SDK root for a platform.
    ///
    /// `<developer_dir>/Platforms/<Dir>.platform/Developer/SDKs/<Dir>.sdk`
    pub fn sdk_root(&self, platform: Platform) -> PathBuf {
        let dir = platform.spec().sdk_dir;
        self.host
            .developer_dir
            .join("Platforms")
            .join(format!("{dir}.platform"))
            .join("Developer/SDKs")
            .join(format!("{dir}.sdk"))
    }

    /// Whether the platform's SDK is installed on the host.
    pub fn sdk_present(&self, platform: Platform) -> bool {
        self.sdk_root(platform).is_dir()
    }

    /// Minimum OS version used for a platform's deployment target flag.
    pub fn min_version(&self, platform: Platform) -> &str {
        self.min_versions.for_platform(platform)
    }

    /// Compiler flag selecting the deployment target for a unit.
    pub fn version_flag(&self, unit: BuildUnit) -> String {
        unit.platform
            .spec()
            .version_flag(unit.arch, self.min_version(unit.platform))
    }

    /// Expand a platform token into concrete build units.
    ///
    /// - `macosx` expands per the platform's bare rule (host arch or fixed arm64)
    /// - `macosx-arm64` names one unit
    /// - `macosx-both` names every supported arch
    pub fn expand(&self, token: &str) -> Result<Vec<BuildUnit>, CatalogError> {
        let unknown = || CatalogError::UnknownPlatform(token.to_string());
        let (name, suffix) = match token.split_once('-') {
            Some((name, suffix)) => (name, Some(suffix)),
            None => (token, None),
        };
        let platform = Platform::parse(name).ok_or_else(unknown)?;
        let spec = platform.spec();

        match suffix {
            None => {
                let arch = match spec.bare {
                    BareExpansion::HostArch => self.host.host_arch,
                    BareExpansion::Fixed(arch) => arch,
                };
                Ok(vec![BuildUnit::new(platform, arch)])
            }
            Some("both") => {
                if spec.archs.len() < 2 {
                    return Err(unknown());
                }
                Ok(spec
                    .archs
                    .iter()
                    .map(|&arch| BuildUnit::new(platform, arch))
                    .collect())
            }
            Some(arch) => {
                let arch = Arch::parse(arch).ok_or_else(unknown)?;
                if !spec.archs.contains(&arch) {
                    return Err(unknown());
                }
                Ok(vec![BuildUnit::new(platform, arch)])
            }
        }
    }

    /// Platform tokens built when the caller does not name any.
    ///
    /// The base set is always present; platforms with optional SDKs join
    /// only when their SDK is installed.
    pub fn default_tokens(&self) -> Vec<&'static str> {
        Platform::ALL
            .iter()
            .filter(|p| {
                let spec = p.spec();
                spec.default_member && (!spec.sdk_optional || self.sdk_present(**p))
            })
            .map(|p| p.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn catalog_for(host_arch: Arch, developer_dir: PathBuf) -> PlatformCatalog {
        PlatformCatalog::new(
            HostEnv {
                host_arch,
                developer_dir,
                clang_major: Some(16),
            },
            MinVersions::default(),
        )
    }

    fn ids(units: &[BuildUnit]) -> Vec<String> {
        units.iter().map(|u| u.id()).collect()
    }

    #[test]
    fn test_bare_macosx_uses_host_arch() {
        let catalog = catalog_for(Arch::X86_64, PathBuf::from("/Xcode"));
        assert_eq!(ids(&catalog.expand("macosx").unwrap()), vec!["macosx-x86_64"]);

        let catalog = catalog_for(Arch::Arm64, PathBuf::from("/Xcode"));
        assert_eq!(ids(&catalog.expand("macosx").unwrap()), vec!["macosx-arm64"]);
    }

    #[test]
    fn test_both_expands_to_two_units() {
        let catalog = catalog_for(Arch::Arm64, PathBuf::from("/Xcode"));
        let units = catalog.expand("macosx-both").unwrap();
        assert_eq!(ids(&units), vec!["macosx-arm64", "macosx-x86_64"]);
    }

    #[test]
    fn test_device_platform_is_fixed_arm64() {
        let catalog = catalog_for(Arch::X86_64, PathBuf::from("/Xcode"));
        assert_eq!(ids(&catalog.expand("ios").unwrap()), vec!["ios-arm64"]);
        assert_eq!(
            catalog.expand("ios-both"),
            Err(CatalogError::UnknownPlatform("ios-both".to_string()))
        );
        assert!(catalog.expand("ios-x86_64").is_err());
    }

    #[test]
    fn test_unknown_tokens() {
        let catalog = catalog_for(Arch::Arm64, PathBuf::from("/Xcode"));
        for token in ["android", "macosx-arm", "", "-both", "iossim-both-x"] {
            assert!(
                matches!(catalog.expand(token), Err(CatalogError::UnknownPlatform(_))),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_sdk_root_layout() {
        let catalog = catalog_for(Arch::Arm64, PathBuf::from("/Xcode/Contents/Developer"));
        assert_eq!(
            catalog.sdk_root(Platform::Iossim),
            PathBuf::from(
                "/Xcode/Contents/Developer/Platforms/iPhoneSimulator.platform/Developer/SDKs/iPhoneSimulator.sdk"
            )
        );
        assert_eq!(
            catalog.sdk_root(Platform::Catalyst),
            catalog.sdk_root(Platform::Macosx)
        );
    }

    #[test]
    fn test_default_tokens_follow_sdk_presence() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog_for(Arch::Arm64, dir.path().to_path_buf());
        assert_eq!(catalog.default_tokens(), vec!["macosx", "ios", "iossim", "catalyst"]);

        fs::create_dir_all(catalog.sdk_root(Platform::Xros)).unwrap();
        fs::create_dir_all(catalog.sdk_root(Platform::Xrossim)).unwrap();
        assert_eq!(
            catalog.default_tokens(),
            vec!["macosx", "ios", "iossim", "catalyst", "xros", "xrossim"]
        );
    }

    #[test]
    fn test_version_flags() {
        let catalog = catalog_for(Arch::Arm64, PathBuf::from("/Xcode"));
        assert_eq!(
            catalog.version_flag(BuildUnit::new(Platform::Ios, Arch::Arm64)),
            "-mios-version-min=13.4"
        );
        assert_eq!(
            catalog.version_flag(BuildUnit::new(Platform::Catalyst, Arch::X86_64)),
            "-target x86_64-apple-ios13.4-macabi"
        );
        assert_eq!(
            catalog.version_flag(BuildUnit::new(Platform::Xrossim, Arch::Arm64)),
            "-target arm64-apple-xros1.0-simulator"
        );
    }
}
