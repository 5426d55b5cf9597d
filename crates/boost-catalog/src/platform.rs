//! Platforms, architectures and build units.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// CPU architecture of a build unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "arm64")]
    Arm64,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Arch {
    /// Identifier used in tokens and directory names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Arm64 => "arm64",
            Arch::X86_64 => "x86_64",
        }
    }

    /// Parse an architecture suffix. Accepts `aarch64` as reported by some hosts.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "arm64" | "aarch64" => Some(Arch::Arm64),
            "x86_64" => Some(Arch::X86_64),
            _ => None,
        }
    }

    /// Value of b2's `architecture=` feature.
    pub fn b2_architecture(&self) -> &'static str {
        match self {
            Arch::Arm64 => "arm",
            Arch::X86_64 => "x86",
        }
    }

    /// Value of b2's `abi=` feature.
    pub fn b2_abi(&self) -> &'static str {
        match self {
            Arch::Arm64 => "aapcs",
            Arch::X86_64 => "sysv",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A target platform. Each platform is also a packaging family: its
/// per-arch archives are merged into one universal archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Macosx,
    Ios,
    Iossim,
    Catalyst,
    Xros,
    Xrossim,
    Tvos,
    Tvossim,
    Watchos,
    Watchossim,
}

/// How a bare platform token (no arch suffix) expands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BareExpansion {
    /// Build for the host's architecture.
    HostArch,
    /// Always build this architecture.
    Fixed(Arch),
}

/// Immutable description of a platform.
#[derive(Debug)]
pub struct PlatformSpec {
    pub platform: Platform,
    /// Architectures this platform can be built for.
    pub archs: &'static [Arch],
    pub bare: BareExpansion,
    /// `<Dir>` in `Platforms/<Dir>.platform/Developer/SDKs/<Dir>.sdk`.
    pub sdk_dir: &'static str,
    /// SDK ships separately from Xcode and must be checked before use.
    pub sdk_optional: bool,
    /// Part of the default platform list (subject to SDK presence).
    pub default_member: bool,
}

const BOTH: &[Arch] = &[Arch::Arm64, Arch::X86_64];
const ARM64_ONLY: &[Arch] = &[Arch::Arm64];

static SPECS: [PlatformSpec; 10] = [
    PlatformSpec {
        platform: Platform::Macosx,
        archs: BOTH,
        bare: BareExpansion::HostArch,
        sdk_dir: "MacOSX",
        sdk_optional: false,
        default_member: true,
    },
    PlatformSpec {
        platform: Platform::Ios,
        archs: ARM64_ONLY,
        bare: BareExpansion::Fixed(Arch::Arm64),
        sdk_dir: "iPhoneOS",
        sdk_optional: false,
        default_member: true,
    },
    PlatformSpec {
        platform: Platform::Iossim,
        archs: BOTH,
        bare: BareExpansion::HostArch,
        sdk_dir: "iPhoneSimulator",
        sdk_optional: false,
        default_member: true,
    },
    PlatformSpec {
        platform: Platform::Catalyst,
        archs: BOTH,
        bare: BareExpansion::HostArch,
        sdk_dir: "MacOSX",
        sdk_optional: false,
        default_member: true,
    },
    PlatformSpec {
        platform: Platform::Xros,
        archs: ARM64_ONLY,
        bare: BareExpansion::Fixed(Arch::Arm64),
        sdk_dir: "XROS",
        sdk_optional: true,
        default_member: true,
    },
    PlatformSpec {
        platform: Platform::Xrossim,
        archs: BOTH,
        bare: BareExpansion::HostArch,
        sdk_dir: "XRSimulator",
        sdk_optional: true,
        default_member: true,
    },
    PlatformSpec {
        platform: Platform::Tvos,
        archs: ARM64_ONLY,
        bare: BareExpansion::Fixed(Arch::Arm64),
        sdk_dir: "AppleTVOS",
        sdk_optional: true,
        default_member: false,
    },
    PlatformSpec {
        platform: Platform::Tvossim,
        archs: BOTH,
        bare: BareExpansion::HostArch,
        sdk_dir: "AppleTVSimulator",
        sdk_optional: true,
        default_member: false,
    },
    PlatformSpec {
        platform: Platform::Watchos,
        archs: ARM64_ONLY,
        bare: BareExpansion::Fixed(Arch::Arm64),
        sdk_dir: "WatchOS",
        sdk_optional: true,
        default_member: false,
    },
    PlatformSpec {
        platform: Platform::Watchossim,
        archs: BOTH,
        bare: BareExpansion::HostArch,
        sdk_dir: "WatchSimulator",
        sdk_optional: true,
        default_member: false,
    },
];

impl Platform {
    /// Every platform, in catalog order.
    pub const ALL: [Platform; 10] = [
        Platform::Macosx,
        Platform::Ios,
        Platform::Iossim,
        Platform::Catalyst,
        Platform::Xros,
        Platform::Xrossim,
        Platform::Tvos,
        Platform::Tvossim,
        Platform::Watchos,
        Platform::Watchossim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Macosx => "macosx",
            Platform::Ios => "ios",
            Platform::Iossim => "iossim",
            Platform::Catalyst => "catalyst",
            Platform::Xros => "xros",
            Platform::Xrossim => "xrossim",
            Platform::Tvos => "tvos",
            Platform::Tvossim => "tvossim",
            Platform::Watchos => "watchos",
            Platform::Watchossim => "watchossim",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == s)
    }

    /// Static description of this platform.
    pub fn spec(&self) -> &'static PlatformSpec {
        &SPECS[*self as usize]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PlatformSpec {
    /// Deployment target flag for `arch` at minimum version `min`.
    pub fn version_flag(&self, arch: Arch, min: &str) -> String {
        match self.platform {
            Platform::Macosx => format!("-mmacosx-version-min={min}"),
            Platform::Ios => format!("-mios-version-min={min}"),
            Platform::Iossim => format!("-mios-simulator-version-min={min}"),
            Platform::Catalyst => format!("-target {arch}-apple-ios{min}-macabi"),
            Platform::Xros => format!("-target {arch}-apple-xros{min}"),
            Platform::Xrossim => format!("-target {arch}-apple-xros{min}-simulator"),
            Platform::Tvos => format!("-mtvos-version-min={min}"),
            Platform::Tvossim => format!("-mtvos-simulator-version-min={min}"),
            Platform::Watchos => format!("-mwatchos-version-min={min}"),
            Platform::Watchossim => format!("-mwatchos-simulator-version-min={min}"),
        }
    }
}

/// One (platform, architecture) pair: the granularity of a b2 invocation
/// and of the incremental skip decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildUnit {
    pub platform: Platform,
    pub arch: Arch,
}

impl BuildUnit {
    pub fn new(platform: Platform, arch: Arch) -> Self {
        Self { platform, arch }
    }

    /// `<platform>-<arch>`, e.g. `macosx-arm64`.
    pub fn id(&self) -> String {
        format!("{}-{}", self.platform, self.arch)
    }
}

impl fmt::Display for BuildUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.platform, self.arch)
    }
}

// Units order by their textual id so canonical strings are plain sorted lists.
impl Ord for BuildUnit {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.platform.as_str(), self.arch.as_str())
            .cmp(&(other.platform.as_str(), other.arch.as_str()))
    }
}

impl PartialOrd for BuildUnit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_specs_indexed_by_platform() {
        for platform in Platform::ALL {
            assert_eq!(platform.spec().platform, platform);
        }
    }

    #[test]
    fn test_platform_round_trip_names() {
        for platform in Platform::ALL {
            assert_eq!(Platform::parse(platform.as_str()), Some(platform));
        }
        assert_eq!(Platform::parse("MacOSX"), None);
    }

    #[test]
    fn test_arch_parse() {
        assert_eq!(Arch::parse("aarch64"), Some(Arch::Arm64));
        assert_eq!(Arch::parse("x86_64"), Some(Arch::X86_64));
        assert_eq!(Arch::parse("arm"), None);
    }

    #[test]
    fn test_unit_order_is_textual() {
        let units: BTreeSet<BuildUnit> = [
            BuildUnit::new(Platform::Macosx, Arch::X86_64),
            BuildUnit::new(Platform::Iossim, Arch::Arm64),
            BuildUnit::new(Platform::Ios, Arch::Arm64),
            BuildUnit::new(Platform::Catalyst, Arch::Arm64),
            BuildUnit::new(Platform::Macosx, Arch::Arm64),
        ]
        .into_iter()
        .collect();

        let ids: Vec<String> = units.iter().map(BuildUnit::id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids[0], "catalyst-arm64");
    }

    #[test]
    fn test_unit_serialization() {
        let unit = BuildUnit::new(Platform::Xrossim, Arch::X86_64);
        let json = serde_json::to_string(&unit).unwrap();
        assert_eq!(json, r#"{"platform":"xrossim","arch":"x86_64"}"#);
    }
}
