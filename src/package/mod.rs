//! Artifact packaging
//!
//! Turns staged per-unit static archives into one XCFramework per physical
//! archive:
//! 1. per platform family, merge the units' archives (lipo for 2+, copy for 1)
//! 2. bundle the family archives with `xcodebuild -create-xcframework`
//! 3. copy the Boost headers next to the frameworks

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::options::ResolvedConfig;
use crate::plan::{expected_archives, PlanSettings};
use crate::tools::{ExternalTools, ToolError};

/// Header directory inside the frameworks directory.
pub const HEADERS_DIR: &str = "Headers";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("packaging {archive} failed: {source}")]
    Tool {
        archive: String,
        #[source]
        source: ToolError,
    },

    #[error("packaging I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("header walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PackageError + '_ {
    move |source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One XCFramework written by a packaging run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagedArchive {
    pub name: String,
    pub output: PathBuf,
    /// Platform families included, in canonical order.
    pub families: Vec<String>,
}

/// Result of a packaging run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub packaged: Vec<PackagedArchive>,
    /// Archives with no staged input in any family.
    pub omitted: Vec<String>,
}

/// Packages staged archives into `frameworks_dir`.
pub struct Packager<'a> {
    tools: &'a dyn ExternalTools,
    settings: &'a PlanSettings,
    frameworks_dir: PathBuf,
}

impl<'a> Packager<'a> {
    pub fn new(
        tools: &'a dyn ExternalTools,
        settings: &'a PlanSettings,
        frameworks_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tools,
            settings,
            frameworks_dir: frameworks_dir.into(),
        }
    }

    /// Output path of one XCFramework.
    pub fn xcframework_path(&self, archive: &str) -> PathBuf {
        self.frameworks_dir.join(format!("{archive}.xcframework"))
    }

    /// Package every physical archive of the requested libraries.
    pub fn package(&self, resolved: &ResolvedConfig) -> Result<PackageReport, PackageError> {
        let mut report = PackageReport::default();
        for archive in expected_archives(resolved) {
            match self.package_archive(&archive, resolved)? {
                Some(packaged) => report.packaged.push(packaged),
                None => report.omitted.push(archive),
            }
        }
        Ok(report)
    }

    fn package_archive(
        &self,
        archive: &str,
        resolved: &ResolvedConfig,
    ) -> Result<Option<PackagedArchive>, PackageError> {
        let file_name = format!("lib{archive}.a");
        let tool_err = |source| PackageError::Tool {
            archive: archive.to_string(),
            source,
        };

        let mut families = Vec::new();
        let mut family_archives = Vec::new();
        for platform in resolved.platforms.platforms() {
            let inputs: Vec<PathBuf> = resolved
                .platforms
                .units_of(platform)
                .into_iter()
                .map(|unit| self.settings.stage_dir(unit).join("lib").join(&file_name))
                .filter(|p| p.is_file())
                .collect();
            if inputs.is_empty() {
                debug!(archive, platform = %platform, "no staged input, family omitted");
                continue;
            }

            let merged_dir = self.settings.family_dir(platform).join("lib");
            fs::create_dir_all(&merged_dir).map_err(io_err(&merged_dir))?;
            let merged = merged_dir.join(&file_name);
            if inputs.len() > 1 {
                self.tools.lipo(&inputs, &merged).map_err(tool_err)?;
            } else {
                fs::copy(&inputs[0], &merged).map_err(io_err(&merged))?;
            }
            families.push(platform.to_string());
            family_archives.push(merged);
        }

        if family_archives.is_empty() {
            warn!(archive, "no staged archives in any platform family, skipping");
            return Ok(None);
        }

        let output = self.xcframework_path(archive);
        if output.exists() {
            fs::remove_dir_all(&output).map_err(io_err(&output))?;
        }
        fs::create_dir_all(&self.frameworks_dir).map_err(io_err(&self.frameworks_dir))?;
        self.tools
            .create_xcframework(&family_archives, &output)
            .map_err(tool_err)?;
        info!(archive, families = %families.join(","), "created xcframework");

        Ok(Some(PackagedArchive {
            name: archive.to_string(),
            output,
            families,
        }))
    }

    /// Copy `<src_dir>/boost` into `<frameworks>/Headers/boost`.
    ///
    /// Returns the number of header files copied.
    pub fn copy_headers(&self, src_dir: &Path) -> Result<usize, PackageError> {
        let from = src_dir.join("boost");
        let to = self.frameworks_dir.join(HEADERS_DIR).join("boost");
        if to.exists() {
            fs::remove_dir_all(&to).map_err(io_err(&to))?;
        }

        let mut copied = 0;
        for entry in WalkDir::new(&from)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            let Ok(rel) = entry.path().strip_prefix(&from) else {
                continue;
            };
            let dest = to.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest).map_err(io_err(&dest))?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &dest).map_err(io_err(&dest))?;
                copied += 1;
            }
        }
        debug!(copied, dest = %to.display(), "copied headers");
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTools;
    use crate::options::{LibrarySet, PlatformSet};
    use crate::tools::ToolOp;
    use boost_catalog::{Arch, BuildUnit, Platform};
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> PlanSettings {
        PlanSettings {
            build_dir: dir.path().join("build"),
            icu_dir: dir.path().join("build/icu"),
            jobs: 2,
        }
    }

    fn resolved(libs: &str, units: &[BuildUnit]) -> ResolvedConfig {
        ResolvedConfig {
            libraries: LibrarySet::from_canonical(libs),
            platforms: units.iter().copied().collect::<PlatformSet>(),
            python: None,
            rebuild: false,
            rebuild_icu: false,
        }
    }

    fn stage(settings: &PlanSettings, unit: BuildUnit, archive: &str) {
        let lib = settings.stage_dir(unit).join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join(format!("lib{archive}.a")), unit.id()).unwrap();
    }

    const IOS: BuildUnit = BuildUnit {
        platform: Platform::Ios,
        arch: Arch::Arm64,
    };
    const MAC_ARM: BuildUnit = BuildUnit {
        platform: Platform::Macosx,
        arch: Arch::Arm64,
    };
    const MAC_X86: BuildUnit = BuildUnit {
        platform: Platform::Macosx,
        arch: Arch::X86_64,
    };

    #[test]
    fn test_single_unit_family_is_copied() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        stage(&settings, IOS, "boost_atomic");
        let tools = MockTools::new();
        let packager = Packager::new(&tools, &settings, dir.path().join("frameworks"));

        let report = packager.package(&resolved("atomic", &[IOS])).unwrap();

        assert_eq!(report.packaged.len(), 1);
        assert_eq!(report.packaged[0].families, vec!["ios"]);
        assert_eq!(tools.count(ToolOp::Lipo), 0);
        let merged = settings.family_dir(Platform::Ios).join("lib/libboost_atomic.a");
        assert_eq!(fs::read_to_string(merged).unwrap(), "ios-arm64");
        assert!(dir.path().join("frameworks/boost_atomic.xcframework").is_dir());
    }

    #[test]
    fn test_multi_arch_family_is_lipoed() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        stage(&settings, MAC_ARM, "boost_atomic");
        stage(&settings, MAC_X86, "boost_atomic");
        let tools = MockTools::new();
        let packager = Packager::new(&tools, &settings, dir.path().join("frameworks"));

        packager
            .package(&resolved("atomic", &[MAC_ARM, MAC_X86]))
            .unwrap();

        assert_eq!(tools.count(ToolOp::Lipo), 1);
        let merged = settings.family_dir(Platform::Macosx).join("lib/libboost_atomic.a");
        assert_eq!(fs::read_to_string(merged).unwrap(), "macosx-arm64macosx-x86_64");
    }

    #[test]
    fn test_missing_family_is_omitted() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        stage(&settings, IOS, "boost_atomic");
        let tools = MockTools::new();
        let packager = Packager::new(&tools, &settings, dir.path().join("frameworks"));

        let report = packager.package(&resolved("atomic", &[IOS, MAC_ARM])).unwrap();

        assert_eq!(report.packaged[0].families, vec!["ios"]);
        match &tools.calls()[0] {
            crate::mock::ToolCall::CreateXcframework { libraries, .. } => {
                assert_eq!(libraries.len(), 1)
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_archive_without_inputs_is_skipped() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        stage(&settings, IOS, "boost_atomic");
        let tools = MockTools::new();
        let packager = Packager::new(&tools, &settings, dir.path().join("frameworks"));

        let report = packager.package(&resolved("atomic,regex", &[IOS])).unwrap();

        assert_eq!(report.omitted, vec!["boost_regex"]);
        assert_eq!(tools.count(ToolOp::CreateXcframework), 1);
    }

    #[test]
    fn test_existing_output_is_replaced() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        stage(&settings, IOS, "boost_atomic");
        let stale = dir.path().join("frameworks/boost_atomic.xcframework/stale");
        fs::create_dir_all(&stale).unwrap();
        let tools = MockTools::new();
        let packager = Packager::new(&tools, &settings, dir.path().join("frameworks"));

        packager.package(&resolved("atomic", &[IOS])).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_tool_failure_is_packaging_error() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        stage(&settings, IOS, "boost_atomic");
        let tools = MockTools::new();
        tools.inject_error(ToolOp::CreateXcframework, "invalid library");
        let packager = Packager::new(&tools, &settings, dir.path().join("frameworks"));

        let err = packager.package(&resolved("atomic", &[IOS])).unwrap_err();
        assert!(matches!(err, PackageError::Tool { ref archive, .. } if archive == "boost_atomic"));
    }

    #[test]
    fn test_copy_headers() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("boost/atomic")).unwrap();
        fs::write(src.join("boost/version.hpp"), "v").unwrap();
        fs::write(src.join("boost/atomic/atomic.hpp"), "a").unwrap();
        let settings = settings(&dir);
        let tools = MockTools::new();
        let packager = Packager::new(&tools, &settings, dir.path().join("frameworks"));

        assert_eq!(packager.copy_headers(&src).unwrap(), 2);
        assert!(dir
            .path()
            .join("frameworks/Headers/boost/atomic/atomic.hpp")
            .is_file());
    }
}
