//! Host environment and deployment targets.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::platform::{Arch, Platform};

/// Facts about the build host, captured once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEnv {
    /// Architecture of the machine running the build.
    pub host_arch: Arch,

    /// Active Xcode developer directory (e.g. `/Applications/Xcode.app/Contents/Developer`).
    pub developer_dir: PathBuf,

    /// Major version of the host clang, if it could be determined.
    pub clang_major: Option<u32>,
}

/// Minimum OS versions per OS family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinVersions {
    pub macosx: String,
    pub ios: String,
    pub catalyst: String,
    pub xros: String,
    pub tvos: String,
    pub watchos: String,
}

impl Default for MinVersions {
    fn default() -> Self {
        Self {
            macosx: "11.0".to_string(),
            ios: "13.4".to_string(),
            catalyst: "13.4".to_string(),
            xros: "1.0".to_string(),
            tvos: "13.0".to_string(),
            watchos: "6.0".to_string(),
        }
    }
}

impl MinVersions {
    /// Minimum version applying to a platform (device and simulator share one).
    pub fn for_platform(&self, platform: Platform) -> &str {
        match platform {
            Platform::Macosx => &self.macosx,
            Platform::Ios | Platform::Iossim => &self.ios,
            Platform::Catalyst => &self.catalyst,
            Platform::Xros | Platform::Xrossim => &self.xros,
            Platform::Tvos | Platform::Tvossim => &self.tvos,
            Platform::Watchos | Platform::Watchossim => &self.watchos,
        }
    }
}
