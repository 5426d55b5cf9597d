//! Built-in defaults (layer 1)

use boost_catalog::MinVersions;
use serde::{Deserialize, Serialize};

/// Boost release built when no version is configured.
pub const DEFAULT_BOOST_VERSION: &str = "1.87.0";

/// SHA-256 of `boost_1_87_0.tar.bz2`.
pub const DEFAULT_BOOST_SHA256: &str =
    "af57be25cb4c4f4b413ed692fe378affb4352ea50fbe294a11ef548f4d527d89";

/// Mirror URL templates, tried in order.
///
/// `{version}` expands to `1.87.0`, `{version_underscored}` to `1_87_0`.
pub const DEFAULT_MIRRORS: &[&str] = &[
    "https://archives.boost.io/release/{version}/source/boost_{version_underscored}.tar.bz2",
    "https://sourceforge.net/projects/boost/files/boost/{version}/boost_{version_underscored}.tar.bz2/download",
];

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    pub boost_version: String,
    pub boost_sha256: String,
    pub mirrors: Vec<String>,

    /// Build directory, relative to the project directory (default: "build")
    pub build_dir: String,

    /// Output directory for xcframeworks (default: "frameworks")
    pub frameworks_dir: String,

    /// Parallel b2 jobs (default: available parallelism)
    pub jobs: usize,

    /// ICU build script, relative to the project directory
    pub icu_script: String,

    pub min_versions: MinVersions,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            boost_version: DEFAULT_BOOST_VERSION.to_string(),
            boost_sha256: DEFAULT_BOOST_SHA256.to_string(),
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            build_dir: "build".to_string(),
            frameworks_dir: "frameworks".to_string(),
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            icu_script: "scripts/build_icu.sh".to_string(),
            min_versions: MinVersions::default(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "boost": {
                "version": self.boost_version,
                "sha256": self.boost_sha256,
                "mirrors": self.mirrors,
            },
            "paths": {
                "build_dir": self.build_dir,
                "frameworks_dir": self.frameworks_dir,
            },
            "jobs": self.jobs,
            "icu": {
                "script": self.icu_script,
            },
            "min_versions": self.min_versions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.boost_version, "1.87.0");
        assert_eq!(defaults.boost_sha256.len(), 64);
        assert_eq!(defaults.mirrors.len(), 2);
        assert!(defaults.jobs > 0);
        assert_eq!(defaults.build_dir, "build");
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["boost"]["version"], "1.87.0");
        assert_eq!(value["paths"]["frameworks_dir"], "frameworks");
        assert_eq!(value["min_versions"]["ios"], "13.4");
        assert!(value["boost"]["mirrors"][0]
            .as_str()
            .unwrap()
            .contains("{version_underscored}"));
    }
}
