//! Command line configuration layer

use std::path::PathBuf;

use serde_json::{json, Map, Value};

/// Settings overridable from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub build_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub boost_version: Option<String>,
}

impl CliOverrides {
    /// The override layer, or `None` when nothing was given.
    pub fn to_value(&self) -> Option<Value> {
        let mut root = Map::new();
        if let Some(dir) = &self.build_dir {
            root.insert(
                "paths".to_string(),
                json!({ "build_dir": dir.to_string_lossy() }),
            );
        }
        if let Some(jobs) = self.jobs {
            root.insert("jobs".to_string(), json!(jobs));
        }
        if let Some(version) = &self.boost_version {
            root.insert("boost".to_string(), json!({ "version": version }));
        }
        (!root.is_empty()).then_some(Value::Object(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_overrides() {
        assert!(CliOverrides::default().to_value().is_none());
    }

    #[test]
    fn test_overrides_shape() {
        let overrides = CliOverrides {
            build_dir: Some(PathBuf::from("/tmp/b")),
            jobs: Some(3),
            boost_version: Some("1.86.0".to_string()),
        };
        let value = overrides.to_value().unwrap();
        assert_eq!(value["paths"]["build_dir"], "/tmp/b");
        assert_eq!(value["jobs"], 3);
        assert_eq!(value["boost"]["version"], "1.86.0");
        assert!(value["paths"].get("frameworks_dir").is_none());
    }
}
