//! Effective configuration with provenance
//!
//! Captures the merged configuration together with the sources that
//! contributed to it, and converts the merged value into typed [`Settings`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use boost_catalog::MinVersions;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Schema version for effective_config.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "boost-xcf/effective_config@1";

/// Repo config file looked up in the project directory.
pub const REPO_CONFIG_FILE: &str = "boost-xcf.toml";

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Repo,
    Cli,
}

/// A contributing config source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Where to fetch the Boost source archive from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostSource {
    pub version: String,
    pub sha256: String,
    pub mirrors: Vec<String>,
}

impl BoostSource {
    /// `1.87.0` -> `1_87_0`
    pub fn version_underscored(&self) -> String {
        self.version.replace('.', "_")
    }

    /// Mirror URLs with the version placeholders filled in.
    pub fn mirror_urls(&self) -> Vec<String> {
        let underscored = self.version_underscored();
        self.mirrors
            .iter()
            .map(|m| {
                m.replace("{version_underscored}", &underscored)
                    .replace("{version}", &self.version)
            })
            .collect()
    }

    /// File name of the downloaded archive.
    pub fn archive_name(&self) -> String {
        format!("{}.tar.bz2", self.source_dir_name())
    }

    /// Top-level directory inside the archive, e.g. `boost_1_87_0`.
    pub fn source_dir_name(&self) -> String {
        format!("boost_{}", self.version_underscored())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    pub build_dir: PathBuf,
    pub frameworks_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcuSettings {
    pub script: PathBuf,
}

/// Typed view of the merged configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub boost: BoostSource,
    pub paths: PathSettings,
    pub jobs: usize,
    pub icu: IcuSettings,
    pub min_versions: MinVersions,
}

impl Settings {
    /// Resolve relative paths against the project directory.
    pub fn anchored(mut self, project_dir: &Path) -> Self {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = project_dir.join(&*p);
            }
        };
        anchor(&mut self.paths.build_dir);
        anchor(&mut self.paths.frameworks_dir);
        anchor(&mut self.icu.script);
        self
    }
}

/// Effective configuration with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,
    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build effective config from layers.
    ///
    /// A missing repo config file is not an error; the layer is skipped.
    pub fn build(
        repo_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = repo_config_path {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::Repo,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        Self::validate_config(&merged)?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merged,
            sources,
        })
    }

    /// Typed settings from the merged value.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| ConfigError::ParseError(format!("invalid configuration: {}", e)))
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        // toml::Value serializes into the same shape serde_json reads back.
        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;
        let json_value = serde_json::to_value(toml_value)
            .map_err(|e| ConfigError::ParseError(format!("TOML conversion error: {}", e)))?;

        Ok((json_value, digest))
    }

    fn validate_config(config: &Value) -> Result<(), ConfigError> {
        if let Some(jobs) = config.get("jobs") {
            match jobs.as_u64() {
                Some(n) if n > 0 => {}
                _ => {
                    return Err(ConfigError::ValidationError(
                        "jobs must be a positive integer".to_string(),
                    ))
                }
            }
        }

        let boost = config.get("boost");
        if let Some(sha) = boost.and_then(|b| b.get("sha256")).and_then(|v| v.as_str()) {
            if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::ValidationError(
                    "boost.sha256 must be 64 hex characters".to_string(),
                ));
            }
        }

        if let Some(version) = boost.and_then(|b| b.get("version")).and_then(|v| v.as_str()) {
            let valid = !version.is_empty()
                && version
                    .split('.')
                    .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
            if !valid {
                return Err(ConfigError::ValidationError(format!(
                    "boost.version '{}' is not a dotted release number",
                    version
                )));
            }
        }

        if let Some(mirrors) = boost.and_then(|b| b.get("mirrors")).and_then(|v| v.as_array()) {
            if mirrors.is_empty() {
                return Err(ConfigError::ValidationError(
                    "boost.mirrors must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
