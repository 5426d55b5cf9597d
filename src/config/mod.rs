//! Layered configuration
//!
//! Three layers, later wins:
//! 1. Built-in defaults
//! 2. Repo config (`boost-xcf.toml` in the project directory, or `--config`)
//! 3. CLI flags

mod cli;
mod defaults;
mod effective;
mod merge;

pub use cli::CliOverrides;
pub use defaults::{BuiltinDefaults, DEFAULT_BOOST_SHA256, DEFAULT_BOOST_VERSION, DEFAULT_MIRRORS};
pub use effective::{
    BoostSource, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, IcuSettings, PathSettings,
    Settings, REPO_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
