//! Logging setup
//!
//! Compact human output on stderr, filtered by `RUST_LOG` or the verbosity
//! flag, plus an optional plain-text debug log file.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter directive for a verbosity setting.
pub fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("boost_xcf={level},boost_catalog={level}")
}

/// Install the global subscriber.
///
/// A subscriber installed earlier (e.g. by a test harness) is left in place.
pub fn init(verbose: bool, log_file: Option<&Path>) -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(env_filter);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true)
                    .with_filter(EnvFilter::new("debug")),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "boost_xcf=info,boost_catalog=info");
        assert!(default_directive(true).contains("=debug"));
    }

    #[test]
    fn test_init_with_log_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");
        init(true, Some(&path)).unwrap();
        assert!(path.exists());
        // Second initialization is a no-op
        init(false, None).unwrap();
    }

    #[test]
    fn test_unwritable_log_file() {
        let dir = TempDir::new().unwrap();
        assert!(init(false, Some(&dir.path().join("missing/run.log"))).is_err());
    }
}
