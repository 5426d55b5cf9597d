//! Host probing
//!
//! Collects the facts about the build machine that the catalog needs:
//! architecture, active Xcode developer directory, and clang version.
//! Probing happens once at startup; the result is an immutable [`HostEnv`].

use std::path::PathBuf;
use std::process::Command;

use boost_catalog::{Arch, HostEnv};
use tracing::debug;

/// Developer directory used when `xcode-select` is unavailable.
pub const FALLBACK_DEVELOPER_DIR: &str = "/Applications/Xcode.app/Contents/Developer";

/// Probe the current host.
///
/// `DEVELOPER_DIR` in the environment takes precedence over `xcode-select -p`,
/// matching how Xcode's own tools pick a toolchain.
pub fn detect() -> HostEnv {
    let host_arch = detect_arch();
    let developer_dir = std::env::var_os("DEVELOPER_DIR")
        .map(PathBuf::from)
        .or_else(active_developer_dir)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DEVELOPER_DIR));
    let clang_major = clang_version_output().as_deref().and_then(parse_clang_major);

    let host = HostEnv {
        host_arch,
        developer_dir,
        clang_major,
    };
    debug!(?host, "probed host environment");
    host
}

/// Architecture via `uname -m`, falling back to the compile-time target.
fn detect_arch() -> Arch {
    Command::new("uname")
        .arg("-m")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| Arch::parse(String::from_utf8_lossy(&o.stdout).trim()))
        .or_else(|| Arch::parse(std::env::consts::ARCH))
        .unwrap_or(Arch::Arm64)
}

fn active_developer_dir() -> Option<PathBuf> {
    Command::new("xcode-select")
        .arg("-p")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn clang_version_output() -> Option<String> {
    Command::new("clang")
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).to_string())
}

/// Major version from `clang --version` output.
///
/// Handles both `Apple clang version 15.0.0 (...)` and upstream
/// `clang version 17.0.6`.
pub fn parse_clang_major(output: &str) -> Option<u32> {
    let re = regex_lite::Regex::new(r"clang version (\d+)\.").ok()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apple_clang() {
        let output = "Apple clang version 15.0.0 (clang-1500.3.9.4)\n\
                      Target: arm64-apple-darwin23.4.0\n\
                      Thread model: posix\n";
        assert_eq!(parse_clang_major(output), Some(15));
    }

    #[test]
    fn test_parse_upstream_clang() {
        assert_eq!(parse_clang_major("Ubuntu clang version 17.0.6 (9ubuntu1)"), Some(17));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_clang_major("gcc (GCC) 13.2.0"), None);
        assert_eq!(parse_clang_major(""), None);
    }

    #[test]
    fn test_detect_never_panics() {
        let host = detect();
        assert!(!host.developer_dir.as_os_str().is_empty());
    }
}
