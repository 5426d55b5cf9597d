//! External tool adapters
//!
//! Every side effect outside the build directory bookkeeping goes through
//! [`ExternalTools`]: downloading, unpacking, bootstrapping and running b2,
//! the ICU build, `lipo`, `xcodebuild` and `pod`. [`SystemTools`] spawns the
//! real programs; tests use [`crate::mock::MockTools`].

mod fetch;

pub use fetch::{sha256_file, ArchiveFetcher, FetchError};

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use boost_catalog::BuildUnit;
use thiserror::Error;
use tracing::debug;

use crate::plan::BuildJob;

/// Operations of the tool seam, used for error reporting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolOp {
    Download,
    Extract,
    Bootstrap,
    BuildIcu,
    Build,
    Lipo,
    CreateXcframework,
    GenerateWorkspace,
}

impl ToolOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolOp::Download => "curl",
            ToolOp::Extract => "tar",
            ToolOp::Bootstrap => "bootstrap.sh",
            ToolOp::BuildIcu => "icu",
            ToolOp::Build => "b2",
            ToolOp::Lipo => "lipo",
            ToolOp::CreateXcframework => "xcodebuild",
            ToolOp::GenerateWorkspace => "pod",
        }
    }
}

impl fmt::Display for ToolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool invocation errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: ToolOp,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed ({status}): {detail}")]
    Failed {
        tool: ToolOp,
        status: String,
        detail: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ToolError {
    /// The tool that failed.
    pub fn tool(&self) -> Option<ToolOp> {
        match self {
            ToolError::Spawn { tool, .. } | ToolError::Failed { tool, .. } => Some(*tool),
            ToolError::Io { .. } => None,
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Seam over every external program the pipeline runs.
pub trait ExternalTools {
    /// Download `url` to `dest`.
    fn download(&self, url: &str, dest: &Path) -> ToolResult<()>;

    /// Unpack a `.tar.bz2` archive into `dest_dir`.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> ToolResult<()>;

    /// Build the `b2` engine inside an unpacked source tree.
    fn bootstrap(&self, src_dir: &Path) -> ToolResult<()>;

    /// Build ICU for `units` into `icu_dir/<unit>`.
    fn build_icu(&self, script: &Path, units: &[BuildUnit], icu_dir: &Path) -> ToolResult<()>;

    /// Run one b2 job. Static archives end up in `job.lib_dir()`.
    fn build(&self, job: &BuildJob, src_dir: &Path) -> ToolResult<()>;

    /// Merge single-architecture archives into one universal archive.
    fn lipo(&self, inputs: &[PathBuf], output: &Path) -> ToolResult<()>;

    /// Bundle one archive per platform family into an XCFramework.
    fn create_xcframework(&self, libraries: &[PathBuf], output: &Path) -> ToolResult<()>;

    /// Regenerate the CocoaPods workspace of a project.
    fn generate_workspace(&self, project_dir: &Path) -> ToolResult<()>;
}

/// Adapter spawning the real command line tools.
#[derive(Debug, Clone, Default)]
pub struct SystemTools {
    /// Exported as `DEVELOPER_DIR` to Xcode tools when set.
    developer_dir: Option<PathBuf>,
}

impl SystemTools {
    pub fn with_developer_dir(developer_dir: impl Into<PathBuf>) -> Self {
        Self {
            developer_dir: Some(developer_dir.into()),
        }
    }

    fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        if let Some(dir) = &self.developer_dir {
            cmd.env("DEVELOPER_DIR", dir);
        }
        cmd
    }
}

/// Run to completion, capturing output.
fn run(tool: ToolOp, cmd: &mut Command) -> ToolResult<Output> {
    debug!(tool = %tool, command = ?cmd, "running");
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ToolError::Spawn { tool, source })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            tool,
            status: output.status.to_string(),
            detail: tail(&String::from_utf8_lossy(&output.stderr), 20),
        });
    }
    Ok(output)
}

/// Last `lines` lines of a captured stream.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ToolError + '_ {
    move |source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent(path: &Path) -> ToolResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(io_err(parent))
        }
        _ => Ok(()),
    }
}

impl ExternalTools for SystemTools {
    fn download(&self, url: &str, dest: &Path) -> ToolResult<()> {
        ensure_parent(dest)?;
        run(
            ToolOp::Download,
            Command::new("curl")
                .args(["-fL", "--retry", "2", "-o"])
                .arg(dest)
                .arg(url),
        )
        .map(|_| ())
    }

    fn extract(&self, archive: &Path, dest_dir: &Path) -> ToolResult<()> {
        fs::create_dir_all(dest_dir).map_err(io_err(dest_dir))?;
        run(
            ToolOp::Extract,
            Command::new("tar")
                .arg("-xjf")
                .arg(archive)
                .arg("-C")
                .arg(dest_dir),
        )
        .map(|_| ())
    }

    fn bootstrap(&self, src_dir: &Path) -> ToolResult<()> {
        run(
            ToolOp::Bootstrap,
            Command::new("./bootstrap.sh").current_dir(src_dir),
        )
        .map(|_| ())
    }

    fn build_icu(&self, script: &Path, units: &[BuildUnit], icu_dir: &Path) -> ToolResult<()> {
        fs::create_dir_all(icu_dir).map_err(io_err(icu_dir))?;
        let mut cmd = self.command("bash");
        cmd.arg(script).arg(icu_dir);
        cmd.args(units.iter().map(BuildUnit::id));
        run(ToolOp::BuildIcu, &mut cmd).map(|_| ())
    }

    fn build(&self, job: &BuildJob, src_dir: &Path) -> ToolResult<()> {
        ensure_parent(&job.user_config_path)?;
        fs::write(&job.user_config_path, &job.b2_config).map_err(io_err(&job.user_config_path))?;

        ensure_parent(&job.log_path)?;
        let log = File::create(&job.log_path).map_err(io_err(&job.log_path))?;
        let log_err = log.try_clone().map_err(io_err(&job.log_path))?;

        let mut cmd = self.command("./b2");
        cmd.current_dir(src_dir)
            .args(job.b2_args())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        debug!(unit = %job.unit, command = ?cmd, "running b2");

        let status = cmd.status().map_err(|source| ToolError::Spawn {
            tool: ToolOp::Build,
            source,
        })?;
        if !status.success() {
            let detail = fs::read_to_string(&job.log_path)
                .map(|s| tail(&s, 20))
                .unwrap_or_default();
            return Err(ToolError::Failed {
                tool: ToolOp::Build,
                status: status.to_string(),
                detail: format!("{} (log: {})", detail, job.log_path.display()),
            });
        }
        Ok(())
    }

    fn lipo(&self, inputs: &[PathBuf], output: &Path) -> ToolResult<()> {
        ensure_parent(output)?;
        let mut cmd = self.command("xcrun");
        cmd.arg("lipo").arg("-create").args(inputs).arg("-output").arg(output);
        run(ToolOp::Lipo, &mut cmd).map(|_| ())
    }

    fn create_xcframework(&self, libraries: &[PathBuf], output: &Path) -> ToolResult<()> {
        ensure_parent(output)?;
        let mut cmd = self.command("xcodebuild");
        cmd.arg("-create-xcframework");
        for lib in libraries {
            cmd.arg("-library").arg(lib);
        }
        cmd.arg("-output").arg(output);
        run(ToolOp::CreateXcframework, &mut cmd).map(|_| ())
    }

    fn generate_workspace(&self, project_dir: &Path) -> ToolResult<()> {
        run(
            ToolOp::GenerateWorkspace,
            Command::new("pod").arg("install").current_dir(project_dir),
        )
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tail_keeps_last_lines() {
        let text = "a\nb\nc\nd\n";
        assert_eq!(tail(text, 2), "c\nd");
        assert_eq!(tail(text, 10), "a\nb\nc\nd");
        assert_eq!(tail("", 3), "");
    }

    #[test]
    fn test_tool_names() {
        assert_eq!(ToolOp::CreateXcframework.to_string(), "xcodebuild");
        assert_eq!(ToolOp::Build.as_str(), "b2");
    }

    #[test]
    fn test_error_reports_tool() {
        let err = ToolError::Failed {
            tool: ToolOp::Lipo,
            status: "exit status: 1".to_string(),
            detail: "bad input".to_string(),
        };
        assert_eq!(err.tool(), Some(ToolOp::Lipo));
        assert_eq!(err.to_string(), "lipo failed (exit status: 1): bad input");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = run(
            ToolOp::Bootstrap,
            &mut Command::new("/nonexistent/boost-xcf-test-binary"),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { tool: ToolOp::Bootstrap, .. }));
    }

    #[test]
    fn test_ensure_parent_creates_directories() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a/b/c.txt");
        ensure_parent(&file).unwrap();
        assert!(dir.path().join("a/b").is_dir());
        ensure_parent(Path::new("bare.txt")).unwrap();
    }
}
