//! Mock tool adapter

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use boost_catalog::BuildUnit;

use super::failure::{FailureConfig, FailureInjector};
use crate::patch::INSTRUCTION_SET_FEATURE;
use crate::plan::BuildJob;
use crate::tools::{ExternalTools, ToolError, ToolOp, ToolResult};

/// Pristine instruction-set feature file placed in fake source trees.
const FAKE_FEATURE_JAM: &str = "feature.feature instruction-set\n    :\n        armv7 armv7s armv7k\n    : propagated optional ;\n";

/// One recorded tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Download { url: String, dest: PathBuf },
    Extract { archive: PathBuf, dest_dir: PathBuf },
    Bootstrap { src_dir: PathBuf },
    BuildIcu { units: Vec<String>, icu_dir: PathBuf },
    Build {
        unit: String,
        with_flags: Vec<String>,
        /// Whether the arm64 instruction-set patch was in place during the build
        patched: bool,
    },
    Lipo { inputs: Vec<PathBuf>, output: PathBuf },
    CreateXcframework { libraries: Vec<PathBuf>, output: PathBuf },
    GenerateWorkspace { project_dir: PathBuf },
}

impl ToolCall {
    pub fn op(&self) -> ToolOp {
        match self {
            ToolCall::Download { .. } => ToolOp::Download,
            ToolCall::Extract { .. } => ToolOp::Extract,
            ToolCall::Bootstrap { .. } => ToolOp::Bootstrap,
            ToolCall::BuildIcu { .. } => ToolOp::BuildIcu,
            ToolCall::Build { .. } => ToolOp::Build,
            ToolCall::Lipo { .. } => ToolOp::Lipo,
            ToolCall::CreateXcframework { .. } => ToolOp::CreateXcframework,
            ToolCall::GenerateWorkspace { .. } => ToolOp::GenerateWorkspace,
        }
    }
}

/// Recording, failure-injecting implementation of the tool seam
#[derive(Debug, Clone, Default)]
pub struct MockTools {
    calls: Arc<Mutex<Vec<ToolCall>>>,
    failures: Arc<Mutex<FailureInjector>>,
    served: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ToolError + '_ {
    move |source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_file(path: &Path, contents: &[u8]) -> ToolResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::write(path, contents).map_err(io_err(path))
}

impl MockTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `url` downloadable with the given payload.
    pub fn serve(&self, url: impl Into<String>, payload: Vec<u8>) {
        lock(&self.served).insert(url.into(), payload);
    }

    pub fn inject(&self, op: ToolOp, config: FailureConfig) {
        lock(&self.failures).inject(op, config);
    }

    pub fn inject_error(&self, op: ToolOp, message: impl Into<String>) {
        lock(&self.failures).inject_error(op, message);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<ToolCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn count(&self, op: ToolOp) -> usize {
        lock(&self.calls).iter().filter(|c| c.op() == op).count()
    }

    /// Output paths passed to `create_xcframework`, in order.
    pub fn xcframeworks(&self) -> Vec<PathBuf> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                ToolCall::CreateXcframework { output, .. } => Some(output.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ToolCall) -> ToolResult<()> {
        let op = call.op();
        lock(&self.calls).push(call);
        match lock(&self.failures).check(op) {
            Some(config) => Err(ToolError::Failed {
                tool: op,
                status: "exit status: 1".to_string(),
                detail: config.message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl ExternalTools for MockTools {
    fn download(&self, url: &str, dest: &Path) -> ToolResult<()> {
        self.record(ToolCall::Download {
            url: url.to_string(),
            dest: dest.to_path_buf(),
        })?;
        let payload = lock(&self.served).get(url).cloned();
        match payload {
            Some(bytes) => write_file(dest, &bytes),
            None => Err(ToolError::Failed {
                tool: ToolOp::Download,
                status: "exit status: 22".to_string(),
                detail: "The requested URL returned error: 404".to_string(),
            }),
        }
    }

    fn extract(&self, archive: &Path, dest_dir: &Path) -> ToolResult<()> {
        self.record(ToolCall::Extract {
            archive: archive.to_path_buf(),
            dest_dir: dest_dir.to_path_buf(),
        })?;
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let root = dest_dir.join(name.trim_end_matches(".tar.bz2"));

        write_file(&root.join("bootstrap.sh"), b"#!/bin/sh\n")?;
        write_file(&root.join("boost/version.hpp"), b"#define BOOST_VERSION 108700\n")?;
        write_file(&root.join("boost/atomic/atomic.hpp"), b"#pragma once\n")?;
        write_file(&root.join(INSTRUCTION_SET_FEATURE), FAKE_FEATURE_JAM.as_bytes())
    }

    fn bootstrap(&self, src_dir: &Path) -> ToolResult<()> {
        self.record(ToolCall::Bootstrap {
            src_dir: src_dir.to_path_buf(),
        })?;
        write_file(&src_dir.join("b2"), b"#!/bin/sh\n")
    }

    fn build_icu(&self, _script: &Path, units: &[BuildUnit], icu_dir: &Path) -> ToolResult<()> {
        self.record(ToolCall::BuildIcu {
            units: units.iter().map(BuildUnit::id).collect(),
            icu_dir: icu_dir.to_path_buf(),
        })?;
        for unit in units {
            write_file(&icu_dir.join(unit.id()).join("lib/libicuuc.a"), b"icu")?;
        }
        Ok(())
    }

    fn build(&self, job: &BuildJob, src_dir: &Path) -> ToolResult<()> {
        let patched = fs::read_to_string(src_dir.join(INSTRUCTION_SET_FEATURE))
            .map(|s| s.split_whitespace().any(|t| t == "arm64"))
            .unwrap_or(false);
        self.record(ToolCall::Build {
            unit: job.unit.id(),
            with_flags: job.with_flags.clone(),
            patched,
        })?;

        write_file(&job.user_config_path, job.b2_config.as_bytes())?;
        write_file(&job.log_path, b"...updated targets...\n")?;
        for archive in &job.archives {
            let contents = format!("{}:{}\n", job.unit.id(), archive);
            write_file(&job.lib_dir().join(format!("lib{archive}.a")), contents.as_bytes())?;
        }
        Ok(())
    }

    fn lipo(&self, inputs: &[PathBuf], output: &Path) -> ToolResult<()> {
        self.record(ToolCall::Lipo {
            inputs: inputs.to_vec(),
            output: output.to_path_buf(),
        })?;
        let mut merged = Vec::new();
        for input in inputs {
            merged.extend(fs::read(input).map_err(io_err(input))?);
        }
        write_file(output, &merged)
    }

    fn create_xcframework(&self, libraries: &[PathBuf], output: &Path) -> ToolResult<()> {
        self.record(ToolCall::CreateXcframework {
            libraries: libraries.to_vec(),
            output: output.to_path_buf(),
        })?;
        if output.exists() {
            return Err(ToolError::Failed {
                tool: ToolOp::CreateXcframework,
                status: "exit status: 70".to_string(),
                detail: format!("error: the path does not point to a valid xcframework: {}", output.display()),
            });
        }
        let listing: String = libraries
            .iter()
            .map(|l| format!("{}\n", l.display()))
            .collect();
        write_file(&output.join("Info.plist"), listing.as_bytes())
    }

    fn generate_workspace(&self, project_dir: &Path) -> ToolResult<()> {
        self.record(ToolCall::GenerateWorkspace {
            project_dir: project_dir.to_path_buf(),
        })?;
        let workspace = project_dir.join("Project.xcworkspace");
        fs::create_dir_all(&workspace).map_err(io_err(&workspace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_download_unserved_url_fails() {
        let dir = TempDir::new().unwrap();
        let tools = MockTools::new();
        let err = tools.download("https://nowhere/x", &dir.path().join("x")).unwrap_err();
        assert_eq!(err.tool(), Some(ToolOp::Download));
        assert_eq!(tools.count(ToolOp::Download), 1);
    }

    #[test]
    fn test_extract_creates_source_tree() {
        let dir = TempDir::new().unwrap();
        let tools = MockTools::new();
        tools
            .extract(&dir.path().join("boost_1_87_0.tar.bz2"), dir.path())
            .unwrap();

        let root = dir.path().join("boost_1_87_0");
        assert!(root.join("bootstrap.sh").is_file());
        assert!(root.join("boost/version.hpp").is_file());
        assert!(root.join(INSTRUCTION_SET_FEATURE).is_file());
    }

    #[test]
    fn test_injected_failure_is_recorded() {
        let dir = TempDir::new().unwrap();
        let tools = MockTools::new();
        tools.inject_error(ToolOp::Bootstrap, "no compiler");

        let err = tools.bootstrap(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no compiler"));
        assert_eq!(tools.calls().len(), 1);
        assert!(!dir.path().join("b2").exists());
    }

    #[test]
    fn test_lipo_concatenates_inputs() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.a");
        let b = dir.path().join("b.a");
        fs::write(&a, "arm64\n").unwrap();
        fs::write(&b, "x86_64\n").unwrap();

        let tools = MockTools::new();
        let out = dir.path().join("out/u.a");
        tools.lipo(&[a, b], &out).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "arm64\nx86_64\n");
    }

    #[test]
    fn test_clones_share_recordings() {
        let dir = TempDir::new().unwrap();
        let tools = MockTools::new();
        let clone = tools.clone();
        clone.generate_workspace(dir.path()).unwrap();

        assert_eq!(
            tools.calls(),
            vec![ToolCall::GenerateWorkspace {
                project_dir: dir.path().to_path_buf()
            }]
        );
        tools.clear_calls();
        assert!(clone.calls().is_empty());
    }
}
