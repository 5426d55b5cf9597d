//! Option resolution
//!
//! Turns the raw `--libs` / `--platforms` / Python arguments into a validated,
//! canonical [`ResolvedConfig`]:
//! 1. validate library names against the catalog
//! 2. expand platform tokens into build units, checking optional SDKs
//! 3. canonicalize both sets
//! 4. derive Python link metadata when `python` is requested

mod sets;

pub use sets::{LibrarySet, PlatformSet};

use std::path::{Path, PathBuf};

use boost_catalog::{default_libraries, is_known_library, CatalogError, PlatformCatalog};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Raw user request, as received from the command line.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    /// Comma-separated libraries; `None` means the default list.
    pub libraries: Option<String>,
    /// Comma-separated platform tokens; `None` means the default list.
    pub platforms: Option<String>,
    pub python_include: Option<PathBuf>,
    pub python_lib: Option<PathBuf>,
    pub rebuild: bool,
    pub rebuild_icu: bool,
}

/// How to compile and link against the host-supplied Python.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonLink {
    pub include_dir: PathBuf,
    /// Directory containing the static library.
    pub lib_dir: PathBuf,
    /// Name passed to `-l`, e.g. `python3.11`.
    pub link_name: String,
    /// Dotted version, e.g. `3.11` (empty when the name carries none).
    pub version: String,
    /// Version digits used in the Boost.Python archive name, e.g. `311`.
    pub archive_suffix: String,
}

impl PythonLink {
    /// Derive link metadata from the include dir and static library path.
    pub fn derive(include_dir: &Path, library: &Path) -> Self {
        let file_name = library
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        let link_name = link_name_from_file(&file_name);
        let version = link_name
            .strip_prefix("python")
            .unwrap_or_default()
            .to_string();
        let archive_suffix = version.chars().filter(|c| c.is_ascii_digit()).collect();
        let lib_dir = library
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            include_dir: include_dir.to_path_buf(),
            lib_dir,
            link_name,
            version,
            archive_suffix,
        }
    }
}

/// `libpython3.11.a` -> `python3.11`
pub fn link_name_from_file(file_name: &str) -> String {
    let name = file_name.strip_prefix("lib").unwrap_or(file_name);
    name.strip_suffix(".a").unwrap_or(name).to_string()
}

/// Validated, canonical build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub libraries: LibrarySet,
    pub platforms: PlatformSet,
    pub python: Option<PythonLink>,
    pub rebuild: bool,
    pub rebuild_icu: bool,
}

impl ResolvedConfig {
    /// Version tag used in the Boost.Python archive name.
    pub fn python_suffix(&self) -> Option<&str> {
        self.python.as_ref().map(|p| p.archive_suffix.as_str())
    }
}

/// Option resolution errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown library '{0}'")]
    UnknownLibrary(String),

    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("SDK for platform '{platform}' is not installed (expected {})", .sdk_root.display())]
    MissingSdk { platform: String, sdk_root: PathBuf },

    #[error("python requested but {0} is missing (pass both --python-include and --python-lib)")]
    MissingPythonConfig(&'static str),
}

impl From<CatalogError> for ResolveError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownPlatform(p) => ResolveError::UnknownPlatform(p),
        }
    }
}

/// Split a comma list, dropping blanks. An empty result means "use the default".
fn split_list(raw: Option<&str>) -> Vec<&str> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Resolve a request against the catalog.
pub fn resolve(
    request: &ResolveRequest,
    catalog: &PlatformCatalog,
) -> Result<ResolvedConfig, ResolveError> {
    let mut requested_libs = split_list(request.libraries.as_deref());
    if requested_libs.is_empty() {
        requested_libs = default_libraries(catalog.host().clang_major);
    }
    let mut libraries = LibrarySet::new();
    for lib in requested_libs {
        if !is_known_library(lib) {
            return Err(ResolveError::UnknownLibrary(lib.to_string()));
        }
        libraries.insert(lib);
    }

    let mut tokens = split_list(request.platforms.as_deref());
    if tokens.is_empty() {
        tokens = catalog.default_tokens();
    }
    let mut platforms = PlatformSet::new();
    for token in tokens {
        let units = catalog.expand(token)?;
        for unit in units {
            let spec = unit.platform.spec();
            if spec.sdk_optional && !catalog.sdk_present(unit.platform) {
                return Err(ResolveError::MissingSdk {
                    platform: unit.platform.to_string(),
                    sdk_root: catalog.sdk_root(unit.platform),
                });
            }
            platforms.insert(unit);
        }
    }

    let python = if libraries.contains("python") {
        let include = request
            .python_include
            .as_deref()
            .ok_or(ResolveError::MissingPythonConfig("the Python include directory"))?;
        let lib = request
            .python_lib
            .as_deref()
            .ok_or(ResolveError::MissingPythonConfig("the Python static library"))?;
        Some(PythonLink::derive(include, lib))
    } else {
        None
    };

    debug!(
        libraries = %libraries,
        platforms = %platforms,
        "resolved build request"
    );

    Ok(ResolvedConfig {
        libraries,
        platforms,
        python,
        rebuild: request.rebuild,
        rebuild_icu: request.rebuild_icu,
    })
}
