//! Incremental build state
//!
//! Two levels of reuse:
//! - the build record: canonical platform and library strings of the last
//!   fully successful run. A matching record skips the whole run.
//! - unit markers: per (platform, arch) list of the libraries built there.
//!   A marker whose list covers the request skips that unit's b2 invocation.
//!
//! Layout under the build directory:
//!
//! ```text
//! frameworks.built.platforms
//! frameworks.built.libs
//! markers/<platform>-<arch>.built
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use boost_catalog::BuildUnit;
use thiserror::Error;
use tracing::debug;

use crate::options::{LibrarySet, ResolvedConfig};

/// Build state errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("build state I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Persisted build record and unit markers.
#[derive(Debug, Clone)]
pub struct BuildStateCache {
    root: PathBuf,
}

impl BuildStateCache {
    pub const PLATFORMS_FILENAME: &'static str = "frameworks.built.platforms";
    pub const LIBS_FILENAME: &'static str = "frameworks.built.libs";
    pub const MARKERS_DIR: &'static str = "markers";

    /// Cache rooted at the build directory.
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: build_dir.into(),
        }
    }

    fn platforms_path(&self) -> PathBuf {
        self.root.join(Self::PLATFORMS_FILENAME)
    }

    fn libs_path(&self) -> PathBuf {
        self.root.join(Self::LIBS_FILENAME)
    }

    fn markers_dir(&self) -> PathBuf {
        self.root.join(Self::MARKERS_DIR)
    }

    /// Marker file for one build unit.
    pub fn marker_path(&self, unit: BuildUnit) -> PathBuf {
        self.markers_dir().join(format!("{}.built", unit.id()))
    }

    /// True when the whole run can be skipped.
    ///
    /// Requires no rebuild flag (`--rebuild` or `--rebuildicu`), both record
    /// files present, and both canonical strings equal to the request's.
    pub fn should_skip_build(&self, resolved: &ResolvedConfig) -> bool {
        if resolved.rebuild || resolved.rebuild_icu {
            return false;
        }
        let (Some(platforms), Some(libs)) = (
            read_trimmed(&self.platforms_path()),
            read_trimmed(&self.libs_path()),
        ) else {
            return false;
        };

        let matches = platforms == resolved.platforms.canonical()
            && libs == resolved.libraries.canonical();
        debug!(
            recorded_platforms = %platforms,
            recorded_libs = %libs,
            matches,
            "checked build record"
        );
        matches
    }

    /// Delete the build record. Called before any build work starts so a
    /// failed attempt never leaves a record behind.
    pub fn invalidate(&self) -> CacheResult<()> {
        remove_if_exists(&self.platforms_path())?;
        remove_if_exists(&self.libs_path())
    }

    /// Whether a build record is currently persisted.
    pub fn has_record(&self) -> bool {
        self.platforms_path().is_file() && self.libs_path().is_file()
    }

    /// Delete every unit marker.
    pub fn clear_units(&self) -> CacheResult<()> {
        let dir = self.markers_dir();
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&dir)(e)),
        }
    }

    /// Persist the record after a fully successful run.
    pub fn record_success(&self, resolved: &ResolvedConfig) -> CacheResult<()> {
        fs::create_dir_all(&self.root).map_err(io_err(&self.root))?;
        write_atomic(&self.platforms_path(), &resolved.platforms.canonical())?;
        write_atomic(&self.libs_path(), &resolved.libraries.canonical())
    }

    /// True when `unit` was already built with at least `libraries`.
    ///
    /// The recorded set only has to be a superset of the request: a unit
    /// built with more libraries than needed is reused as is.
    pub fn should_skip_unit(&self, unit: BuildUnit, libraries: &LibrarySet, rebuild: bool) -> bool {
        if rebuild {
            return false;
        }
        match self.unit_libraries(unit) {
            Some(built) => {
                let covered = built.is_superset(libraries);
                debug!(unit = %unit, built = %built, covered, "checked unit marker");
                covered
            }
            None => false,
        }
    }

    /// Libraries recorded for a unit, if it has a marker.
    pub fn unit_libraries(&self, unit: BuildUnit) -> Option<LibrarySet> {
        read_trimmed(&self.marker_path(unit)).map(|s| LibrarySet::from_canonical(&s))
    }

    /// Record that `unit` was built with `libraries`.
    pub fn mark_unit_built(&self, unit: BuildUnit, libraries: &LibrarySet) -> CacheResult<()> {
        let dir = self.markers_dir();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        write_atomic(&self.marker_path(unit), &libraries.canonical())
    }

    /// Remove one unit's marker (before rebuilding it).
    pub fn clear_unit(&self, unit: BuildUnit) -> CacheResult<()> {
        remove_if_exists(&self.marker_path(unit))
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn remove_if_exists(path: &Path) -> CacheResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path)(e)),
    }
}

/// Write through a temp file and rename.
fn write_atomic(path: &Path, contents: &str) -> CacheResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, format!("{contents}\n")).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))
}
