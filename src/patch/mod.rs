//! Scoped source patches
//!
//! A [`ScopedPatch`] resets a file from its pristine backup, writes the
//! patched contents, and puts the pristine contents back when dropped. Every
//! job starts from the same pristine text, so repeated runs never stack the
//! same edit twice.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// b2 feature file listing valid `instruction-set=` values, relative to the
/// Boost source root.
pub const INSTRUCTION_SET_FEATURE: &str = "tools/build/src/tools/features/instruction-set-feature.jam";

/// Value added to the instruction-set feature.
const ARM64_VALUE: &str = "arm64";

/// Existing value the new one is inserted after.
const ARM_ANCHOR: &str = "armv7s";

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot patch {path}: '{anchor}' not found")]
    AnchorNotFound { path: PathBuf, anchor: &'static str },
}

/// A file patched for the lifetime of this guard.
#[derive(Debug)]
pub struct ScopedPatch {
    target: PathBuf,
    backup: PathBuf,
    restored: bool,
}

/// `<file>.orig`
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".orig");
    PathBuf::from(name)
}

impl ScopedPatch {
    /// Reset `target` from its backup (taking the backup on first use) and
    /// write `transform(pristine)` in its place.
    pub fn apply<F>(target: &Path, transform: F) -> Result<Self, PatchError>
    where
        F: FnOnce(&str) -> Result<String, PatchError>,
    {
        let backup = backup_path(target);
        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source| PatchError::Io { path, source }
        };

        if !backup.exists() {
            fs::copy(target, &backup).map_err(io(target))?;
        }
        let pristine = fs::read_to_string(&backup).map_err(io(&backup))?;
        let patched = transform(&pristine)?;
        fs::write(target, patched).map_err(io(target))?;
        debug!(file = %target.display(), "applied scoped patch");

        Ok(Self {
            target: target.to_path_buf(),
            backup,
            restored: false,
        })
    }

    /// Restore the pristine file now, reporting failures.
    pub fn restore(mut self) -> Result<(), PatchError> {
        self.restored = true;
        fs::copy(&self.backup, &self.target)
            .map(|_| ())
            .map_err(|source| PatchError::Io {
                path: self.target.clone(),
                source,
            })
    }
}

impl Drop for ScopedPatch {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = fs::copy(&self.backup, &self.target) {
            warn!(
                file = %self.target.display(),
                error = %e,
                "failed to restore pristine file"
            );
        }
    }
}

/// Add `arm64` to the instruction-set feature values.
///
/// Text that already lists `arm64` is returned unchanged.
pub fn add_arm64_instruction_set(path: &Path, pristine: &str) -> Result<String, PatchError> {
    if pristine.split_whitespace().any(|t| t == ARM64_VALUE) {
        return Ok(pristine.to_string());
    }
    let pos = find_token(pristine, ARM_ANCHOR).ok_or_else(|| PatchError::AnchorNotFound {
        path: path.to_path_buf(),
        anchor: ARM_ANCHOR,
    })?;

    let end = pos + ARM_ANCHOR.len();
    Ok(format!("{} {}{}", &pristine[..end], ARM64_VALUE, &pristine[end..]))
}

/// Byte offset of `token` as a whole whitespace-delimited word.
fn find_token(text: &str, token: &str) -> Option<usize> {
    text.match_indices(token).map(|(i, _)| i).find(|&i| {
        let before = text[..i].chars().next_back();
        let after = text[i + token.len()..].chars().next();
        before.map_or(true, char::is_whitespace) && after.map_or(true, char::is_whitespace)
    })
}

/// Patch the instruction-set feature file of a Boost source tree.
pub fn patch_instruction_set(src_dir: &Path) -> Result<ScopedPatch, PatchError> {
    let target = src_dir.join(INSTRUCTION_SET_FEATURE);
    let path = target.clone();
    ScopedPatch::apply(&target, move |pristine| add_arm64_instruction_set(&path, pristine))
}
