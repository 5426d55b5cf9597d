//! Boost source archive download with checksum verification

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::ExternalTools;
use crate::config::BoostSource;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not download {archive} from any mirror:\n  {}", .attempts.join("\n  "))]
    Download {
        archive: String,
        /// One `<url>: <reason>` line per mirror tried.
        attempts: Vec<String>,
    },

    #[error("archive I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Fetches the configured Boost release into a download directory.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher<'a> {
    source: &'a BoostSource,
    download_dir: PathBuf,
}

impl<'a> ArchiveFetcher<'a> {
    pub fn new(source: &'a BoostSource, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            download_dir: download_dir.into(),
        }
    }

    /// Final location of the verified archive.
    pub fn archive_path(&self) -> PathBuf {
        self.download_dir.join(self.source.archive_name())
    }

    fn verified(&self, path: &Path) -> bool {
        match sha256_file(path) {
            Ok(digest) => digest.eq_ignore_ascii_case(&self.source.sha256),
            Err(_) => false,
        }
    }

    /// Return the path of a verified archive, downloading it if needed.
    ///
    /// Mirrors are tried in order. A download whose checksum does not match
    /// counts as a failed mirror.
    pub fn fetch(&self, tools: &dyn ExternalTools) -> Result<PathBuf, FetchError> {
        let archive = self.archive_path();
        if archive.is_file() {
            if self.verified(&archive) {
                debug!(archive = %archive.display(), "reusing verified archive");
                return Ok(archive);
            }
            warn!(archive = %archive.display(), "existing archive failed verification, downloading again");
            remove_file(&archive)?;
        }

        fs::create_dir_all(&self.download_dir).map_err(|source| FetchError::Io {
            path: self.download_dir.clone(),
            source,
        })?;

        let partial = archive.with_extension("bz2.part");
        let mut attempts = Vec::new();
        for url in self.source.mirror_urls() {
            info!(url = %url, "downloading boost {}", self.source.version);
            let reason = match tools.download(&url, &partial) {
                Err(e) => e.to_string(),
                Ok(()) if !self.verified(&partial) => "checksum mismatch".to_string(),
                Ok(()) => {
                    fs::rename(&partial, &archive).map_err(|source| FetchError::Io {
                        path: archive.clone(),
                        source,
                    })?;
                    return Ok(archive);
                }
            };
            warn!(url = %url, reason = %reason, "mirror failed");
            remove_file(&partial)?;
            attempts.push(format!("{url}: {reason}"));
        }

        Err(FetchError::Download {
            archive: self.source.archive_name(),
            attempts,
        })
    }
}

fn remove_file(path: &Path) -> Result<(), FetchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FetchError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTools;
    use crate::tools::ToolOp;
    use tempfile::TempDir;

    const PAYLOAD: &[u8] = b"boost source archive";

    fn digest(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    fn source(mirrors: &[&str]) -> BoostSource {
        BoostSource {
            version: "1.87.0".to_string(),
            sha256: digest(PAYLOAD),
            mirrors: mirrors.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_sha256_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, PAYLOAD).unwrap();
        assert_eq!(sha256_file(&path).unwrap(), digest(PAYLOAD));
    }

    #[test]
    fn test_downloads_from_first_good_mirror() {
        let dir = TempDir::new().unwrap();
        let source = source(&["https://a/{version}/x.tar.bz2", "https://b/{version_underscored}.tar.bz2"]);
        let tools = MockTools::new();
        tools.serve("https://a/1.87.0/x.tar.bz2", b"corrupted".to_vec());
        tools.serve("https://b/1_87_0.tar.bz2", PAYLOAD.to_vec());

        let fetcher = ArchiveFetcher::new(&source, dir.path());
        let archive = fetcher.fetch(&tools).unwrap();

        assert_eq!(archive, dir.path().join("boost_1_87_0.tar.bz2"));
        assert_eq!(fs::read(&archive).unwrap(), PAYLOAD);
        assert_eq!(tools.count(ToolOp::Download), 2);
        assert!(!archive.with_extension("bz2.part").exists());
    }

    #[test]
    fn test_reuses_verified_archive() {
        let dir = TempDir::new().unwrap();
        let source = source(&["https://a/x.tar.bz2"]);
        fs::write(dir.path().join("boost_1_87_0.tar.bz2"), PAYLOAD).unwrap();
        let tools = MockTools::new();

        ArchiveFetcher::new(&source, dir.path()).fetch(&tools).unwrap();
        assert_eq!(tools.count(ToolOp::Download), 0);
    }

    #[test]
    fn test_replaces_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let source = source(&["https://a/x.tar.bz2"]);
        fs::write(dir.path().join("boost_1_87_0.tar.bz2"), b"truncated").unwrap();
        let tools = MockTools::new();
        tools.serve("https://a/x.tar.bz2", PAYLOAD.to_vec());

        let archive = ArchiveFetcher::new(&source, dir.path()).fetch(&tools).unwrap();
        assert_eq!(fs::read(archive).unwrap(), PAYLOAD);
    }

    #[test]
    fn test_all_mirrors_failing_names_each() {
        let dir = TempDir::new().unwrap();
        let source = source(&["https://a/x.tar.bz2", "https://b/x.tar.bz2"]);
        let tools = MockTools::new();
        tools.serve("https://b/x.tar.bz2", b"wrong bytes".to_vec());

        let err = ArchiveFetcher::new(&source, dir.path()).fetch(&tools).unwrap_err();
        match &err {
            FetchError::Download { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].starts_with("https://a/x.tar.bz2: "));
                assert_eq!(attempts[1], "https://b/x.tar.bz2: checksum mismatch");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("https://a/x.tar.bz2"));
        assert!(!dir.path().join("boost_1_87_0.tar.bz2").exists());
    }
}
