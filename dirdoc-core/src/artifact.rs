//! Summary artifact persistence: naming, lookup with legacy fallback, and
//! atomic writes confined to the scanned tree.

use std::fs;
use std::io;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Filename written for every directory summary.
pub const ARTIFACT_FILE: &str = ".dirdoc.md";
/// Older filename still honored when reading existing trees. Never written.
pub const LEGACY_ARTIFACT_FILE: &str = ".dirsummary.md";

/// Whether `name` is one of the artifact filenames, and therefore never an
/// input to summarization.
pub fn is_artifact_name(name: &str) -> bool {
    name == ARTIFACT_FILE || name == LEGACY_ARTIFACT_FILE
}

/// A candidate path tried to escape the scanned tree.
#[derive(Debug, Error)]
#[error("path {} escapes base directory {}", candidate.display(), base.display())]
pub struct PathValidationError {
    pub base: PathBuf,
    pub candidate: PathBuf,
}

/// Failure persisting an artifact. Non-fatal: the directory is reported
/// failed and the run continues.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Path(#[from] PathValidationError),
    #[error("failed to write artifact {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// An existing artifact on disk.
#[derive(Debug, Clone)]
pub struct FoundArtifact {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Locate `dir`'s artifact, preferring the current filename over the legacy
/// one. Unreadable candidates count as absent.
pub fn find(dir: &Path) -> Option<FoundArtifact> {
    for name in [ARTIFACT_FILE, LEGACY_ARTIFACT_FILE] {
        let path = dir.join(name);
        if let Ok(metadata) = fs::metadata(&path) {
            if metadata.is_file() {
                if let Ok(modified) = metadata.modified() {
                    return Some(FoundArtifact { path, modified });
                }
            }
        }
    }
    None
}

/// Read `dir`'s artifact text, preferring the current filename.
pub fn read_text(dir: &Path) -> Option<String> {
    for name in [ARTIFACT_FILE, LEGACY_ARTIFACT_FILE] {
        let path = dir.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => return Some(text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "[ARTIFACT] Unreadable artifact skipped"
                );
                continue;
            }
        }
    }
    None
}

/// Lexically normalize `candidate` and reject it when it escapes `base`.
/// Purely textual: the filesystem is not consulted, so the check also holds
/// for paths that do not exist yet.
pub fn confine(base: &Path, candidate: &Path) -> Result<PathBuf, PathValidationError> {
    let escape = || PathValidationError {
        base: base.to_path_buf(),
        candidate: candidate.to_path_buf(),
    };

    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(escape());
                }
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.starts_with(base) {
        Ok(normalized)
    } else {
        Err(escape())
    }
}

/// Atomically replace `dir`'s artifact with `text`.
///
/// The temp file is created in `dir` itself so the final rename stays on one
/// filesystem. On unix the artifact ends up mode `0o600`.
pub fn write(root: &Path, dir: &Path, text: &str) -> Result<PathBuf, ArtifactError> {
    let target = confine(root, &dir.join(ARTIFACT_FILE))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| ArtifactError::Io {
        path: target.clone(),
        source,
    })?;
    tmp.write_all(text.as_bytes())
        .map_err(|source| ArtifactError::Io {
            path: target.clone(),
            source,
        })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600)).map_err(|source| {
            ArtifactError::Io {
                path: target.clone(),
                source,
            }
        })?;
    }
    tmp.persist(&target).map_err(|err| ArtifactError::Io {
        path: target.clone(),
        source: err.error,
    })?;

    debug!(path = %target.display(), bytes = text.len(), "[ARTIFACT] Wrote summary");
    Ok(target)
}
