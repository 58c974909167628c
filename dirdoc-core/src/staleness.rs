//! Freshness decisions: artifact mtimes against input mtimes, plus the
//! run-scoped regeneration signal that bubbles up from regenerated
//! descendants.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, trace};

use crate::artifact;
use crate::scan::{admits_child_dir, IgnoreChain};

/// Non-fatal probe failure. Callers treat an undecidable directory as stale
/// and attempt it anyway.
#[derive(Debug, Error)]
pub enum StaleError {
    #[error("failed to read directory {path}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },
    #[error("failed to stat {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },
}

/// Tracks which directories must regenerate during one run.
///
/// The forced set exists for a single run only: it is how a regenerated
/// child forces its ancestors to fold the fresh summary into their own.
#[derive(Debug, Default)]
pub struct StalenessTracker {
    forced: HashSet<PathBuf>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_forced(&self, dir: &Path) -> bool {
        self.forced.contains(dir)
    }

    /// Mark every ancestor of `dir` up to and including `root` as needing
    /// regeneration. `dir` itself is not marked.
    pub fn mark_ancestors(&mut self, dir: &Path, root: &Path) {
        if dir == root || !dir.starts_with(root) {
            return;
        }
        let mut current = dir.parent();
        while let Some(ancestor) = current {
            self.forced.insert(ancestor.to_path_buf());
            if ancestor == root {
                break;
            }
            current = ancestor.parent();
        }
    }

    /// Decide whether `dir` needs a fresh artifact.
    ///
    /// Order of precedence: the run-wide force flag, then the forced set
    /// (both win regardless of timestamps), then artifact absence, then the
    /// newest input mtime against the artifact mtime.
    pub fn is_stale(
        &self,
        dir: &Path,
        chain: &IgnoreChain,
        global_force: bool,
    ) -> Result<bool, StaleError> {
        if global_force {
            debug!(dir = %dir.display(), "[STALE] Forced by run flag");
            return Ok(true);
        }
        if self.is_forced(dir) {
            debug!(dir = %dir.display(), "[STALE] Forced by regenerated descendant");
            return Ok(true);
        }
        let found = match artifact::find(dir) {
            Some(found) => found,
            None => {
                debug!(dir = %dir.display(), "[STALE] No artifact present");
                return Ok(true);
            }
        };
        let newest = newest_input_mtime(dir, chain)?;
        let stale = match newest {
            Some(mtime) => mtime > found.modified,
            None => false,
        };
        trace!(dir = %dir.display(), stale, "[STALE] Compared input mtimes");
        Ok(stale)
    }
}

/// Newest modification time of any input under `dir`, recursively.
///
/// Inputs exclude hidden entries (which covers the artifact files), fixed
/// skip directories and chain-excluded paths, mirroring what gathering
/// would feed into a prompt.
fn newest_input_mtime(dir: &Path, chain: &IgnoreChain) -> Result<Option<SystemTime>, StaleError> {
    let mut newest: Option<SystemTime> = None;
    let entries = fs::read_dir(dir).map_err(|source| StaleError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| StaleError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let file_type = entry.file_type().map_err(|source| StaleError::Stat {
            path: path.clone(),
            source,
        })?;
        if file_type.is_dir() {
            if !admits_child_dir(&name, &path, chain) {
                continue;
            }
            if let Some(mtime) = newest_input_mtime(&path, chain)? {
                newest = Some(newest.map_or(mtime, |current| current.max(mtime)));
            }
        } else if file_type.is_file() {
            if name.starts_with('.') {
                continue;
            }
            if chain.excludes(&path, false) {
                continue;
            }
            let metadata = entry.metadata().map_err(|source| StaleError::Stat {
                path: path.clone(),
                source,
            })?;
            let mtime = metadata.modified().map_err(|source| StaleError::Stat {
                path,
                source,
            })?;
            newest = Some(newest.map_or(mtime, |current| current.max(mtime)));
        }
    }
    Ok(newest)
}
