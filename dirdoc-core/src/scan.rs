//! Breadth-first tree scanner with inherited ignore chains.
//!
//! Each scanned directory carries an [`IgnoreChain`]: the root-to-leaf
//! sequence of compiled `.dirdocignore` files governing it. A directory that
//! declares its own ignore file extends a copy of the inherited chain, so a
//! child's rules can never leak into a sibling or back into the parent.
//!
//! Pattern files use gitignore semantics (globs, trailing `/` for
//! directory-only rules, leading `!` for re-inclusion) and apply only within
//! the subtree of the directory declaring them.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the per-directory ignore file.
pub const IGNORE_FILE: &str = ".dirdocignore";

/// Directory names never descended into, regardless of ignore rules.
pub const SKIP_DIR_NAMES: &[&str] = &[".git", "node_modules", "target", "__pycache__"];

/// Fatal scanner failure. Any of these aborts the whole run: an unreadable
/// directory would make the tree listing silently incomplete.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read directory {path}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },
    #[error("failed to stat {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },
    #[error("scan root {0} is not a directory")]
    NotADirectory(PathBuf),
}

/// One compiled ignore file.
///
/// Patterns match relative to `origin`, the directory holding the file, and
/// have no opinion about paths outside that subtree.
#[derive(Debug)]
pub struct IgnoreRule {
    origin: PathBuf,
    matcher: Gitignore,
}

impl IgnoreRule {
    /// Compile `dir`'s ignore file, if present. Unreadable or partially
    /// invalid files degrade to whatever compiled, with a warning, matching
    /// how git treats broken ignore lines.
    pub fn load(dir: &Path) -> Option<Arc<IgnoreRule>> {
        let file = dir.join(IGNORE_FILE);
        if !file.is_file() {
            return None;
        }
        let mut builder = GitignoreBuilder::new(dir);
        if let Some(err) = builder.add(&file) {
            warn!(
                path = %file.display(),
                error = %err,
                "[SCAN] Ignore file only partially loaded"
            );
        }
        match builder.build() {
            Ok(matcher) => Some(Arc::new(IgnoreRule {
                origin: dir.to_path_buf(),
                matcher,
            })),
            Err(err) => {
                warn!(path = %file.display(), error = %err, "[SCAN] Ignore file skipped");
                None
            }
        }
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }
}

/// Root-to-leaf sequence of ignore rules inherited by one directory.
///
/// Appending returns a new chain; an extended child chain never aliases its
/// parent's storage. Rules are shared behind [`Arc`], so cloning a chain is
/// cheap.
#[derive(Debug, Clone, Default)]
pub struct IgnoreChain {
    rules: Vec<Arc<IgnoreRule>>,
}

impl IgnoreChain {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Copy this chain with `rule` appended.
    pub fn with_rule(&self, rule: Arc<IgnoreRule>) -> IgnoreChain {
        let mut rules = self.rules.clone();
        rules.push(rule);
        IgnoreChain { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Root-to-leaf verdict for `path`. The last rule with an opinion wins,
    /// so a leafward `!pattern` can re-include what an ancestor excluded.
    pub fn excludes(&self, path: &Path, is_dir: bool) -> bool {
        let mut excluded = false;
        for rule in &self.rules {
            // A rule only governs its own subtree.
            if !path.starts_with(rule.origin()) {
                continue;
            }
            let verdict = rule.matcher.matched(path, is_dir);
            if verdict.is_ignore() {
                excluded = true;
            } else if verdict.is_whitelist() {
                excluded = false;
            }
        }
        excluded
    }
}

/// Ordered scan output: directories breadth-first (parents before children,
/// siblings in name order) plus each directory's ignore chain.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub dirs: Vec<PathBuf>,
    pub chains: HashMap<PathBuf, IgnoreChain>,
}

/// Whether a child directory should be descended into. Shared with content
/// gathering so both sides agree about which children exist.
pub fn admits_child_dir(name: &str, path: &Path, chain: &IgnoreChain) -> bool {
    if SKIP_DIR_NAMES.contains(&name) {
        return false;
    }
    if name.starts_with('.') {
        return false;
    }
    !chain.excludes(path, true)
}

/// Walk `root` breadth-first, building each directory's ignore chain as the
/// walk descends.
pub fn scan(root: &Path) -> Result<ScanOutcome, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut outcome = ScanOutcome::default();
    let mut queue: VecDeque<(PathBuf, IgnoreChain)> = VecDeque::new();
    queue.push_back((root.to_path_buf(), IgnoreChain::new()));

    while let Some((dir, inherited)) = queue.pop_front() {
        // The directory's own ignore file extends a copy of the inherited
        // chain; the extended chain also governs its subtree.
        let chain = match IgnoreRule::load(&dir) {
            Some(rule) => inherited.with_rule(rule),
            None => inherited,
        };

        let mut children = read_child_dirs(&dir)?;
        children.sort();
        for child in children {
            let name = match child.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => {
                    warn!(
                        path = %child.display(),
                        "[SCAN] Skipping directory with non-UTF-8 name"
                    );
                    continue;
                }
            };
            if admits_child_dir(&name, &child, &chain) {
                queue.push_back((child, chain.clone()));
            } else {
                debug!(path = %child.display(), "[SCAN] Child directory excluded");
            }
        }

        debug!(dir = %dir.display(), rules = chain.len(), "[SCAN] Directory admitted");
        outcome.dirs.push(dir.clone());
        outcome.chains.insert(dir, chain);
    }

    Ok(outcome)
}

/// Child directories of `dir`. Symlinks are reported as symlinks by
/// `DirEntry::file_type` and therefore never descended into.
fn read_child_dirs(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|source| ScanError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ScanError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_type = entry.file_type().map_err(|source| ScanError::Stat {
            path: entry.path(),
            source,
        })?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}
