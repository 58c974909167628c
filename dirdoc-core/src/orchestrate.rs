//! High-level pipeline: scan → staleness gate → gather → generate → persist,
//! one directory at a time, leaf-first.
//!
//! Directories are processed in reverse scan order so every child is handled
//! before its parent; a parent's prompt can then fold in the fresh child
//! artifacts. A directory regenerating successfully forces its ancestors via
//! the run-scoped [`StalenessTracker`], which is how changes bubble up to
//! the root.
//!
//! # Error Handling
//! Only a scanner failure aborts a run. Everything per-directory (an
//! undecidable staleness probe, exhausted failover, a rejected artifact
//! path, a failed write) is recorded in that directory's [`DirOutcome`] and
//! the run continues.
//!
//! # Callable From
//! - The CLI crate and integration tests, with a mocked or real
//!   [`FailoverClient`].

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artifact;
use crate::config::RunConfig;
use crate::failover::FailoverClient;
use crate::gather;
use crate::prompt;
use crate::scan::{self, IgnoreChain, ScanError};
use crate::staleness::StalenessTracker;

/// Stub written for a directory with no entries at all.
pub const EMPTY_DIR_STUB: &str = "No files or subdirectories are present in this directory.\n";
/// Stub written when entries exist but none are documentable.
pub const FILTERED_DIR_STUB: &str = "This directory contains no documentable content; its entries are hidden, binary, or excluded by ignore rules.\n";

/// Per-directory result record.
#[derive(Debug, Clone)]
pub struct DirOutcome {
    pub dir: PathBuf,
    /// Failover passes consumed; zero for cache hits and stub writes.
    pub attempts: u32,
    pub success: bool,
    /// Tier that produced the summary, when the service was called.
    pub provider: Option<String>,
    pub error: Option<String>,
}

/// Ordered outcome list for one run, leaf-first like processing order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<DirOutcome>,
}

impl RunReport {
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.success).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }
}

/// Progress hook invoked after each directory: (processed, total).
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Run one full documentation pass over `config.root`.
pub async fn run(
    config: &RunConfig,
    client: &FailoverClient,
    progress: Option<&ProgressFn>,
) -> Result<RunReport, ScanError> {
    let run_id = Uuid::new_v4();
    info!(
        run_id = %run_id,
        root = %config.root.display(),
        provider = %client.chain_label(),
        force = config.force,
        "[RUN] Starting documentation pass"
    );

    let scanned = scan::scan(&config.root)?;
    let total = scanned.dirs.len();
    info!(run_id = %run_id, directories = total, "[RUN] Scan complete");

    // The forced set lives and dies with this run.
    let mut tracker = StalenessTracker::new();
    let mut report = RunReport::default();

    for (index, dir) in scanned.dirs.iter().rev().enumerate() {
        let chain = scanned.chains.get(dir).cloned().unwrap_or_default();
        let outcome = process_dir(config, client, &mut tracker, dir, &chain).await;
        report.outcomes.push(outcome);
        if let Some(callback) = progress {
            callback(index + 1, total);
        }
    }

    info!(
        run_id = %run_id,
        processed = report.outcomes.len(),
        succeeded = report.successes(),
        failed = report.failures(),
        "[RUN] Documentation pass finished"
    );
    Ok(report)
}

async fn process_dir(
    config: &RunConfig,
    client: &FailoverClient,
    tracker: &mut StalenessTracker,
    dir: &Path,
    chain: &IgnoreChain,
) -> DirOutcome {
    let stale = match tracker.is_stale(dir, chain, config.force) {
        Ok(stale) => stale,
        Err(err) => {
            warn!(
                dir = %dir.display(),
                error = %err,
                "[RUN] Staleness undecidable, regenerating"
            );
            true
        }
    };
    if !stale {
        debug!(dir = %dir.display(), "[RUN] Fresh artifact, skipping");
        return DirOutcome {
            dir: dir.to_path_buf(),
            attempts: 0,
            success: true,
            provider: None,
            error: None,
        };
    }

    let contents = gather::gather(dir, chain, config.max_file_bytes);

    // Nothing to feed a prompt: write a deterministic stub without touching
    // the service. Which stub depends on whether entries existed at all.
    if contents.is_empty() {
        let stub = if contents.raw_entries == 0 {
            EMPTY_DIR_STUB
        } else {
            FILTERED_DIR_STUB
        };
        info!(
            dir = %dir.display(),
            raw_entries = contents.raw_entries,
            "[RUN] Writing stub, nothing documentable"
        );
        return match artifact::write(&config.root, dir, stub) {
            Ok(_) => {
                tracker.mark_ancestors(dir, &config.root);
                DirOutcome {
                    dir: dir.to_path_buf(),
                    attempts: 0,
                    success: true,
                    provider: None,
                    error: None,
                }
            }
            Err(err) => {
                error!(dir = %dir.display(), error = %err, "[RUN] Stub write failed");
                DirOutcome {
                    dir: dir.to_path_buf(),
                    attempts: 0,
                    success: false,
                    provider: None,
                    error: Some(err.to_string()),
                }
            }
        };
    }

    let dir_rel = dir
        .strip_prefix(&config.root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(|rel| rel.display().to_string())
        .unwrap_or_else(|| ".".to_string());
    let rendered = prompt::render(
        &config.prompt_template,
        &dir_rel,
        &contents.child_summaries,
        &contents.files,
    );

    match client.count_tokens(&rendered).await {
        Ok(tokens) => {
            debug!(dir = %dir.display(), prompt_tokens = tokens, "[RUN] Prompt sized")
        }
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "[RUN] Token estimate unavailable")
        }
    }

    match client.generate(&rendered).await {
        Ok(generated) => {
            let text = prompt::clean_response(&generated.text);
            match artifact::write(&config.root, dir, &text) {
                Ok(path) => {
                    info!(
                        dir = %dir.display(),
                        provider = %generated.provider,
                        attempts = generated.attempts,
                        artifact = %path.display(),
                        "[RUN] Summary written"
                    );
                    tracker.mark_ancestors(dir, &config.root);
                    DirOutcome {
                        dir: dir.to_path_buf(),
                        attempts: generated.attempts,
                        success: true,
                        provider: Some(generated.provider),
                        error: None,
                    }
                }
                Err(err) => {
                    error!(dir = %dir.display(), error = %err, "[RUN] Artifact write failed");
                    DirOutcome {
                        dir: dir.to_path_buf(),
                        attempts: generated.attempts,
                        success: false,
                        provider: Some(generated.provider),
                        error: Some(err.to_string()),
                    }
                }
            }
        }
        Err(err) => {
            error!(dir = %dir.display(), error = %err, "[RUN] Generation failed");
            DirOutcome {
                dir: dir.to_path_buf(),
                attempts: client.max_attempts(),
                success: false,
                provider: None,
                error: Some(err.to_string()),
            }
        }
    }
}
