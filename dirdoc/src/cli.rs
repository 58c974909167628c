///
/// This module implements the CLI interface for dirdoc: command parsing,
/// argument validation and the async entrypoint.
///
/// All core business logic (scanning, staleness, generation, persistence)
/// lives in the [`dirdoc-core`] crate. This module is strictly CLI glue:
/// it loads configuration, wires up the provider chain, drives a run and
/// renders the report.
///
/// ## How To Use
/// - For command-line users: run the installed `dirdoc` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed
///   [`Cli`].
///
/// ## Extending
/// When adding subcommands, update [`Commands`] below and keep non-trivial
/// logic inside `dirdoc-core`.
///
/// [`dirdoc-core`]: ../../dirdoc-core/
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dirdoc_core::failover::FailoverClient;
use dirdoc_core::orchestrate::{self, RunReport};
use dirdoc_core::providers::build_tiers;

use crate::load_config::{load_config, LoadedConfig};

/// CLI for dirdoc: keep one generated summary document per directory.
#[derive(Parser)]
#[clap(
    name = "dirdoc",
    version,
    about = "Generate and refresh per-directory summary documents for a source tree"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a tree and regenerate stale directory summaries
    Generate {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Override the root directory declared in the config file
        #[clap(long)]
        root: Option<PathBuf>,
        /// Regenerate every directory regardless of timestamps
        #[clap(long)]
        force: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate {
            config,
            root,
            force,
        } => generate(config, root, force).await,
    }
}

async fn generate(config_path: PathBuf, root: Option<PathBuf>, force: bool) -> Result<()> {
    let LoadedConfig {
        run: run_config,
        tiers,
        retry,
    } = load_config(&config_path, root, force)?;
    run_config.trace_loaded();

    let tiers = build_tiers(&tiers).context("Failed to construct provider tiers")?;
    let client =
        FailoverClient::new(tiers, retry).context("Failed to construct failover client")?;
    tracing::info!(provider = %client.chain_label(), "Provider chain ready");

    let progress: &orchestrate::ProgressFn = &|done, total| {
        println!("[{done}/{total}] directories processed");
    };
    let report = orchestrate::run(&run_config, &client, Some(progress))
        .await
        .context("Scan failed")?;

    print_report(&report);

    if let Err(e) = client.close().await {
        tracing::warn!(error = %e, "Provider shutdown reported errors");
    }

    let failed = report.failures();
    if failed > 0 {
        bail!("{failed} of {} directories failed", report.outcomes.len());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "Processed {} directories: {} succeeded, {} failed",
        report.outcomes.len(),
        report.successes(),
        report.failures()
    );
    for outcome in &report.outcomes {
        if let Some(error) = &outcome.error {
            println!(
                "  FAILED {} (attempts: {}): {}",
                outcome.dir.display(),
                outcome.attempts,
                error
            );
        }
    }
}
