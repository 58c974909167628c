/// `load_config` module: loads the static YAML config — including
/// environment secret injection — into the strongly-typed run configuration.
///
/// This module is the only place where untrusted YAML is parsed and mapped
/// to rich internal structs.
///
/// # Responsibilities
/// - Parse user-supplied YAML configuration files into type-safe structs
/// - Inject environment variables for secret fields (API keys): the YAML
///   names the variable, never the credential itself
/// - Apply defaults for optional knobs (file size cap, timeouts, retry
///   passes, prompt template)
/// - Fail fast with clear diagnostics: a missing key variable or absent
///   root directory aborts before any provider is constructed
///
/// # Errors
/// All errors here use `anyhow::Error` for context-rich diagnostics and are
/// surfaced at the CLI boundary.
///
/// For the accepted YAML schema, see the README.
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirdoc_core::config::{ProviderKind, RunConfig, TierConfig};
use dirdoc_core::failover::RetryPolicy;
use serde::Deserialize;
use tracing::{error, info};

/// Built-in prompt template used when the config file does not supply one.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are documenting a source tree for engineers who are new to it.

Directory: {{directory}}

Summaries of subdirectories:
{{child_summaries}}

File contents:
{{file_contents}}

Write a concise markdown summary of this directory: its purpose, the role of
each notable file, and how it relates to its subdirectories. Lead with a
single-sentence overview. Do not invent files that are not listed.
";

const DEFAULT_MAX_FILE_BYTES: usize = 65_536;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
struct RawConfig {
    root: Option<PathBuf>,
    max_file_bytes: Option<usize>,
    max_attempts: Option<u32>,
    prompt_template: Option<String>,
    #[serde(default)]
    tiers: Vec<RawTier>,
}

#[derive(Debug, Deserialize)]
struct RawTier {
    name: String,
    provider: ProviderKind,
    model: String,
    /// Name of the environment variable holding this tier's API key.
    api_key_env: String,
    base_url: Option<String>,
    max_output_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

/// Everything the CLI needs to drive a run.
#[derive(Debug)]
pub struct LoadedConfig {
    pub run: RunConfig,
    pub tiers: Vec<TierConfig>,
    pub retry: RetryPolicy,
}

/// Load the YAML config at `path`, resolve tier credentials from the
/// environment and fold in the CLI overrides.
pub fn load_config(
    path: &Path,
    root_override: Option<PathBuf>,
    force: bool,
) -> Result<LoadedConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => {
            info!(config_path = ?path, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&content) {
        Ok(conf) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if raw.tiers.is_empty() {
        anyhow::bail!("Config must declare at least one provider tier");
    }

    let root = root_override
        .or(raw.root)
        .context("No root directory: pass --root or set `root` in the config file")?;
    let root = root
        .canonicalize()
        .with_context(|| format!("Root directory {:?} does not exist", root))?;

    let mut tiers = Vec::with_capacity(raw.tiers.len());
    for tier in raw.tiers {
        let api_key = env::var(&tier.api_key_env).with_context(|| {
            format!(
                "Environment variable {} (API key for tier '{}') is not set",
                tier.api_key_env, tier.name
            )
        })?;
        tiers.push(TierConfig {
            name: tier.name,
            kind: tier.provider,
            model: tier.model,
            api_key,
            base_url: tier.base_url,
            max_output_tokens: tier.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            timeout_secs: tier.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        });
    }

    let retry = RetryPolicy {
        max_attempts: raw
            .max_attempts
            .unwrap_or_else(|| RetryPolicy::default().max_attempts),
        ..RetryPolicy::default()
    };

    info!(tiers = tiers.len(), root = ?root, "Configuration loaded");
    Ok(LoadedConfig {
        run: RunConfig {
            root,
            force,
            max_file_bytes: raw.max_file_bytes.unwrap_or(DEFAULT_MAX_FILE_BYTES),
            prompt_template: raw
                .prompt_template
                .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
        },
        tiers,
        retry,
    })
}
