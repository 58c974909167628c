use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Which backend protocol a tier speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Openai,
}

/// Connection settings for one provider tier. Vector position in the tier
/// list is failover priority.
#[derive(Clone)]
pub struct TierConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    /// Resolved credential. Populated from the environment by the caller;
    /// never read from config files in this crate.
    pub api_key: String,
    /// Service base URL; `None` selects the backend's public endpoint.
    pub base_url: Option<String>,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl TierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Manual Debug keeps the credential out of logs and panic messages.
impl fmt::Debug for TierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Settings for one documentation run over a source tree.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Absolute root of the tree to document. Callers canonicalize and
    /// validate existence before constructing this.
    pub root: PathBuf,
    /// Regenerate everything regardless of timestamps.
    pub force: bool,
    /// Per-file content cap fed into prompts; longer files are truncated.
    pub max_file_bytes: usize,
    /// Prompt template with `{{directory}}`, `{{child_summaries}}` and
    /// `{{file_contents}}` placeholders.
    pub prompt_template: String,
}

impl RunConfig {
    pub fn trace_loaded(&self) {
        info!(
            root = %self.root.display(),
            force = self.force,
            max_file_bytes = self.max_file_bytes,
            "Loaded RunConfig"
        );
        debug!(
            template_len = self.prompt_template.len(),
            "Prompt template ready"
        );
    }
}
