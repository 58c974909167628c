//! Concrete [`TextProvider`] backends: Google Gemini and OpenAI-compatible
//! chat endpoints.
//!
//! Both speak plain REST via `reqwest` and navigate replies as
//! `serde_json::Value`, so a schema drift in an optional field never breaks
//! deserialization of the part we need. Neither backend retries: retry
//! policy lives in [`crate::failover::FailoverClient`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{ProviderKind, TierConfig};
use crate::contract::{ProviderError, TextProvider};
use crate::failover::Tier;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Cap on error-body excerpts carried into error values.
const ERROR_EXCERPT_CHARS: usize = 300;

fn excerpt(body: &str) -> String {
    if body.chars().count() <= ERROR_EXCERPT_CHARS {
        body.to_string()
    } else {
        let head: String = body.chars().take(ERROR_EXCERPT_CHARS).collect();
        format!("{head}...")
    }
}

fn http_client(config: &TierConfig) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(concat!("dirdoc/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ProviderError::Network)
}

fn require_api_key(config: &TierConfig) -> Result<(), ProviderError> {
    if config.api_key.trim().is_empty() {
        return Err(ProviderError::Config(format!(
            "tier '{}' has an empty API key",
            config.name
        )));
    }
    Ok(())
}

/// Google Gemini over the `generateContent` REST surface.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_output_tokens: u32,
}

impl GeminiProvider {
    /// Fails fast on blank credentials, so a misconfigured tier surfaces at
    /// startup rather than on the first call.
    pub fn new(config: &TierConfig) -> Result<Self, ProviderError> {
        require_api_key(config)?;
        Ok(Self {
            client: http_client(config)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn endpoint(&self, verb: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            self.model,
            verb
        )
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                status.as_u16(),
                excerpt(&message),
            ));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "maxOutputTokens": self.max_output_tokens },
        });
        let reply = self.post(&self.endpoint("generateContent"), body).await?;
        let text = reply
            .get("candidates")
            .and_then(|candidates| candidates.get(0))
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.get(0))
            .and_then(|part| part.get("text"))
            .and_then(|text| text.as_str())
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "no candidates[0].content.parts[0].text in reply".to_string(),
                )
            })?;
        debug!(model = %self.model, chars = text.len(), "[GEN] Gemini reply received");
        Ok(text.to_string())
    }

    async fn count_tokens(&self, text: &str) -> Result<u32, ProviderError> {
        let body = json!({ "contents": [{ "parts": [{ "text": text }] }] });
        let reply = self.post(&self.endpoint("countTokens"), body).await?;
        reply
            .get("totalTokens")
            .and_then(|total| total.as_u64())
            .map(|total| total as u32)
            .ok_or_else(|| ProviderError::MalformedResponse("no totalTokens in reply".to_string()))
    }

    async fn close(&self) -> Result<(), ProviderError> {
        // reqwest clients release their connection pools on drop.
        Ok(())
    }
}

/// Any server speaking the OpenAI chat-completions dialect.
pub struct OpenAiCompatProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_output_tokens: u32,
}

impl OpenAiCompatProvider {
    pub fn new(config: &TierConfig) -> Result<Self, ProviderError> {
        require_api_key(config)?;
        Ok(Self {
            client: http_client(config)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TextProvider for OpenAiCompatProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.max_output_tokens,
        });
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                status.as_u16(),
                excerpt(&message),
            ));
        }
        let reply = response.json::<Value>().await?;
        let text = reply
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "no choices[0].message.content in reply".to_string(),
                )
            })?;
        debug!(model = %self.model, chars = text.len(), "[GEN] Chat completion received");
        Ok(text.to_string())
    }

    /// No token endpoint is universal across compatible servers; a
    /// character-ratio estimate keeps the advisory sizing log working.
    async fn count_tokens(&self, text: &str) -> Result<u32, ProviderError> {
        Ok(text.chars().count().div_ceil(4) as u32)
    }

    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Build one failover tier from configuration.
pub fn build_tier(config: &TierConfig) -> Result<Tier, ProviderError> {
    let provider: Box<dyn TextProvider> = match config.kind {
        ProviderKind::Gemini => Box::new(GeminiProvider::new(config)?),
        ProviderKind::Openai => Box::new(OpenAiCompatProvider::new(config)?),
    };
    Ok(Tier::new(config.name.clone(), provider, config.timeout()))
}

/// Build the whole tier list in priority order.
pub fn build_tiers(configs: &[TierConfig]) -> Result<Vec<Tier>, ProviderError> {
    configs.iter().map(build_tier).collect()
}
