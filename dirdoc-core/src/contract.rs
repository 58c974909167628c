//! # provider contract: interface to the external text-generation service
//!
//! This module defines a single trait ([`TextProvider`]) implemented by every
//! concrete backend (see [`crate::providers`]) and the [`ProviderError`]
//! taxonomy shared with the failover layer above it.
//!
//! ## Interface & Extensibility
//! - Implement the [`TextProvider`] trait to add a new backend.
//! - All methods are async and return [`ProviderError`] on failure.
//! - Implementations perform exactly one service call per method invocation.
//!   Retries, per-call deadlines and tier selection belong to
//!   [`crate::failover::FailoverClient`]; an implementation retrying on its
//!   own would multiply the outer retry policy.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests. Enable the
//!   `test-export-mocks` feature (on by default) to export them.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use thiserror::Error;

/// Errors surfaced by providers and by the failover layer wrapping them.
///
/// Classification via [`ProviderError::is_retryable`] colors logging and
/// backoff decisions only. Tier advance happens on every error, retryable
/// or not.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure reaching the service.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service rejected the call for quota reasons (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// A call exceeded its per-tier deadline. Produced by the failover
    /// layer, never by providers themselves.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The service reported a server-side fault (HTTP 5xx).
    #[error("service error (status {status}): {message}")]
    Service { status: u16, message: String },

    /// The service answered, but the reply did not carry the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Credentials were rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The request itself is invalid and will not succeed on resend (4xx).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Local misconfiguration detected before any call was made.
    #[error("provider configuration error: {0}")]
    Config(String),

    /// One or more tiers failed to shut down.
    #[error("close failed: {0}")]
    Close(String),
}

impl ProviderError {
    /// Whether a later pass could plausibly succeed.
    ///
    /// A malformed response counts as retryable: a different tier may answer
    /// with the expected shape.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_)
                | ProviderError::RateLimit(_)
                | ProviderError::Timeout(_)
                | ProviderError::Service { .. }
                | ProviderError::MalformedResponse(_)
        )
    }

    /// Map an HTTP error status onto the matching variant.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => ProviderError::RateLimit(message),
            401 | 403 => ProviderError::Auth(message),
            400..=499 => ProviderError::InvalidRequest(message),
            _ => ProviderError::Service { status, message },
        }
    }
}

/// Interface to a text-generation backend.
///
/// The trait is `Send + Sync` and intended for async/await usage behind
/// `Box<dyn TextProvider>` inside a failover tier.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Estimate the token count of `text`. Advisory; consumed by logging.
    async fn count_tokens(&self, text: &str) -> Result<u32, ProviderError>;

    /// Release any resources held by the provider.
    async fn close(&self) -> Result<(), ProviderError>;
}
