//! Multi-tier failover over text providers.
//!
//! Exactly one layer owns retries: tiers themselves never retry, and this
//! client walks every tier once per pass, sleeping a bounded exponential
//! backoff between passes. Per-call deadlines are also enforced here, so a
//! hung provider costs at most one tier timeout.

use std::fmt;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::contract::{ProviderError, TextProvider};

/// One provider in failover position. Order in the client's tier list is
/// priority order.
pub struct Tier {
    pub name: String,
    pub provider: Box<dyn TextProvider>,
    pub timeout: Duration,
}

impl Tier {
    pub fn new(name: String, provider: Box<dyn TextProvider>, timeout: Duration) -> Self {
        Self {
            name,
            provider,
            timeout,
        }
    }
}

impl fmt::Debug for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tier")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Deterministic bounded exponential backoff between failover passes.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of whole passes over the tier list.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after `failed_passes` whole passes have failed. Zero before
    /// anything has failed.
    pub fn backoff_ms(&self, failed_passes: u32) -> u64 {
        if failed_passes == 0 {
            return 0;
        }
        let delay = self.initial_backoff_ms as f64
            * self.backoff_multiplier.powi(failed_passes as i32 - 1);
        (delay as u64).min(self.max_backoff_ms)
    }

    pub fn backoff(&self, failed_passes: u32) -> Duration {
        Duration::from_millis(self.backoff_ms(failed_passes))
    }
}

/// Successful generation with provenance.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    /// Name of the tier that answered.
    pub provider: String,
    /// Outer pass on which the answer arrived (1-based).
    pub attempts: u32,
}

/// Ordered provider tiers with outer retry passes.
#[derive(Debug)]
pub struct FailoverClient {
    tiers: Vec<Tier>,
    policy: RetryPolicy,
}

impl FailoverClient {
    /// Build a client over `tiers` in priority order.
    pub fn new(tiers: Vec<Tier>, policy: RetryPolicy) -> Result<Self, ProviderError> {
        if tiers.is_empty() {
            return Err(ProviderError::Config(
                "no provider tiers configured".to_string(),
            ));
        }
        if policy.max_attempts == 0 {
            return Err(ProviderError::Config(
                "retry policy must allow at least one pass".to_string(),
            ));
        }
        Ok(Self { tiers, policy })
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Composite identifier for logs: a single tier's own name, or
    /// `fallback(a->b->c)` across tiers.
    pub fn chain_label(&self) -> String {
        if self.tiers.len() == 1 {
            return self.tiers[0].name.clone();
        }
        let names: Vec<&str> = self.tiers.iter().map(|tier| tier.name.as_str()).collect();
        format!("fallback({})", names.join("->"))
    }

    /// Try every tier in order, up to `max_attempts` passes, with backoff
    /// between passes.
    ///
    /// Classification colors the logs and nothing else here: every error
    /// advances to the next tier. When all passes are exhausted the error
    /// from the last tier tried is returned.
    pub async fn generate(&self, prompt: &str) -> Result<Generated, ProviderError> {
        let mut last_error = ProviderError::Config("no generation attempt was made".to_string());
        for pass in 1..=self.policy.max_attempts {
            for (tier_index, tier) in self.tiers.iter().enumerate() {
                let started = Instant::now();
                let outcome = match timeout(tier.timeout, tier.provider.generate(prompt)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(tier.timeout)),
                };
                match outcome {
                    Ok(text) => {
                        info!(
                            tier = %tier.name,
                            pass,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "[FAILOVER] Generation succeeded"
                        );
                        return Ok(Generated {
                            text,
                            provider: tier.name.clone(),
                            attempts: pass,
                        });
                    }
                    Err(error) => {
                        warn!(
                            tier = %tier.name,
                            tier_index,
                            pass,
                            retryable = error.is_retryable(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            error = %error,
                            "[FAILOVER] Tier failed, advancing"
                        );
                        last_error = error;
                    }
                }
            }
            if pass < self.policy.max_attempts {
                let delay = self.policy.backoff(pass);
                debug!(
                    failed_passes = pass,
                    delay_ms = delay.as_millis() as u64,
                    "[FAILOVER] Backing off before next pass"
                );
                tokio::time::sleep(delay).await;
            }
        }
        Err(last_error)
    }

    /// Advisory token estimate: a single pass, first tier that answers wins.
    /// No outer retries; a failed estimate only costs a log line upstream.
    pub async fn count_tokens(&self, text: &str) -> Result<u32, ProviderError> {
        let mut last_error = ProviderError::Config("no count attempt was made".to_string());
        for tier in &self.tiers {
            match timeout(tier.timeout, tier.provider.count_tokens(text)).await {
                Ok(Ok(count)) => return Ok(count),
                Ok(Err(error)) => {
                    debug!(tier = %tier.name, error = %error, "[FAILOVER] Token count failed");
                    last_error = error;
                }
                Err(_) => {
                    debug!(tier = %tier.name, "[FAILOVER] Token count timed out");
                    last_error = ProviderError::Timeout(tier.timeout);
                }
            }
        }
        Err(last_error)
    }

    /// Close every tier, reporting every failure rather than only the first.
    pub async fn close(&self) -> Result<(), ProviderError> {
        let closes = self.tiers.iter().map(|tier| async move {
            tier.provider
                .close()
                .await
                .map_err(|error| (tier.name.clone(), error))
        });
        let failures: Vec<(String, ProviderError)> = join_all(closes)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if failures.is_empty() {
            return Ok(());
        }
        let detail: Vec<String> = failures
            .iter()
            .map(|(name, error)| format!("{name}: {error}"))
            .collect();
        Err(ProviderError::Close(format!(
            "{} of {} tiers failed to close: {}",
            failures.len(),
            self.tiers.len(),
            detail.join("; ")
        )))
    }
}
