use std::time::Duration;

use async_trait::async_trait;
use dirdoc_core::contract::{MockTextProvider, ProviderError, TextProvider};
use dirdoc_core::failover::{FailoverClient, RetryPolicy, Tier};

fn tier(name: &str, provider: MockTextProvider) -> Tier {
    Tier::new(name.to_string(), Box::new(provider), Duration::from_secs(5))
}

fn quick_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff_ms: 1,
        backoff_multiplier: 2.0,
        max_backoff_ms: 2,
    }
}

/// A provider that never answers within a test-sized timeout.
struct SlowProvider;

#[async_trait]
impl TextProvider for SlowProvider {
    async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("too late".to_string())
    }

    async fn count_tokens(&self, _text: &str) -> Result<u32, ProviderError> {
        Ok(0)
    }

    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[test]
fn backoff_starts_at_zero_then_doubles_up_to_the_cap() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff_ms(0), 0, "the first pass should not wait");
    assert_eq!(policy.backoff_ms(1), 500);
    assert_eq!(policy.backoff_ms(2), 1000);
    assert_eq!(policy.backoff_ms(3), 2000);
    assert_eq!(policy.backoff_ms(10), 10_000, "delays should be capped");
}

#[test]
fn construction_rejects_empty_tier_lists_and_zero_attempts() {
    let err = FailoverClient::new(vec![], RetryPolicy::default())
        .expect_err("an empty tier list should be rejected");
    assert!(matches!(err, ProviderError::Config(_)), "expected Config, got {err:?}");

    let err = FailoverClient::new(
        vec![tier("solo", MockTextProvider::new())],
        quick_policy(0),
    )
    .expect_err("zero attempts should be rejected");
    assert!(matches!(err, ProviderError::Config(_)), "expected Config, got {err:?}");
}

#[test]
fn chain_label_names_one_tier_or_the_whole_fallback_chain() {
    let single = FailoverClient::new(
        vec![tier("primary", MockTextProvider::new())],
        RetryPolicy::default(),
    )
    .expect("client should construct");
    assert_eq!(single.chain_label(), "primary");

    let chained = FailoverClient::new(
        vec![
            tier("alpha", MockTextProvider::new()),
            tier("beta", MockTextProvider::new()),
            tier("gamma", MockTextProvider::new()),
        ],
        RetryPolicy::default(),
    )
    .expect("client should construct");
    assert_eq!(chained.chain_label(), "fallback(alpha->beta->gamma)");
}

#[tokio::test]
async fn healthy_first_tier_answers_on_the_first_pass() {
    let mut primary = MockTextProvider::new();
    primary
        .expect_generate()
        .times(1)
        .returning(|_prompt| Ok("first answer".to_string()));
    let mut secondary = MockTextProvider::new();
    secondary.expect_generate().times(0);

    let client = FailoverClient::new(
        vec![tier("primary", primary), tier("secondary", secondary)],
        quick_policy(3),
    )
    .expect("client should construct");

    let generated = client.generate("prompt").await.expect("generate should succeed");
    assert_eq!(generated.text, "first answer");
    assert_eq!(generated.provider, "primary", "the serving tier should be reported");
    assert_eq!(generated.attempts, 1, "a first-pass success should count one attempt");
}

#[tokio::test]
async fn failing_tier_falls_over_within_the_same_pass() {
    let mut primary = MockTextProvider::new();
    primary.expect_generate().times(1).returning(|_prompt| {
        Err(ProviderError::Service {
            status: 500,
            message: "backend down".to_string(),
        })
    });
    let mut secondary = MockTextProvider::new();
    secondary
        .expect_generate()
        .times(1)
        .returning(|_prompt| Ok("second answer".to_string()));

    let client = FailoverClient::new(
        vec![tier("primary", primary), tier("secondary", secondary)],
        quick_policy(3),
    )
    .expect("client should construct");

    let generated = client.generate("prompt").await.expect("generate should succeed");
    assert_eq!(generated.provider, "secondary");
    assert_eq!(
        generated.attempts, 1,
        "failing over within a pass should still count as the first attempt"
    );
}

#[tokio::test]
async fn exhaustion_returns_the_last_tier_error_after_all_passes() {
    let mut primary = MockTextProvider::new();
    primary
        .expect_generate()
        .times(2)
        .returning(|_prompt| Err(ProviderError::RateLimit("primary throttled".to_string())));
    let mut secondary = MockTextProvider::new();
    secondary
        .expect_generate()
        .times(2)
        .returning(|_prompt| Err(ProviderError::InvalidRequest("secondary rejected".to_string())));

    let client = FailoverClient::new(
        vec![tier("primary", primary), tier("secondary", secondary)],
        quick_policy(2),
    )
    .expect("client should construct");

    let err = client
        .generate("prompt")
        .await
        .expect_err("exhausting every pass should fail");
    match err {
        ProviderError::InvalidRequest(message) => {
            assert!(
                message.contains("secondary rejected"),
                "the last tier's error should be returned, got {message:?}"
            );
        }
        other => panic!("expected the last tier's InvalidRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn terminal_errors_still_advance_to_the_next_tier() {
    let mut primary = MockTextProvider::new();
    primary
        .expect_generate()
        .times(1)
        .returning(|_prompt| Err(ProviderError::Auth("key revoked".to_string())));
    let mut secondary = MockTextProvider::new();
    secondary
        .expect_generate()
        .times(1)
        .returning(|_prompt| Ok("rescued".to_string()));

    let client = FailoverClient::new(
        vec![tier("primary", primary), tier("secondary", secondary)],
        quick_policy(1),
    )
    .expect("client should construct");

    let generated = client.generate("prompt").await.expect("generate should succeed");
    assert_eq!(
        generated.provider, "secondary",
        "a terminal classification must not stop the walk down the chain"
    );
}

#[tokio::test]
async fn slow_tier_times_out_and_the_next_tier_serves() {
    let slow = Tier::new(
        "slow".to_string(),
        Box::new(SlowProvider),
        Duration::from_millis(20),
    );
    let mut fallback = MockTextProvider::new();
    fallback
        .expect_generate()
        .times(1)
        .returning(|_prompt| Ok("prompt answer".to_string()));

    let client = FailoverClient::new(
        vec![slow, tier("fallback", fallback)],
        quick_policy(1),
    )
    .expect("client should construct");

    let generated = client.generate("prompt").await.expect("generate should succeed");
    assert_eq!(generated.provider, "fallback");
}

#[tokio::test]
async fn lone_slow_tier_surfaces_a_retryable_timeout() {
    let slow = Tier::new(
        "slow".to_string(),
        Box::new(SlowProvider),
        Duration::from_millis(20),
    );
    let client = FailoverClient::new(vec![slow], quick_policy(1)).expect("client should construct");

    let err = client
        .generate("prompt")
        .await
        .expect_err("a tier that never answers should time out");
    assert!(matches!(err, ProviderError::Timeout(_)), "expected Timeout, got {err:?}");
    assert!(err.is_retryable(), "timeouts should be retryable");
}

#[tokio::test]
async fn count_tokens_walks_the_chain_once_without_outer_retries() {
    let mut primary = MockTextProvider::new();
    primary.expect_count_tokens().times(1).returning(|_text| {
        Err(ProviderError::Service {
            status: 503,
            message: "unavailable".to_string(),
        })
    });
    let mut secondary = MockTextProvider::new();
    secondary
        .expect_count_tokens()
        .times(1)
        .returning(|_text| Ok(7));

    let client = FailoverClient::new(
        vec![tier("primary", primary), tier("secondary", secondary)],
        quick_policy(3),
    )
    .expect("client should construct");

    let tokens = client
        .count_tokens("some text")
        .await
        .expect("count_tokens should succeed");
    assert_eq!(tokens, 7, "the first healthy tier should answer");
}

#[tokio::test]
async fn close_shuts_every_tier_and_reports_all_failures() {
    let mut alpha = MockTextProvider::new();
    alpha
        .expect_close()
        .times(1)
        .returning(|| Err(ProviderError::Config("alpha socket stuck".to_string())));
    let mut beta = MockTextProvider::new();
    beta.expect_close().times(1).returning(|| Ok(()));
    let mut gamma = MockTextProvider::new();
    gamma
        .expect_close()
        .times(1)
        .returning(|| Err(ProviderError::Config("gamma socket stuck".to_string())));

    let client = FailoverClient::new(
        vec![tier("alpha", alpha), tier("beta", beta), tier("gamma", gamma)],
        RetryPolicy::default(),
    )
    .expect("client should construct");

    let err = client.close().await.expect_err("close should report the failures");
    match err {
        ProviderError::Close(message) => {
            assert!(message.contains("2 of 3"), "got {message:?}");
            assert!(message.contains("alpha"), "got {message:?}");
            assert!(message.contains("gamma"), "got {message:?}");
            assert!(!message.contains("beta"), "healthy tiers should not be listed, got {message:?}");
        }
        other => panic!("expected Close, got {other:?}"),
    }
}

#[tokio::test]
async fn close_succeeds_when_every_tier_closes() {
    let mut solo = MockTextProvider::new();
    solo.expect_close().times(1).returning(|| Ok(()));

    let client = FailoverClient::new(vec![tier("solo", solo)], RetryPolicy::default())
        .expect("client should construct");

    client.close().await.expect("close should succeed when every tier closes");
}
