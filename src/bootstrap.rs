use std::future::Future;
use std::time::Duration;

use crate::errors::{ChannelError, OrderError};
use crate::metrics::Metrics;
use crate::utils::{retry_with_backoff, RetryConfig};

// ============================================================================
// Connection Bootstrapper
// ============================================================================
//
// Runs once, before anything else starts, and blocks startup until a
// publisher connection to the message channel exists. Exhausting the attempt
// budget is fatal: the service never runs without a publisher.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Call `connect` until it yields a publisher or `max_attempts` is reached.
pub async fn connect_with_retry<P, C, Fut>(
    config: &BootstrapConfig,
    metrics: &Metrics,
    mut connect: C,
) -> Result<P, OrderError>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<P, ChannelError>>,
{
    let retry = RetryConfig::fixed(config.max_attempts, config.retry_delay);

    let result = retry_with_backoff(&retry, |attempt| {
        tracing::info!(
            attempt = attempt,
            max_attempts = config.max_attempts,
            "Connecting to message channel ({}/{})",
            attempt,
            config.max_attempts
        );
        metrics.channel_bootstrap_attempts.inc();
        connect()
    })
    .await;

    match result {
        Ok(publisher) => {
            tracing::info!("✅ Message channel connection established");
            Ok(publisher)
        }
        Err(exhausted) => {
            tracing::error!(
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "❌ Message channel unavailable, aborting startup"
            );
            Err(OrderError::ChannelUnavailable {
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn fast_config() -> BootstrapConfig {
        BootstrapConfig {
            max_attempts: 30,
            retry_delay: Duration::from_millis(2),
        }
    }

    /// Connector that fails `failures` times before succeeding.
    fn flaky_connector(
        failures: u32,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut() -> std::future::Ready<Result<&'static str, ChannelError>> {
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= failures {
                std::future::ready(Err(ChannelError::Connect("connection refused".into())))
            } else {
                std::future::ready(Ok("publisher"))
            }
        }
    }

    #[test]
    fn test_default_contract() {
        let config = BootstrapConfig::default();
        assert_eq!(config.max_attempts, 30);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let metrics = Metrics::new().unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let publisher = connect_with_retry(&fast_config(), &metrics, flaky_connector(0, calls.clone()))
            .await
            .unwrap();

        assert_eq!(publisher, "publisher");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.channel_bootstrap_attempts.get(), 1);
    }

    #[tokio::test]
    async fn test_success_after_ten_failures() {
        let metrics = Metrics::new().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let config = fast_config();

        let started = Instant::now();
        let result = connect_with_retry(&config, &metrics, flaky_connector(10, calls.clone())).await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert!(started.elapsed() >= config.retry_delay * 10);
    }

    #[tokio::test]
    async fn test_success_on_last_allowed_attempt() {
        let metrics = Metrics::new().unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let result = connect_with_retry(&fast_config(), &metrics, flaky_connector(29, calls.clone())).await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn test_thirty_failures_is_channel_unavailable() {
        let metrics = Metrics::new().unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let result = connect_with_retry(&fast_config(), &metrics, flaky_connector(u32::MAX, calls.clone())).await;

        match result {
            Err(OrderError::ChannelUnavailable { attempts, .. }) => assert_eq!(attempts, 30),
            other => panic!("expected ChannelUnavailable, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 30);
        assert_eq!(metrics.channel_bootstrap_attempts.get(), 30);
    }
}
