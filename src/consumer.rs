use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::messaging::MessageSource;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::service::OrderService;

// ============================================================================
// Queue Consumer
// ============================================================================
//
// Single background task: read → decode → persist → cache, one message at a
// time in delivery order.
//
// A message is consumed once it is read. Decode and persistence failures are
// logged and the message is dropped: there is no retry and no dead-letter
// path, and one bad message never stops the loop.
//
// A read error pauses the loop for `read_error_backoff` so a dead broker
// does not spin on recv().
//
// Shutdown is checked between messages only, so an in-flight message always
// finishes its persist-or-drop decision.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Persisted(String),
    DeserializationFailed,
    PersistenceFailed(String),
}

impl ConsumeOutcome {
    fn label(&self) -> &'static str {
        match self {
            ConsumeOutcome::Persisted(_) => "persisted",
            ConsumeOutcome::DeserializationFailed => "deserialization_error",
            ConsumeOutcome::PersistenceFailed(_) => "persistence_error",
        }
    }
}

const DEFAULT_READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct OrderConsumer<S> {
    source: S,
    service: Arc<OrderService>,
    metrics: Arc<Metrics>,
    read_error_backoff: Duration,
}

impl<S: MessageSource> OrderConsumer<S> {
    pub fn new(source: S, service: Arc<OrderService>, metrics: Arc<Metrics>) -> Self {
        Self {
            source,
            service,
            metrics,
            read_error_backoff: DEFAULT_READ_ERROR_BACKOFF,
        }
    }

    pub fn with_read_error_backoff(mut self, backoff: Duration) -> Self {
        self.read_error_backoff = backoff;
        self
    }

    /// Run until the shutdown signal fires (or its sender is dropped), or
    /// the source reports that the channel is closed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("🔄 Queue consumer started");

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = self.source.next_message() => next,
            };

            match next {
                Ok(Some(payload)) => {
                    self.handle_message(&payload).await;
                }
                Ok(None) => {
                    tracing::info!("Message channel closed");
                    break;
                }
                Err(e) => {
                    self.metrics.consumer_read_errors.inc();
                    tracing::warn!(
                        error = %e,
                        backoff_ms = self.read_error_backoff.as_millis() as u64,
                        "Failed to read message, backing off"
                    );

                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(self.read_error_backoff) => {}
                    }
                }
            }
        }

        tracing::info!("🛑 Queue consumer stopped");
    }

    pub async fn handle_message(&self, payload: &[u8]) -> ConsumeOutcome {
        let outcome = self.process(payload).await;
        self.metrics.record_consumed(outcome.label());
        outcome
    }

    async fn process(&self, payload: &[u8]) -> ConsumeOutcome {
        let order = match Order::from_message(payload) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload_len = payload.len(),
                    "Dropping message that is not a valid order"
                );
                return ConsumeOutcome::DeserializationFailed;
            }
        };

        let order_uid = order.order_uid.clone();

        match self.service.save(order).await {
            Ok(_) => {
                tracing::info!(order_uid = %order_uid, "✅ Order persisted from queue");
                ConsumeOutcome::Persisted(order_uid)
            }
            Err(e) => {
                // TODO: the message is lost here; decide between a
                // dead-letter topic and bounded retry for transient failures.
                tracing::error!(
                    order_uid = %order_uid,
                    error = %e,
                    "❌ Failed to persist order, dropping message"
                );
                ConsumeOutcome::PersistenceFailed(order_uid)
            }
        }
    }
}
