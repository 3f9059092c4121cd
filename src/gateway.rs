use std::sync::Arc;

use crate::errors::OrderError;
use crate::messaging::OrderPublisher;
use crate::metrics::Metrics;
use crate::models::Order;

/// Synchronous front door for submissions: validate, serialize, publish.
///
/// Returns as soon as the message channel accepts the payload; it does not
/// wait for the queue consumer to persist it.
pub struct IngestionGateway {
    publisher: Arc<dyn OrderPublisher>,
    metrics: Arc<Metrics>,
}

impl IngestionGateway {
    pub fn new(publisher: Arc<dyn OrderPublisher>, metrics: Arc<Metrics>) -> Self {
        Self { publisher, metrics }
    }

    /// Publish a submitted order. Returns its order_uid.
    pub async fn submit(&self, body: &[u8]) -> Result<String, OrderError> {
        let order = Order::from_json(body)?;
        let payload = order.to_json()?;

        match self.publisher.publish(&order.order_uid, &payload).await {
            Ok(()) => {
                self.metrics.record_published(true);
                tracing::info!(
                    order_uid = %order.order_uid,
                    item_count = order.items.len(),
                    "📤 Order published to message channel"
                );
                Ok(order.order_uid)
            }
            Err(e) => {
                self.metrics.record_published(false);
                tracing::error!(
                    order_uid = %order.order_uid,
                    error = %e,
                    "Failed to publish order"
                );
                Err(e.into())
            }
        }
    }
}
