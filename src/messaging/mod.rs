// ============================================================================
// Message Channel
// ============================================================================
//
// Two capabilities over an ordered, at-least-once delivery log:
// - OrderPublisher: used by the ingestion gateway
// - MessageSource:  read side, owned by the queue consumer
//
// The Kafka implementation lives in `kafka`; tests use in-memory fakes.
//
// ============================================================================

mod kafka;

pub use kafka::{KafkaPublisher, KafkaSettings, KafkaSubscriber};

use async_trait::async_trait;

use crate::errors::ChannelError;

#[async_trait]
pub trait OrderPublisher: Send + Sync {
    /// Publish one payload to the order topic, keyed by order_uid.
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait MessageSource: Send {
    /// Block until the next message is available.
    ///
    /// A message counts as consumed once it is returned here. `Ok(None)`
    /// means the channel is closed and no further messages will arrive.
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, ChannelError>;
}
