use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{Consumer, StreamConsumer},
    message::Message,
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};
use std::time::Duration;

use super::{MessageSource, OrderPublisher};
use crate::errors::ChannelError;

#[derive(Clone, Debug)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    /// Bound on the metadata probe made when a publisher connects
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
}

impl KafkaSettings {
    pub fn new(brokers: &str, topic: &str, group_id: &str) -> Self {
        Self {
            brokers: brokers.to_string(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            connect_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// Publisher
// ============================================================================

pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl KafkaPublisher {
    /// Create a producer and prove the brokers are reachable.
    ///
    /// librdkafka connects lazily, so a topic metadata fetch is used as the
    /// connection check. One call is one bootstrap attempt.
    pub async fn connect(settings: &KafkaSettings) -> Result<Self, ChannelError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("message.timeout.ms", settings.send_timeout.as_millis().to_string())
            .create()
            .map_err(|e| ChannelError::Connect(Box::new(e)))?;

        let probe = producer.clone();
        let topic = settings.topic.clone();
        let timeout = settings.connect_timeout;

        // fetch_metadata blocks the calling thread
        tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(Some(topic.as_str()), timeout)
                .map(|_| ())
        })
        .await
        .map_err(|e| ChannelError::Connect(Box::new(e)))?
        .map_err(|e| ChannelError::Connect(Box::new(e)))?;

        tracing::info!(
            brokers = %settings.brokers,
            topic = %settings.topic,
            "Kafka producer connected"
        );

        Ok(Self {
            producer,
            topic: settings.topic.clone(),
            send_timeout: settings.send_timeout,
        })
    }
}

#[async_trait]
impl OrderPublisher for KafkaPublisher {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), ChannelError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(self.send_timeout))
            .await
        {
            Ok(delivery) => {
                tracing::debug!(
                    topic = %self.topic,
                    key = %key,
                    delivery = ?delivery,
                    "Published to Kafka"
                );
                Ok(())
            }
            Err((e, _)) => {
                tracing::error!(
                    error = %e,
                    topic = %self.topic,
                    key = %key,
                    "Failed to publish to Kafka"
                );
                Err(ChannelError::Publish(Box::new(e)))
            }
        }
    }
}

// ============================================================================
// Subscriber
// ============================================================================

pub struct KafkaSubscriber {
    consumer: StreamConsumer,
}

impl KafkaSubscriber {
    /// Join the consumer group and subscribe to the order topic.
    ///
    /// Offsets are auto-committed: a message is treated as consumed once it
    /// has been read, whether or not it is persisted afterwards.
    pub fn subscribe(settings: &KafkaSettings) -> Result<Self, ChannelError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| ChannelError::Connect(Box::new(e)))?;

        consumer
            .subscribe(&[settings.topic.as_str()])
            .map_err(|e| ChannelError::Connect(Box::new(e)))?;

        tracing::info!(
            topic = %settings.topic,
            group_id = %settings.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self { consumer })
    }
}

#[async_trait]
impl MessageSource for KafkaSubscriber {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| ChannelError::Receive(Box::new(e)))?;

        tracing::debug!(
            topic = %message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            "Received message"
        );

        // An absent payload is passed on as empty and fails to decode.
        Ok(Some(message.payload().map(<[u8]>::to_vec).unwrap_or_default()))
    }
}
