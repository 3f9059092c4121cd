use std::fmt;

// ============================================================================
// Error Taxonomy
// ============================================================================
//
// - ChannelUnavailable: bootstrap exhausted its attempts (fatal at startup)
// - Validation:         malformed submission, rejected before publishing
// - NotFound:           id absent from both cache and durable store
// - Persistence:        durable transaction failed and was rolled back
// - Deserialization:    malformed message on the consumer path (dropped)
//
// ============================================================================

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("message channel unavailable after {attempts} attempts: {source}")]
    ChannelUnavailable {
        attempts: u32,
        #[source]
        source: ChannelError,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("order not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("failed to decode order payload: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("failed to encode order payload: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Statement inside the durable write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Begin,
    Order,
    Delivery,
    Payment,
    Item(usize),
    Commit,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStage::Begin => write!(f, "begin tx"),
            WriteStage::Order => write!(f, "insert order"),
            WriteStage::Delivery => write!(f, "insert delivery"),
            WriteStage::Payment => write!(f, "insert payment"),
            WriteStage::Item(index) => write!(f, "insert item #{}", index),
            WriteStage::Commit => write!(f, "commit"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The order_uid is already committed. No upsert semantics.
    #[error("order {order_uid} already exists")]
    Conflict { order_uid: String },

    #[error("{stage} failed for order {order_uid}: {source}")]
    Statement {
        order_uid: String,
        stage: WriteStage,
        #[source]
        source: BoxError,
    },
}

impl PersistenceError {
    pub fn stage(&self) -> Option<WriteStage> {
        match self {
            PersistenceError::Conflict { .. } => None,
            PersistenceError::Statement { stage, .. } => Some(*stage),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {source}")]
pub struct StoreError {
    pub operation: &'static str,
    #[source]
    pub source: BoxError,
}

impl StoreError {
    pub fn new(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to connect to message channel: {0}")]
    Connect(#[source] BoxError),

    #[error("failed to publish message: {0}")]
    Publish(#[source] BoxError),

    #[error("failed to read message: {0}")]
    Receive(#[source] BoxError),
}
