use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::OrderError;

// ============================================================================
// Order Aggregate
// ============================================================================
//
// An Order owns exactly one Delivery, exactly one Payment and an ordered
// sequence of Items. The aggregate is always persisted and cached as a unit.
//
// Field names are the wire format shared by the HTTP front door and the
// message channel, so they must not be renamed.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Monetary fields are integer minor units.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix timestamp, seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Order {
    /// Parse a submitted payload. Malformed JSON and blank identifiers are
    /// both reported as validation failures.
    pub fn from_json(payload: &[u8]) -> Result<Self, OrderError> {
        let order: Order = serde_json::from_slice(payload)
            .map_err(|e| OrderError::Validation(format!("invalid json: {}", e)))?;
        order.validate()?;
        Ok(order.with_store_precision())
    }

    /// Decode a message read from the channel. Unlike [`Order::from_json`],
    /// a malformed payload is a deserialization failure rather than a
    /// rejected submission.
    pub fn from_message(payload: &[u8]) -> Result<Self, OrderError> {
        let order: Order = serde_json::from_slice(payload).map_err(OrderError::Deserialization)?;
        if order.validate().is_err() {
            return Err(OrderError::Deserialization(serde::de::Error::custom(
                "order_uid must not be empty",
            )));
        }
        Ok(order.with_store_precision())
    }

    /// Truncate `date_created` to microseconds, the resolution of the
    /// durable store, so a cached order equals the committed row.
    pub fn with_store_precision(mut self) -> Self {
        self.date_created = self.date_created.trunc_subsecs(6);
        self
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.order_uid.trim().is_empty() {
            return Err(OrderError::Validation("order_uid must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, OrderError> {
        serde_json::to_vec(self).map_err(OrderError::Serialization)
    }
}
