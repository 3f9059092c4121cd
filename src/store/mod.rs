// ============================================================================
// Durable Store
// ============================================================================
//
// Capability interface over the relational system of record. The Order
// Service depends only on this trait, so tests can run against an in-memory
// implementation.
//
// Contract:
// - insert_order writes order, delivery, payment and every item in ONE
//   transaction. Any failure rolls the whole write back. An existing
//   order_uid is a conflict, never an upsert.
// - find_order returns the complete aggregate or None.
// - load_all returns every committed aggregate (used once at startup).
//
// ============================================================================

mod postgres;

pub use postgres::PgOrderStore;

use async_trait::async_trait;

use crate::errors::{PersistenceError, StoreError};
use crate::models::Order;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), PersistenceError>;

    async fn find_order(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;

    async fn load_all(&self) -> Result<Vec<Order>, StoreError>;
}
