use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::Order;

// ============================================================================
// Order Cache
// ============================================================================
//
// Process-scoped map from order_uid to a fully committed Order. Readers share
// the lock, every mutation takes it exclusively for a single insert. Entries
// are never evicted: the map lives as long as the process and is discarded on
// exit.
//
// Callers only insert orders that are already durably committed.
//
// ============================================================================

#[derive(Default)]
pub struct OrderCache {
    entries: RwLock<HashMap<String, Arc<Order>>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.entries.read().await.get(order_uid).cloned()
    }

    /// Last writer wins, no version check.
    pub async fn put(&self, order: Arc<Order>) {
        let mut entries = self.entries.write().await;
        entries.insert(order.order_uid.clone(), order);
    }

    /// Install a batch under one write lock. Used by cache restoration.
    pub async fn extend<I>(&self, orders: I) -> usize
    where
        I: IntoIterator<Item = Order>,
    {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        for order in orders {
            entries.insert(order.order_uid.clone(), Arc::new(order));
        }
        entries.len() - before
    }

    #[cfg(test)]
    pub async fn contains(&self, order_uid: &str) -> bool {
        self.entries.read().await.contains_key(order_uid)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[cfg(test)]
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}
