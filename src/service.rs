use std::sync::Arc;

use crate::cache::OrderCache;
use crate::errors::OrderError;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::store::OrderStore;

// ============================================================================
// Order Service
// ============================================================================
//
// Coordinates the durable store and the cache for both the queue consumer
// and the HTTP read path.
//
// - get_by_id:     cache first, store on miss, memoize what the store returns
// - save:          commit to the store, THEN install in the cache
// - restore_cache: bulk-load every committed order, run once at startup
//
// The cache is only ever written with data the store has committed, so a
// reader can never see an order that is not durable.
//
// ============================================================================

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<OrderCache>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            cache,
            metrics,
        }
    }

    pub fn cache(&self) -> &OrderCache {
        &self.cache
    }

    pub async fn get_by_id(&self, order_uid: &str) -> Result<Arc<Order>, OrderError> {
        if let Some(order) = self.cache.get(order_uid).await {
            self.metrics.record_lookup("hit");
            return Ok(order);
        }

        match self.store.find_order(order_uid).await? {
            Some(order) => {
                self.metrics.record_lookup("miss");
                let order = Arc::new(order);
                self.cache.put(order.clone()).await;
                self.metrics.set_cache_size(self.cache.len().await);

                tracing::debug!(order_uid = %order_uid, "Order loaded from store into cache");
                Ok(order)
            }
            None => {
                self.metrics.record_lookup("not_found");
                Err(OrderError::NotFound(order_uid.to_string()))
            }
        }
    }

    /// Persist an order transactionally, then cache it.
    ///
    /// On failure the cache is left untouched.
    pub async fn save(&self, order: Order) -> Result<Arc<Order>, OrderError> {
        let order = order.with_store_precision();
        let timer = self.metrics.order_persist_duration.start_timer();
        let result = self.store.insert_order(&order).await;
        timer.observe_duration();

        if let Err(e) = result {
            tracing::debug!(
                order_uid = %order.order_uid,
                stage = ?e.stage(),
                "Order write rolled back"
            );
            return Err(e.into());
        }

        let order = Arc::new(order);
        self.cache.put(order.clone()).await;
        self.metrics.set_cache_size(self.cache.len().await);

        Ok(order)
    }

    /// Rehydrate the cache from the durable store. Returns the number of
    /// orders loaded.
    pub async fn restore_cache(&self) -> Result<usize, OrderError> {
        tracing::info!("Restoring order cache from durable store");

        let orders = self.store.load_all().await?;
        let loaded = orders.len();
        self.cache.extend(orders).await;

        let cached = self.cache.len().await;
        self.metrics.set_cache_size(cached);

        tracing::info!(loaded = loaded, cached = cached, "✅ Order cache restored");
        Ok(loaded)
    }
}
