use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for the order pipeline
// ============================================================================
//
// Covers:
// - Queue consumer outcomes and durable write latency
// - Cache lookups (hit / miss / not found) and cache size
// - Gateway publish outcomes
// - Bootstrap connection attempts
//
// Scraped through GET /metrics on the HTTP surface.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Queue Consumer
    pub orders_consumed: IntCounterVec,
    pub consumer_read_errors: IntCounter,
    pub order_persist_duration: Histogram,

    // Order Cache
    pub cache_lookups: IntCounterVec,
    pub cache_size: IntGauge,

    // Ingestion Gateway
    pub orders_published: IntCounterVec,

    // Connection Bootstrapper
    pub channel_bootstrap_attempts: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_consumed = IntCounterVec::new(
            Opts::new("orders_consumed_total", "Messages handled by the queue consumer"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_consumed.clone()))?;

        let consumer_read_errors = IntCounter::new(
            "consumer_read_errors_total",
            "Errors reading from the message channel",
        )?;
        registry.register(Box::new(consumer_read_errors.clone()))?;

        let order_persist_duration = Histogram::with_opts(
            HistogramOpts::new("order_persist_duration_seconds", "Durable order write duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(order_persist_duration.clone()))?;

        let cache_lookups = IntCounterVec::new(
            Opts::new("order_cache_lookups_total", "Order lookups by result"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let cache_size = IntGauge::new("order_cache_size", "Orders held in the cache")?;
        registry.register(Box::new(cache_size.clone()))?;

        let orders_published = IntCounterVec::new(
            Opts::new("orders_published_total", "Orders published by the gateway"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_published.clone()))?;

        let channel_bootstrap_attempts = IntCounter::new(
            "channel_bootstrap_attempts_total",
            "Connection attempts made while bootstrapping the message channel",
        )?;
        registry.register(Box::new(channel_bootstrap_attempts.clone()))?;

        Ok(Self {
            registry,
            orders_consumed,
            consumer_read_errors,
            order_persist_duration,
            cache_lookups,
            cache_size,
            orders_published,
            channel_bootstrap_attempts,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_consumed(&self, outcome: &str) {
        self.orders_consumed.with_label_values(&[outcome]).inc();
    }

    pub fn record_lookup(&self, result: &str) {
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    pub fn record_published(&self, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.orders_published.with_label_values(&[outcome]).inc();
    }

    pub fn set_cache_size(&self, size: usize) {
        self.cache_size.set(size as i64);
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
