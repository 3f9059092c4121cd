use anyhow::{anyhow, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::bootstrap::BootstrapConfig;
use crate::messaging::KafkaSettings;

/// Service configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    pub database_max_connections: u32,
    pub kafka: KafkaSettings,
    pub http_host: String,
    pub http_port: u16,
    pub bootstrap: BootstrapConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        let brokers = lookup("KAFKA_BROKERS").unwrap_or_else(|| "kafka:9092".to_string());
        let topic = lookup("KAFKA_TOPIC").unwrap_or_else(|| "order-topic".to_string());
        let group_id = lookup("KAFKA_GROUP_ID").unwrap_or_else(|| "order-group".to_string());

        let defaults = BootstrapConfig::default();
        let bootstrap = BootstrapConfig {
            max_attempts: parse_or(&lookup, "BOOTSTRAP_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_delay: Duration::from_secs(parse_or(
                &lookup,
                "BOOTSTRAP_RETRY_DELAY_SECS",
                defaults.retry_delay.as_secs(),
            )?),
        };

        Ok(Self {
            database_url,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            kafka: KafkaSettings::new(&brokers, &topic, &group_id),
            http_host: lookup("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port: parse_or(&lookup, "HTTP_PORT", 8081)?,
            bootstrap,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {}: {:?} ({})", key, raw, e)),
        None => Ok(default),
    }
}
