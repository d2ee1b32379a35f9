/// Configuration management for Inbound Event Service
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use resilience::presets::{INBOUND_EVENT_BACKOFF, INBOUND_EVENT_MAX_ATTEMPTS};
use resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub kafka: KafkaConfig,
    pub database: DatabaseConfig,
    pub thirdparty: ThirdpartyConfig,
    pub retry: RetrySettings,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP port for health checks and metrics
    pub http_port: u16,
}

/// Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
    pub inbound_topic: String,
    pub outbound_topic: String,
    /// Header carrying the event id on inbound records
    pub event_id_header: String,
    pub max_poll_interval: Duration,
    /// Upper bound on waiting for a publish acknowledgement
    pub delivery_timeout: Duration,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Downstream dependency configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThirdpartyConfig {
    /// Base URL; requests go to `{endpoint}/{key}`
    pub endpoint: String,
    pub timeout: Duration,
}

/// Retry policy applied around each delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::fixed(self.max_attempts, self.backoff)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{} environment variable not set", name))
        };
        let or_default =
            |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let app = AppConfig {
            http_port: parse_or(&lookup, "HTTP_PORT", 8080),
        };

        let kafka = KafkaConfig {
            brokers: required("KAFKA_BROKERS")?,
            group_id: or_default("KAFKA_GROUP_ID", "demo-kafka"),
            inbound_topic: or_default("KAFKA_INBOUND_TOPIC", "demo-inbound-topic"),
            outbound_topic: or_default("KAFKA_OUTBOUND_TOPIC", "demo-outbound-topic"),
            event_id_header: or_default("KAFKA_EVENT_ID_HEADER", "demo_eventIdHeader"),
            max_poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "KAFKA_MAX_POLL_INTERVAL_MS",
                300_000,
            )),
            delivery_timeout: Duration::from_millis(parse_or(
                &lookup,
                "KAFKA_DELIVERY_TIMEOUT_MS",
                30_000,
            )),
        };

        let database = DatabaseConfig {
            url: required("DATABASE_URL")?,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10),
        };

        let thirdparty = ThirdpartyConfig {
            endpoint: required("THIRDPARTY_ENDPOINT")?,
            timeout: Duration::from_millis(parse_or(&lookup, "THIRDPARTY_TIMEOUT_MS", 30_000)),
        };

        let retry = RetrySettings {
            max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", INBOUND_EVENT_MAX_ATTEMPTS),
            backoff: lookup("RETRY_BACKOFF_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(INBOUND_EVENT_BACKOFF),
        };

        Ok(Self {
            app,
            kafka,
            database,
            thirdparty,
            retry,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
