//! Application configuration loaded from environment variables.

use std::time::Duration;

const DEFAULT_KAFKA_GROUP_ID: &str = "booking-service-group";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Payment topic settings. Present only when brokers and topic are both set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: Postgres connection string; unset means in-memory storage
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `PAYMENT_SERVICE_URL`: payment initiation endpoint; unset means an in-memory gateway
/// - `STORE_TIMEOUT_MS`, `PAYMENT_TIMEOUT_MS`: call deadlines (default 5000 and 10000)
/// - `KAFKA_BROKERS`, `KAFKA_TOPIC`, `KAFKA_GROUP_ID`, `KAFKA_USER`, `KAFKA_PASSWORD`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub payment_service_url: Option<String>,
    pub store_timeout: Duration,
    pub payment_timeout: Duration,
    pub kafka: Option<KafkaSettings>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let kafka = match (get("KAFKA_BROKERS"), get("KAFKA_TOPIC")) {
            (Some(brokers), Some(topic)) => Some(KafkaSettings {
                brokers,
                topic,
                group_id: get("KAFKA_GROUP_ID")
                    .unwrap_or_else(|| DEFAULT_KAFKA_GROUP_ID.to_string()),
                username: get("KAFKA_USER"),
                password: get("KAFKA_PASSWORD"),
            }),
            _ => None,
        };

        Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: get("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
            database_url: get("DATABASE_URL"),
            database_max_connections: get("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            payment_service_url: get("PAYMENT_SERVICE_URL"),
            store_timeout: get("STORE_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            payment_timeout: get("PAYMENT_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_timeout),
            kafka,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            payment_service_url: None,
            store_timeout: booking::Timeouts::DEFAULT_STORE,
            payment_timeout: booking::Timeouts::DEFAULT_GATEWAY,
            kafka: None,
        }
    }
}
