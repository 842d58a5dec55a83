//! Environment-driven configuration for the FIX execution engine.
//!
//! All fields are overridable via environment variables; see SPEC_FULL.md §6
//! for the full table of names and defaults.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_env: String,
    pub http_port: u16,
    pub log_level: String,

    pub kafka: KafkaConfig,
    pub database_url: String,

    pub security_svc: ServiceEndpoint,
    pub pricing_svc: ServiceEndpoint,
    pub ticker_cache_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub orders_topic: String,
    pub fills_topic: String,
    pub consumer_group: String,
}

#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServiceEndpoint {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    /// Load configuration from the process environment, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            app_env: env_string("APP_ENV", "development"),
            http_port: env_parse("HTTP_PORT", 8085),
            log_level: env_string("LOG_LEVEL", "info"),
            kafka: KafkaConfig {
                brokers: env_string("KAFKA_BROKERS", "localhost:9092"),
                orders_topic: env_string("KAFKA_ORDERS_TOPIC", "orders"),
                fills_topic: env_string("KAFKA_FILLS_TOPIC", "fills"),
                consumer_group: env_string("KAFKA_CONSUMER_GROUP", "fix_engine"),
            },
            database_url: env_string(
                "DATABASE_URL",
                "postgres://postgres@localhost:5432/postgres",
            ),
            security_svc: ServiceEndpoint {
                host: env_string("SECURITY_SVC_HOST", "localhost"),
                port: env_parse("SECURITY_SVC_PORT", 8000),
            },
            pricing_svc: ServiceEndpoint {
                host: env_string("PRICING_SVC_HOST", "localhost"),
                port: env_parse("PRICING_SVC_PORT", 8083),
            },
            ticker_cache_ttl: Duration::from_secs(env_parse("TICKER_CACHE_TTL_SECS", 60)),
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        // SAFETY: test runs single-threaded within this process; no other
        // test mutates these specific keys.
        for key in [
            "APP_ENV",
            "HTTP_PORT",
            "LOG_LEVEL",
            "KAFKA_BROKERS",
            "KAFKA_ORDERS_TOPIC",
            "KAFKA_FILLS_TOPIC",
            "KAFKA_CONSUMER_GROUP",
            "DATABASE_URL",
            "SECURITY_SVC_HOST",
            "SECURITY_SVC_PORT",
            "PRICING_SVC_HOST",
            "PRICING_SVC_PORT",
            "TICKER_CACHE_TTL_SECS",
        ] {
            unsafe { env::remove_var(key) };
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.app_env, "development");
        assert_eq!(cfg.http_port, 8085);
        assert_eq!(cfg.kafka.orders_topic, "orders");
        assert_eq!(cfg.kafka.fills_topic, "fills");
        assert_eq!(cfg.ticker_cache_ttl, Duration::from_secs(60));
        assert!(!cfg.is_production());
    }
}
