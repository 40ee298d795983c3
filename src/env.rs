//! Environment variable names used by this crate for convenient
//! configuration from microservices.
//!
//! These are purely helpers; the pipeline itself never reads the
//! environment.

use crate::init::LayerConfig;
use serde_json::Value;

/// Sink DSN, e.g. `tcp://logstash:5000` (see [`crate::backend::parse_dsn`]).
pub const LOGSTASH_SINK_DSN_ENV: &str = "LOGSTASH_SINK_DSN";

/// Dispatch queue capacity override.
pub const LOGSTASH_QUEUE_CAPACITY_ENV: &str = "LOGSTASH_QUEUE_CAPACITY";

/// Optional logical service name, added to every record as `service`.
pub const LOGSTASH_SERVICE_NAME_ENV: &str = "LOGSTASH_SERVICE_NAME";

/// Set to `0`/`false` to disable the stdout `fmt` layer.
pub const LOGSTASH_STDOUT_ENV: &str = "LOGSTASH_STDOUT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl LayerConfig {
    /// Defaults overridden by whichever `LOGSTASH_*` variables are set.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = LayerConfig::default();

        if let Some(capacity) = lookup(LOGSTASH_QUEUE_CAPACITY_ENV).and_then(|v| v.trim().parse().ok()) {
            config.pipeline.queue_capacity = capacity;
        }
        if let Some(service) = lookup(LOGSTASH_SERVICE_NAME_ENV).filter(|v| !v.is_empty()) {
            config.static_fields.insert("service".to_string(), Value::String(service));
        }
        if let Some(stdout) = lookup(LOGSTASH_STDOUT_ENV) {
            config.enable_stdout = !matches!(stdout.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
        }

        config
    }
}
