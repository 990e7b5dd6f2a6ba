//! Telemetry configuration from environment variables.

use std::env;

/// Logging setup for one replica process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Recorded on every event as `service`
    pub service_name: String,

    /// `EnvFilter` directive (`info`, `alter_consensus=debug`, ...)
    pub log_level: String,

    /// One JSON object per line instead of human-readable output
    pub json_logs: bool,

    /// Write events to stdout at all
    pub console_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "alter-bft".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            console_output: true,
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ALTER_SERVICE_NAME`: Service name (default: alter-bft)
    /// - `ALTER_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `ALTER_JSON_LOGS`: JSON output (default: false)
    /// - `ALTER_CONSOLE_OUTPUT`: Console output (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            service_name: lookup("ALTER_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("ALTER_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            json_logs: lookup("ALTER_JSON_LOGS")
                .map(|v| flag(&v))
                .unwrap_or(defaults.json_logs),
            console_output: lookup("ALTER_CONSOLE_OUTPUT")
                .map(|v| flag(&v))
                .unwrap_or(defaults.console_output),
        }
    }

    /// Configuration for replica `process`
    pub fn for_process(process: u16) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("{}-p{}", config.service_name, process);
        config
    }
}
