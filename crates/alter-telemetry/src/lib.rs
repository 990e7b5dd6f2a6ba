//! # Alter Telemetry
//!
//! Structured logging for AlterBFT replicas.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use alter_telemetry::{init_tracing, TelemetryConfig};
//!
//! let _guard = init_tracing(&TelemetryConfig::for_process(0))?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ALTER_SERVICE_NAME` | `alter-bft` | Service name on every event |
//! | `ALTER_LOG_LEVEL` | `info` | Filter directive |
//! | `ALTER_JSON_LOGS` | `false` | JSON lines output |
//! | `ALTER_CONSOLE_OUTPUT` | `true` | Write to stdout |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{env_filter, init_tracing, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Log a consensus event with the process id attached.
#[macro_export]
macro_rules! log_event {
    ($level:ident, $process:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            process = $process,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log an epoch-scoped event with the standard `process` and `epoch` fields.
#[macro_export]
macro_rules! log_epoch_event {
    ($level:ident, $process:expr, $epoch:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            process = $process,
            epoch = $epoch,
            $($($field)*,)?
            $msg
        )
    };
}
