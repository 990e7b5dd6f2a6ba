//! # Consensus Metrics
//!
//! Prometheus metrics for monitoring a replica.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! alter-consensus = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `alter_epochs_started_total` - Counter of started epochs
//! - `alter_epochs_finished_total` - Counter of epochs closed by a decision
//! - `alter_decisions_total` - Counter of decisions
//! - `alter_blocks_delivered_total` - Counter of blocks delivered to the application
//! - `alter_timeouts_dropped_total` - Counter of timeouts lost to a full queue
//! - `alter_messages_received_total` - Counter of delivered messages (by type)
//! - `alter_current_epoch` - Gauge of the last started epoch
//! - `alter_delta_latency_seconds` - Histogram of probe round trips

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref EPOCHS_STARTED: IntCounter = register_int_counter!(
        "alter_epochs_started_total",
        "Total number of epochs started"
    )
    .expect("Failed to create EPOCHS_STARTED metric");

    pub static ref EPOCHS_FINISHED: IntCounter = register_int_counter!(
        "alter_epochs_finished_total",
        "Total number of epochs closed by a decision"
    )
    .expect("Failed to create EPOCHS_FINISHED metric");

    pub static ref DECISIONS: IntCounter = register_int_counter!(
        "alter_decisions_total",
        "Total number of decisions"
    )
    .expect("Failed to create DECISIONS metric");

    pub static ref BLOCKS_DELIVERED: IntCounter = register_int_counter!(
        "alter_blocks_delivered_total",
        "Total number of blocks delivered to the application"
    )
    .expect("Failed to create BLOCKS_DELIVERED metric");

    pub static ref TIMEOUTS_DROPPED: IntCounter = register_int_counter!(
        "alter_timeouts_dropped_total",
        "Total number of timeouts dropped because a queue was full"
    )
    .expect("Failed to create TIMEOUTS_DROPPED metric");

    /// Delivered messages, labeled by message type
    pub static ref MESSAGES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        "alter_messages_received_total",
        "Total number of consensus messages delivered to the replica",
        &["type"]
    )
    .expect("Failed to create MESSAGES_RECEIVED metric");

    pub static ref CURRENT_EPOCH: IntGauge = register_int_gauge!(
        "alter_current_epoch",
        "Last epoch started by the replica"
    )
    .expect("Failed to create CURRENT_EPOCH metric");

    pub static ref DELTA_LATENCY: Histogram = register_histogram!(
        "alter_delta_latency_seconds",
        "Round trip of delta probe messages in seconds",
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to create DELTA_LATENCY metric");
}

/// Record an epoch start and move the current epoch gauge
#[cfg(feature = "metrics")]
pub fn record_epoch_started(epoch: u64) {
    EPOCHS_STARTED.inc();
    CURRENT_EPOCH.set(epoch as i64);
}

#[cfg(feature = "metrics")]
pub fn record_epoch_finished() {
    EPOCHS_FINISHED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_decision() {
    DECISIONS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_blocks_delivered(count: usize) {
    BLOCKS_DELIVERED.inc_by(count as u64);
}

#[cfg(feature = "metrics")]
pub fn record_timeout_dropped() {
    TIMEOUTS_DROPPED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_message_received(kind: &str) {
    MESSAGES_RECEIVED.with_label_values(&[kind]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_delta_latency(latency: Duration) {
    DELTA_LATENCY.observe(latency.as_secs_f64());
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_epoch_started(_epoch: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_epoch_finished() {}

#[cfg(not(feature = "metrics"))]
pub fn record_decision() {}

#[cfg(not(feature = "metrics"))]
pub fn record_blocks_delivered(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_timeout_dropped() {}

#[cfg(not(feature = "metrics"))]
pub fn record_message_received(_kind: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_delta_latency(_latency: Duration) {}
