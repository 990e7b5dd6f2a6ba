//! Consensus configuration and validation
//!
//! # Example
//!
//! ```
//! use alter_consensus::domain::{ConsensusConfig, ProtocolModel};
//! use std::time::Duration;
//!
//! let config = ConsensusConfig::builder()
//!     .small_delta(Duration::from_millis(50))
//!     .max_active_epochs(16)
//!     .model(ProtocolModel::Sync)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.timeout_quit_epoch(), Duration::from_millis(100));
//! ```

use super::{ConsensusError, ConsensusResult, ProcessId};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::BTreeSet;
use std::time::Duration;

/// Which epoch machine the replica runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolModel {
    /// AlterBFT epochs under synchrony assumptions
    Sync,
    /// Network latency probe
    Delta,
}

/// Behaviour of processes listed in `byzantines`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByzantineAttack {
    /// Split proposals between two halves of the processes
    Equivocation,
    /// Never propose
    Silent,
}

/// Replica configuration
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Epoch instances kept alive at once
    pub max_active_epochs: usize,
    /// Last epoch to start; 0 disables the cutoff
    pub max_epoch_to_start: u64,
    /// Height slots in the blockchain window
    pub blockchain_size: usize,
    /// Inbound message queue capacity
    pub message_queue_size: usize,
    /// Expired timeout queue capacity
    pub timeout_queue_size: usize,
    /// When false, timeout requests are dropped (tests drive timeouts by hand)
    pub schedule_timeouts: bool,
    /// Messages an epoch buffers before it is started
    pub pending_messages_limit: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub small_delta: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub big_delta: Duration,
    /// Decide as soon as every process voted while locked
    pub fast_path_enabled: bool,
    pub model: ProtocolModel,
    /// Processes running a Byzantine policy
    pub byzantines: BTreeSet<ProcessId>,
    pub byzantine_attack: ByzantineAttack,
    /// Verified `(signer, signature)` pairs remembered by the verifier
    pub verifier_cache_size: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            max_active_epochs: 2000,
            max_epoch_to_start: 0,
            blockchain_size: 2000,
            message_queue_size: 32,
            timeout_queue_size: 100,
            schedule_timeouts: true,
            pending_messages_limit: 1024,
            small_delta: Duration::from_millis(200),
            big_delta: Duration::from_secs(1),
            fast_path_enabled: false,
            model: ProtocolModel::Sync,
            byzantines: BTreeSet::new(),
            byzantine_attack: ByzantineAttack::Equivocation,
            verifier_cache_size: 1024,
        }
    }
}

impl ConsensusConfig {
    pub fn builder() -> ConsensusConfigBuilder {
        ConsensusConfigBuilder::default()
    }

    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json(json: &str) -> ConsensusResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConsensusError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConsensusResult<()> {
        let non_zero = [
            ("max_active_epochs", self.max_active_epochs),
            ("blockchain_size", self.blockchain_size),
            ("message_queue_size", self.message_queue_size),
            ("timeout_queue_size", self.timeout_queue_size),
            ("pending_messages_limit", self.pending_messages_limit),
            ("verifier_cache_size", self.verifier_cache_size),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(ConsensusError::InvalidConfig(format!(
                    "{name} cannot be 0"
                )));
            }
        }
        if self.small_delta.is_zero() {
            return Err(ConsensusError::InvalidConfig(
                "small_delta cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_byzantine(&self, process: ProcessId) -> bool {
        self.byzantines.contains(&process)
    }

    pub fn timeout_propose(&self) -> Duration {
        self.small_delta + self.big_delta
    }

    pub fn timeout_equivocation(&self) -> Duration {
        self.small_delta * 2
    }

    pub fn timeout_quit_epoch(&self) -> Duration {
        self.small_delta * 2
    }

    pub fn timeout_epoch_change(&self) -> Duration {
        self.small_delta * 2
    }
}

/// Builder for [`ConsensusConfig`]; unset fields take the defaults
#[derive(Default)]
pub struct ConsensusConfigBuilder {
    max_active_epochs: Option<usize>,
    max_epoch_to_start: Option<u64>,
    blockchain_size: Option<usize>,
    message_queue_size: Option<usize>,
    timeout_queue_size: Option<usize>,
    schedule_timeouts: Option<bool>,
    pending_messages_limit: Option<usize>,
    small_delta: Option<Duration>,
    big_delta: Option<Duration>,
    fast_path_enabled: Option<bool>,
    model: Option<ProtocolModel>,
    byzantines: Option<BTreeSet<ProcessId>>,
    byzantine_attack: Option<ByzantineAttack>,
    verifier_cache_size: Option<usize>,
}

impl ConsensusConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_active_epochs(mut self, epochs: usize) -> Self {
        self.max_active_epochs = Some(epochs);
        self
    }

    pub fn max_epoch_to_start(mut self, epoch: u64) -> Self {
        self.max_epoch_to_start = Some(epoch);
        self
    }

    pub fn blockchain_size(mut self, size: usize) -> Self {
        self.blockchain_size = Some(size);
        self
    }

    pub fn message_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = Some(size);
        self
    }

    pub fn timeout_queue_size(mut self, size: usize) -> Self {
        self.timeout_queue_size = Some(size);
        self
    }

    pub fn schedule_timeouts(mut self, enabled: bool) -> Self {
        self.schedule_timeouts = Some(enabled);
        self
    }

    pub fn pending_messages_limit(mut self, limit: usize) -> Self {
        self.pending_messages_limit = Some(limit);
        self
    }

    pub fn small_delta(mut self, delta: Duration) -> Self {
        self.small_delta = Some(delta);
        self
    }

    pub fn big_delta(mut self, delta: Duration) -> Self {
        self.big_delta = Some(delta);
        self
    }

    pub fn fast_path_enabled(mut self, enabled: bool) -> Self {
        self.fast_path_enabled = Some(enabled);
        self
    }

    pub fn model(mut self, model: ProtocolModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn byzantines(mut self, processes: impl IntoIterator<Item = ProcessId>) -> Self {
        self.byzantines = Some(processes.into_iter().collect());
        self
    }

    pub fn byzantine_attack(mut self, attack: ByzantineAttack) -> Self {
        self.byzantine_attack = Some(attack);
        self
    }

    pub fn verifier_cache_size(mut self, size: usize) -> Self {
        self.verifier_cache_size = Some(size);
        self
    }

    /// Build and validate
    pub fn build(self) -> ConsensusResult<ConsensusConfig> {
        let config = self.build_unchecked();
        config.validate()?;
        Ok(config)
    }

    /// Build without validation
    pub fn build_unchecked(self) -> ConsensusConfig {
        let defaults = ConsensusConfig::default();
        ConsensusConfig {
            max_active_epochs: self.max_active_epochs.unwrap_or(defaults.max_active_epochs),
            max_epoch_to_start: self
                .max_epoch_to_start
                .unwrap_or(defaults.max_epoch_to_start),
            blockchain_size: self.blockchain_size.unwrap_or(defaults.blockchain_size),
            message_queue_size: self
                .message_queue_size
                .unwrap_or(defaults.message_queue_size),
            timeout_queue_size: self
                .timeout_queue_size
                .unwrap_or(defaults.timeout_queue_size),
            schedule_timeouts: self.schedule_timeouts.unwrap_or(defaults.schedule_timeouts),
            pending_messages_limit: self
                .pending_messages_limit
                .unwrap_or(defaults.pending_messages_limit),
            small_delta: self.small_delta.unwrap_or(defaults.small_delta),
            big_delta: self.big_delta.unwrap_or(defaults.big_delta),
            fast_path_enabled: self.fast_path_enabled.unwrap_or(defaults.fast_path_enabled),
            model: self.model.unwrap_or(defaults.model),
            byzantines: self.byzantines.unwrap_or(defaults.byzantines),
            byzantine_attack: self.byzantine_attack.unwrap_or(defaults.byzantine_attack),
            verifier_cache_size: self
                .verifier_cache_size
                .unwrap_or(defaults.verifier_cache_size),
        }
    }
}
