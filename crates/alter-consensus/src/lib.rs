//! # alter-consensus
//!
//! AlterBFT epoch consensus for a fixed set of `N` processes.
//!
//! ## Architecture
//!
//! Each epoch has one proposer (`epoch mod N`). A block certificate (more
//! than `N/2` matching signatures) locks a process; the lock becomes a
//! decision once the equivocation timeout expires without proof that the
//! proposer signed two blocks. A silence certificate or equivocation proof
//! moves every process to the next epoch without a decision.
//!
//! ```text
//!  raw bytes ──► [SignatureVerifier] ──► Replica ──► EpochWindow ──► AlterBft (epoch e)
//!                                          ▲  │                          │
//!                     [TimeoutScheduler] ──┘  └── ReplicaContext ◄───────┘  (Process)
//!                                                  │  Blockchain
//!                                                  ├─► Transport (sign + encode)
//!                                                  └─► Application (values, deliveries)
//! ```
//!
//! The replica task owns the window, the blockchain and every epoch instance;
//! nothing on that path takes a lock. Timers run in their own task.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use alter_consensus::adapters::{Ed25519Signer, InMemoryNetwork, QueueApplication};
//! use alter_consensus::{ConsensusConfig, Replica, ReplicaDeps, TimeoutScheduler};
//!
//! let config = ConsensusConfig::default();
//! let (network, mut inboxes) = InMemoryNetwork::new(4);
//! let (timeouts, expired, _scheduler) = TimeoutScheduler::spawn(config.timeout_queue_size);
//!
//! let replica = Replica::new(0, 4, config, ReplicaDeps {
//!     transport: network,
//!     application: Arc::new(QueueApplication::generating(0)),
//!     signer: Arc::new(Ed25519Signer::from_seed(seed)),
//!     timeouts: Arc::new(timeouts),
//! })?;
//! replica.run(verified_messages, expired, shutdown).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod protocol;
pub mod scheduler;
pub mod service;

// Re-export main types
pub use domain::{
    Block, BlockId, Blockchain, ByzantineAttack, Certificate, CertificateKind, ConsensusConfig,
    ConsensusError, ConsensusResult, Epoch, Height, Message, MessageType, ProcessId,
    ProtocolModel, Timeout, TimeoutKind,
};
pub use ports::{Application, EpochProtocol, MessageSigner, Process, TimeoutSink, Transport};
pub use protocol::{AlterBft, DeltaProbe, EpochFactory, EpochPolicy, Phase};
pub use scheduler::{ScheduleHandle, TimeoutScheduler};
pub use service::{EpochWindow, Replica, ReplicaDeps};
