//! # AlterBFT Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── cluster.rs        # In-process cluster harness
//! └── integration/      # Multi-replica scenarios
//!     ├── liveness.rs   # Honest clusters, fast path, isolation
//!     └── byzantine.rs  # Silent and equivocating processes
//!
//! tests/benches/
//! └── codec_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p alter-tests
//! cargo test -p alter-tests integration::byzantine
//!
//! # Benchmarks
//! cargo bench -p alter-tests
//! ```
//!
//! Scenarios run on a paused tokio clock, so timeouts cost no wall time.

pub mod cluster;
pub mod integration;

pub use cluster::{cluster_config, init_test_logging, seed, Cluster};
