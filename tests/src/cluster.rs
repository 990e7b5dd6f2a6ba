//! # In-process cluster
//!
//! Wires `N` replicas the way a deployment would, minus the sockets:
//!
//! ```text
//! InMemoryNetwork ──► SignatureVerifier ──► Replica::run ◄── TimeoutScheduler
//!        ▲                                     │
//!        └──────────── Transport ◄─────────────┘──► QueueApplication
//! ```
//!
//! Every replica gets its own verifier task, scheduler task and application.
//! Keys are derived from the process id so runs are reproducible.

use alter_consensus::adapters::{
    Ed25519Signer, InMemoryNetwork, QueueApplication, SignatureVerifier,
};
use alter_consensus::{
    Block, ConsensusConfig, ConsensusResult, Epoch, ProcessId, Replica, ReplicaDeps,
    TimeoutScheduler,
};
use alter_telemetry::{init_tracing, TelemetryConfig, TracingGuard};
use anyhow::{bail, ensure, Context};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Secret seed of `process`
pub fn seed(process: ProcessId) -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed[..2].copy_from_slice(&process.to_be_bytes());
    seed[31] = 0xA1;
    seed
}

/// Install the global subscriber once; later calls are no-ops.
///
/// Quiet unless `ALTER_LOG_LEVEL` or `RUST_LOG` asks for more.
pub fn init_test_logging() {
    static LOGGING: OnceLock<Option<TracingGuard>> = OnceLock::new();
    LOGGING.get_or_init(|| {
        let mut config = TelemetryConfig::from_env();
        if std::env::var("ALTER_LOG_LEVEL").is_err() && std::env::var("RUST_LOG").is_err() {
            config.log_level = "warn".to_string();
        }
        config.service_name = "alter-tests".to_string();
        init_tracing(&config).ok()
    });
}

struct Node {
    application: Arc<QueueApplication>,
    replica: JoinHandle<ConsensusResult<()>>,
    verifier: JoinHandle<()>,
    scheduler: JoinHandle<()>,
}

pub struct Cluster {
    network: Arc<InMemoryNetwork>,
    nodes: Vec<Node>,
    shutdown: watch::Sender<bool>,
}

impl Cluster {
    /// Spawn `num_processes` replicas sharing `config`
    pub fn start(num_processes: usize, config: ConsensusConfig) -> anyhow::Result<Self> {
        init_test_logging();

        let (network, inboxes) = InMemoryNetwork::new(num_processes);
        let signers: Vec<Ed25519Signer> = (0..num_processes as ProcessId)
            .map(|process| Ed25519Signer::from_seed(seed(process)))
            .collect();
        let keys: Vec<_> = signers.iter().map(Ed25519Signer::verifying_key).collect();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut nodes = Vec::with_capacity(num_processes);
        for ((id, signer), inbox) in (0..num_processes as ProcessId).zip(signers).zip(inboxes) {
            let application = Arc::new(QueueApplication::generating(id));
            let (timeouts, expired, scheduler) =
                TimeoutScheduler::spawn(config.timeout_queue_size);

            let verifier = Arc::new(SignatureVerifier::new(
                keys.clone(),
                config.verifier_cache_size,
            ));
            let (verified_tx, verified_rx) = mpsc::channel(config.message_queue_size);
            let verifier = verifier.spawn(inbox, verified_tx);

            let replica = Replica::new(
                id,
                num_processes,
                config.clone(),
                ReplicaDeps {
                    transport: network.clone(),
                    application: application.clone(),
                    signer: Arc::new(signer),
                    timeouts: Arc::new(timeouts),
                },
            )
            .with_context(|| format!("creating replica {id}"))?;
            let replica = tokio::spawn(replica.run(verified_rx, expired, shutdown_rx.clone()));

            nodes.push(Node {
                application,
                replica,
                verifier,
                scheduler,
            });
        }

        tracing::info!(
            processes = num_processes,
            max_epoch_to_start = config.max_epoch_to_start,
            byzantines = ?config.byzantines,
            "cluster started"
        );
        Ok(Self {
            network,
            nodes,
            shutdown,
        })
    }

    pub fn network(&self) -> &InMemoryNetwork {
        &self.network
    }

    pub fn num_processes(&self) -> usize {
        self.nodes.len()
    }

    /// Blocks delivered by `process`, in delivery order
    pub fn delivered(&self, process: ProcessId) -> Vec<Block> {
        self.nodes[process as usize].application.delivered()
    }

    /// Epochs in which `process` decided, one entry per delivered block
    pub fn delivered_epochs(&self, process: ProcessId) -> Vec<Epoch> {
        self.nodes[process as usize]
            .application
            .delivered_with_epochs()
            .into_iter()
            .map(|(epoch, _)| epoch)
            .collect()
    }

    /// Wait until every process in `processes` delivered at least `count` blocks
    pub async fn wait_for_deliveries(
        &self,
        processes: &[ProcessId],
        count: usize,
        limit: Duration,
    ) -> anyhow::Result<()> {
        let wait = async {
            for &process in processes {
                let mut delivered = self.nodes[process as usize].application.subscribe();
                delivered
                    .wait_for(|delivered| *delivered >= count)
                    .await
                    .with_context(|| format!("process {process} application dropped"))?;
            }
            anyhow::Ok(())
        };
        match tokio::time::timeout(limit, wait).await {
            Ok(result) => result,
            Err(_) => {
                let progress: Vec<usize> = processes
                    .iter()
                    .map(|&p| self.nodes[p as usize].application.delivered_len())
                    .collect();
                bail!("expected {count} deliveries within {limit:?}, got {progress:?}")
            }
        }
    }

    /// Delivered sequences of `processes` are prefixes of one another
    pub fn check_safety(&self, processes: &[ProcessId]) -> anyhow::Result<()> {
        let sequences: Vec<(ProcessId, Vec<Block>)> = processes
            .iter()
            .map(|&p| (p, self.delivered(p)))
            .collect();
        for (a, first) in &sequences {
            for (b, second) in &sequences {
                for (height, (x, y)) in first.iter().zip(second).enumerate() {
                    ensure!(
                        x == y,
                        "process {a} and {b} delivered different blocks at position {height}: {} vs {}",
                        x.id(),
                        y.id()
                    );
                }
            }
        }
        for (process, sequence) in &sequences {
            for (position, block) in sequence.iter().enumerate() {
                ensure!(
                    block.height() == position as u64,
                    "process {process} delivered height {} at position {position}",
                    block.height()
                );
            }
        }
        Ok(())
    }

    /// Signal shutdown and wait for every replica to return cleanly
    pub async fn stop(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        for (id, node) in self.nodes.into_iter().enumerate() {
            node.replica
                .await
                .with_context(|| format!("replica {id} panicked"))?
                .with_context(|| format!("replica {id} failed"))?;
            node.verifier.abort();
            // Scheduler exits once the replica dropped its handle
            node.scheduler
                .await
                .with_context(|| format!("scheduler {id} panicked"))?;
        }
        Ok(())
    }
}

/// Configuration for cluster runs: epochs stop at `epochs`
pub fn cluster_config(epochs: u64) -> ConsensusConfig {
    ConsensusConfig::builder()
        .max_epoch_to_start(epochs)
        .small_delta(Duration::from_millis(20))
        .big_delta(Duration::from_millis(100))
        .timeout_queue_size(1024)
        .message_queue_size(256)
        .build_unchecked()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeds_are_distinct() {
        assert_ne!(seed(0), seed(1));
        assert_eq!(seed(258)[..2], [1, 2]);
    }

    #[test]
    fn test_cluster_config_is_valid() {
        let config = cluster_config(10);
        assert!(config.validate().is_ok());
        assert_eq!(config.max_epoch_to_start, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_epoch_cluster_decides_and_stops() {
        let cluster = Cluster::start(3, cluster_config(1)).unwrap();
        assert_eq!(cluster.num_processes(), 3);
        cluster
            .wait_for_deliveries(&[0, 1, 2], 1, Duration::from_secs(30))
            .await
            .unwrap();
        cluster.check_safety(&[0, 1, 2]).unwrap();
        cluster.stop().await.unwrap();
    }
}
