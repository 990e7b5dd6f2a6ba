//! # Honest Clusters
//!
//! All processes follow the protocol. Epochs stop at a configured cutoff so
//! the run quiesces and every pending equivocation timeout gets to fire.

#[cfg(test)]
mod tests {
    use crate::cluster::{cluster_config, Cluster};
    use alter_consensus::{ConsensusConfig, ProcessId, ProtocolModel};
    use std::time::Duration;

    const LIMIT: Duration = Duration::from_secs(120);

    fn all(n: usize) -> Vec<ProcessId> {
        (0..n as ProcessId).collect()
    }

    // =========================================================================
    // Normal operation
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_four_processes_deliver_one_block_per_epoch() {
        let cluster = Cluster::start(4, cluster_config(12)).unwrap();

        cluster.wait_for_deliveries(&all(4), 12, LIMIT).await.unwrap();
        cluster.check_safety(&all(4)).unwrap();

        let reference = cluster.delivered(0);
        assert_eq!(reference.len(), 12);
        for process in 1..4 {
            assert_eq!(cluster.delivered(process), reference);
        }
        // Every epoch's proposer got its value in
        for (epoch, block) in reference.iter().enumerate() {
            let proposer = epoch % 4;
            assert!(
                block.value().starts_with(format!("p{proposer}-").as_bytes()),
                "block {epoch} not proposed by {proposer}"
            );
        }
        cluster.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_processes_tolerate_no_faults_and_still_agree() {
        let cluster = Cluster::start(3, cluster_config(6)).unwrap();

        cluster.wait_for_deliveries(&all(3), 6, LIMIT).await.unwrap();
        cluster.check_safety(&all(3)).unwrap();
        cluster.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_chain_to_their_parents() {
        let cluster = Cluster::start(4, cluster_config(5)).unwrap();
        cluster.wait_for_deliveries(&[2], 5, LIMIT).await.unwrap();

        let delivered = cluster.delivered(2);
        assert_eq!(delivered[0].prev_block_id(), None);
        for pair in delivered.windows(2) {
            assert_eq!(pair[1].prev_block_id(), Some(pair[0].id()));
        }
        cluster.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_path_decides_without_waiting() {
        // Timeouts far beyond the wait limit: only the fast path can decide
        let config = ConsensusConfig {
            fast_path_enabled: true,
            small_delta: Duration::from_secs(30),
            big_delta: Duration::from_secs(60),
            ..cluster_config(8)
        };
        let cluster = Cluster::start(4, config).unwrap();

        cluster
            .wait_for_deliveries(&all(4), 8, Duration::from_secs(10))
            .await
            .unwrap();
        cluster.check_safety(&all(4)).unwrap();
        cluster.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_delta_model_cluster_only_probes() {
        let config = ConsensusConfig {
            model: ProtocolModel::Delta,
            ..cluster_config(4)
        };
        let cluster = Cluster::start(3, config).unwrap();

        // Probes bounce between peers without timers, so the clock never moves
        for _ in 0..10_000 {
            if cluster.network().delivered() >= 30 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(cluster.network().delivered() >= 30);
        for process in all(3) {
            assert!(cluster.delivered(process).is_empty());
        }
        cluster.stop().await.unwrap();
    }

    // =========================================================================
    // Network faults
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_isolated_proposer_is_skipped_by_silence() {
        let cluster = Cluster::start(4, cluster_config(8)).unwrap();
        cluster.network().isolate(3);

        // Epochs 3 and 7 end in silence, the other six decide a block each
        cluster.wait_for_deliveries(&[0, 1, 2], 6, LIMIT).await.unwrap();
        cluster.check_safety(&all(4)).unwrap();

        for block in cluster.delivered(0) {
            assert!(!block.value().starts_with(b"p3-"));
        }
        cluster.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restored_process_rejoins() {
        let cluster = Cluster::start(3, cluster_config(9)).unwrap();
        cluster.network().isolate(2);
        cluster.wait_for_deliveries(&[0, 1], 2, LIMIT).await.unwrap();

        cluster.network().restore(2);
        cluster.wait_for_deliveries(&all(3), 6, LIMIT).await.unwrap();
        cluster.check_safety(&all(3)).unwrap();
        cluster.stop().await.unwrap();
    }
}
