//! # Byzantine Processes
//!
//! One faulty process out of four. Honest processes must agree on what they
//! deliver and keep delivering in the epochs led by honest proposers.

#[cfg(test)]
mod tests {
    use crate::cluster::{cluster_config, Cluster};
    use alter_consensus::{ByzantineAttack, ConsensusConfig, Epoch, ProcessId};
    use std::time::Duration;

    const LIMIT: Duration = Duration::from_secs(300);

    fn byzantine_config(
        process: ProcessId,
        attack: ByzantineAttack,
        epochs: Epoch,
    ) -> ConsensusConfig {
        ConsensusConfig {
            byzantines: [process].into(),
            byzantine_attack: attack,
            ..cluster_config(epochs)
        }
    }

    /// Epochs in `0..epochs` led by `process` in a system of `n`
    fn led_by(process: ProcessId, n: usize, epochs: Epoch) -> Vec<Epoch> {
        (0..epochs).filter(|e| e % n as u64 == process as u64).collect()
    }

    // =========================================================================
    // Silent process
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_silent_process_does_not_stop_honest_majority() {
        let cluster =
            Cluster::start(4, byzantine_config(3, ByzantineAttack::Silent, 12)).unwrap();
        let honest = [0, 1, 2];

        // Nine honest epochs, one block each
        cluster.wait_for_deliveries(&honest, 9, LIMIT).await.unwrap();
        cluster.check_safety(&honest).unwrap();

        assert!(cluster.delivered(3).is_empty());
        for block in cluster.delivered(0) {
            assert!(!block.value().starts_with(b"p3-"));
        }
        cluster.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_first_proposer() {
        let cluster =
            Cluster::start(3, byzantine_config(0, ByzantineAttack::Silent, 6)).unwrap();

        // Epochs 0 and 3 are blamed; genesis comes from process 1
        cluster.wait_for_deliveries(&[1, 2], 4, LIMIT).await.unwrap();
        cluster.check_safety(&[1, 2]).unwrap();
        assert!(cluster.delivered(1)[0].value().starts_with(b"p1-"));
        cluster.stop().await.unwrap();
    }

    // =========================================================================
    // Equivocating leader
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_equivocating_leader_never_gets_a_decision() {
        let cluster =
            Cluster::start(4, byzantine_config(1, ByzantineAttack::Equivocation, 12)).unwrap();
        let honest = [0, 2, 3];

        cluster.wait_for_deliveries(&honest, 9, LIMIT).await.unwrap();
        cluster.check_safety(&honest).unwrap();

        // Conflicting proposals are exposed before the equivocation timeout
        let byzantine_epochs = led_by(1, 4, 12);
        for process in honest {
            let decided = cluster.delivered_epochs(process);
            for epoch in &byzantine_epochs {
                assert!(
                    !decided.contains(epoch),
                    "process {process} decided in epoch {epoch} led by the equivocator"
                );
            }
        }
        cluster.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_equivocating_first_proposer_keeps_safety() {
        let cluster =
            Cluster::start(4, byzantine_config(0, ByzantineAttack::Equivocation, 10)).unwrap();
        let honest = [1, 2, 3];

        cluster.wait_for_deliveries(&honest, 5, LIMIT).await.unwrap();
        cluster.check_safety(&honest).unwrap();
        cluster.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_equivocating_leader_in_minimal_system() {
        let cluster =
            Cluster::start(3, byzantine_config(2, ByzantineAttack::Equivocation, 9)).unwrap();
        let honest = [0, 1];

        cluster.wait_for_deliveries(&honest, 4, LIMIT).await.unwrap();
        cluster.check_safety(&honest).unwrap();
        cluster.stop().await.unwrap();
    }
}
