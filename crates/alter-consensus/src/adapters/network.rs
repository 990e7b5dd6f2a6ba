//! In-memory transport
//!
//! Implements the Transport port with one unbounded tokio channel per
//! process. Used by tests and local simulations.

use crate::domain::ProcessId;
use crate::ports::Transport;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Fully connected in-process network
pub struct InMemoryNetwork {
    peers: Vec<mpsc::UnboundedSender<Vec<u8>>>,
    /// Processes whose outgoing traffic is dropped
    isolated: RwLock<HashSet<ProcessId>>,
    delivered: AtomicU64,
}

impl InMemoryNetwork {
    /// Network of `num_processes` processes and the receiving end of each
    pub fn new(num_processes: usize) -> (Arc<Self>, Vec<mpsc::UnboundedReceiver<Vec<u8>>>) {
        let (peers, receivers): (Vec<_>, Vec<_>) =
            (0..num_processes).map(|_| mpsc::unbounded_channel()).unzip();
        let network = Arc::new(Self {
            peers,
            isolated: RwLock::new(HashSet::new()),
            delivered: AtomicU64::new(0),
        });
        (network, receivers)
    }

    pub fn num_processes(&self) -> usize {
        self.peers.len()
    }

    /// Drop everything `process` sends from now on
    pub fn isolate(&self, process: ProcessId) {
        self.isolated.write().insert(process);
    }

    pub fn restore(&self, process: ProcessId) {
        self.isolated.write().remove(&process);
    }

    /// Messages handed to a live receiver so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn deliver(&self, from: ProcessId, bytes: &[u8], to: ProcessId) {
        let Some(peer) = self.peers.get(to as usize) else {
            trace!(from, to, "unknown destination");
            return;
        };
        if peer.send(bytes.to_vec()).is_ok() {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            trace!(from, to, "destination stopped");
        }
    }
}

impl Transport for InMemoryNetwork {
    fn broadcast(&self, from: ProcessId, bytes: &[u8]) {
        if self.isolated.read().contains(&from) {
            return;
        }
        for to in 0..self.peers.len() as ProcessId {
            self.deliver(from, bytes, to);
        }
    }

    fn send(&self, from: ProcessId, bytes: &[u8], to: &[ProcessId]) {
        if self.isolated.read().contains(&from) {
            return;
        }
        for peer in to {
            self.deliver(from, bytes, *peer);
        }
    }
}
