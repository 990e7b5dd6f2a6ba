//! Queue-backed application
//!
//! Implements the Application port: proposes queued values (or generated
//! ones once the queue is empty) and records every delivered block.

use crate::domain::{Block, Epoch, ProcessId};
use crate::ports::Application;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use tokio::sync::watch;

pub struct QueueApplication {
    queue: Mutex<VecDeque<Vec<u8>>>,
    /// Generate `p<id>-<n>` values when the queue runs dry
    generator: Option<ProcessId>,
    generated: Mutex<u64>,
    delivered: RwLock<Vec<(Epoch, Block)>>,
    delivered_count: watch::Sender<usize>,
}

impl QueueApplication {
    /// Application that never runs out of values
    pub fn generating(process: ProcessId) -> Self {
        Self::build(VecDeque::new(), Some(process))
    }

    /// Application proposing exactly `values`, then nothing
    pub fn from_values(values: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self::build(values.into_iter().collect(), None)
    }

    fn build(queue: VecDeque<Vec<u8>>, generator: Option<ProcessId>) -> Self {
        let (delivered_count, _) = watch::channel(0);
        Self {
            queue: Mutex::new(queue),
            generator,
            generated: Mutex::new(0),
            delivered: RwLock::new(Vec::new()),
            delivered_count,
        }
    }

    pub fn push(&self, value: Vec<u8>) {
        self.queue.lock().push_back(value);
    }

    /// Delivered blocks, in delivery order
    pub fn delivered(&self) -> Vec<Block> {
        self.delivered.read().iter().map(|(_, block)| block.clone()).collect()
    }

    pub fn delivered_with_epochs(&self) -> Vec<(Epoch, Block)> {
        self.delivered.read().clone()
    }

    pub fn delivered_len(&self) -> usize {
        self.delivered.read().len()
    }

    /// Watch the number of delivered blocks
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.delivered_count.subscribe()
    }
}

impl Application for QueueApplication {
    fn get_value(&self) -> Option<Vec<u8>> {
        if let Some(value) = self.queue.lock().pop_front() {
            return Some(value);
        }
        let process = self.generator?;
        let mut generated = self.generated.lock();
        *generated += 1;
        Some(format!("p{process}-{generated}").into_bytes())
    }

    fn deliver(&self, epoch: Epoch, block: &Block) {
        let count = {
            let mut delivered = self.delivered.write();
            delivered.push((epoch, block.clone()));
            delivered.len()
        };
        self.delivered_count.send_replace(count);
    }
}
