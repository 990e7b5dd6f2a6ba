//! Timeout scheduler
//!
//! An actor task owning the pending timeouts. A request's duration becomes an
//! absolute deadline when the task first sees it. One timer is armed for the
//! earliest deadline (a minute when nothing is pending); when it fires, every
//! due timeout is pushed to the output queue without blocking.

use crate::domain::Timeout;
use crate::metrics;
use crate::ports::TimeoutSink;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Timer period while nothing is pending
pub const IDLE_DEADLINE: Duration = Duration::from_secs(60);

/// Cloneable, non-blocking entry point of the scheduler
#[derive(Clone, Debug)]
pub struct ScheduleHandle {
    input: mpsc::Sender<Timeout>,
}

impl TimeoutSink for ScheduleHandle {
    fn schedule(&self, timeout: Timeout) -> bool {
        match self.input.try_send(timeout) {
            Ok(()) => true,
            Err(TrySendError::Full(timeout)) => {
                warn!(
                    epoch = timeout.epoch,
                    kind = timeout.kind.name(),
                    "failed to schedule timeout: queue full"
                );
                metrics::record_timeout_dropped();
                false
            }
            Err(TrySendError::Closed(timeout)) => {
                debug!(
                    epoch = timeout.epoch,
                    kind = timeout.kind.name(),
                    "scheduler stopped, timeout ignored"
                );
                false
            }
        }
    }
}

pub struct TimeoutScheduler {
    input: mpsc::Receiver<Timeout>,
    output: mpsc::Sender<Timeout>,
    pending: Vec<(Instant, Timeout)>,
}

impl TimeoutScheduler {
    /// Spawn the scheduler task with bounded input and output queues.
    ///
    /// The task stops once every [`ScheduleHandle`] is dropped.
    pub fn spawn(queue_size: usize) -> (ScheduleHandle, mpsc::Receiver<Timeout>, JoinHandle<()>) {
        let (input_tx, input_rx) = mpsc::channel(queue_size);
        let (output_tx, output_rx) = mpsc::channel(queue_size);
        let scheduler = Self {
            input: input_rx,
            output: output_tx,
            pending: Vec::new(),
        };
        let task = tokio::spawn(scheduler.run());
        (ScheduleHandle { input: input_tx }, output_rx, task)
    }

    fn next_deadline(&self, now: Instant) -> Instant {
        self.pending
            .iter()
            .map(|(deadline, _)| *deadline)
            .fold(now + IDLE_DEADLINE, Instant::min)
    }

    fn fire_due(&mut self, now: Instant) {
        let output = &self.output;
        self.pending.retain(|(deadline, timeout)| {
            if *deadline > now {
                return true;
            }
            trace!(
                epoch = timeout.epoch,
                kind = timeout.kind.name(),
                "timeout expired"
            );
            if output.try_send(*timeout).is_err() {
                warn!(
                    epoch = timeout.epoch,
                    kind = timeout.kind.name(),
                    "failed to publish timeout"
                );
                metrics::record_timeout_dropped();
            }
            false
        });
    }

    async fn run(mut self) {
        let sleep = time::sleep_until(self.next_deadline(Instant::now()));
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                request = self.input.recv() => {
                    let Some(timeout) = request else {
                        break;
                    };
                    let deadline = Instant::now() + timeout.duration;
                    self.pending.push((deadline, timeout));
                    if deadline < sleep.deadline() {
                        sleep.as_mut().reset(deadline);
                    }
                }
                () = &mut sleep => {
                    let now = Instant::now();
                    self.fire_due(now);
                    sleep.as_mut().reset(self.next_deadline(now));
                }
            }
        }
        debug!(pending = self.pending.len(), "timeout scheduler stopped");
    }
}
