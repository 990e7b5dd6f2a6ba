//! Replica driver
//!
//! Owns the epoch window, the blockchain and the collaborators an epoch acts
//! through. Epoch instances only record decisions and epoch completions; the
//! replica applies them once the instance call returns, so an instance is
//! never re-entered while it is running.

use super::EpochWindow;
use crate::domain::{
    Block, Blockchain, Certificate, ConsensusConfig, ConsensusError, ConsensusResult, Epoch,
    Message, ProcessId, Timeout,
};
use crate::metrics;
use crate::ports::{Application, MessageSigner, Process, TimeoutSink, Transport};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace};

/// Collaborators of a replica
#[derive(Clone)]
pub struct ReplicaDeps {
    pub transport: Arc<dyn Transport>,
    pub application: Arc<dyn Application>,
    pub signer: Arc<dyn MessageSigner>,
    pub timeouts: Arc<dyn TimeoutSink>,
}

/// Effect of an epoch call applied by the replica afterwards
#[derive(Debug)]
enum Outcome {
    Decided {
        epoch: Epoch,
        block: Block,
    },
    Finished {
        epoch: Epoch,
        valid: Option<Certificate>,
        locked: Option<Certificate>,
    },
}

/// The [`Process`] lent to epoch instances
pub struct ReplicaContext {
    id: ProcessId,
    num_processes: usize,
    config: ConsensusConfig,
    blockchain: Blockchain,
    deps: ReplicaDeps,
    outcomes: VecDeque<Outcome>,
}

impl ReplicaContext {
    /// Attach this process's signature to messages it authored
    fn sign(&self, message: &mut Message) {
        if message.sender() != Some(self.id) {
            return;
        }
        if let Some(payload) = message.signing_payload() {
            message.set_signature(self.deps.signer.sign(&payload));
        }
    }
}

impl Process for ReplicaContext {
    fn id(&self) -> ProcessId {
        self.id
    }

    fn num_processes(&self) -> usize {
        self.num_processes
    }

    fn broadcast(&mut self, mut message: Message) {
        self.sign(&mut message);
        trace!(
            process = self.id,
            kind = message.message_type().name(),
            "broadcast"
        );
        self.deps.transport.broadcast(self.id, &message.encode());
    }

    fn forward(&mut self, message: Message) {
        let others: Vec<ProcessId> = (0..self.num_processes as ProcessId)
            .filter(|peer| *peer != self.id)
            .collect();
        self.deps.transport.send(self.id, &message.encode(), &others);
    }

    fn send(&mut self, mut message: Message, to: &[ProcessId]) {
        self.sign(&mut message);
        self.deps.transport.send(self.id, &message.encode(), to);
    }

    fn schedule(&mut self, timeout: Timeout) -> bool {
        // Disabled timers are dropped on purpose
        !self.config.schedule_timeouts || self.deps.timeouts.schedule(timeout)
    }

    fn get_value(&mut self) -> Option<Vec<u8>> {
        self.deps.application.get_value()
    }

    fn add_block(&mut self, block: &Block) -> bool {
        self.blockchain.add_block(block)
    }

    fn extend_valid_chain(&self, block: &Block) -> bool {
        self.blockchain.extend_valid_chain(block)
    }

    fn decide(&mut self, epoch: Epoch, block: Block) {
        self.outcomes.push_back(Outcome::Decided { epoch, block });
    }

    fn finish(&mut self, epoch: Epoch, valid: Option<Certificate>, locked: Option<Certificate>) {
        self.outcomes
            .push_back(Outcome::Finished { epoch, valid, locked });
    }

    fn timeout_propose(&self, _epoch: Epoch) -> Duration {
        self.config.timeout_propose()
    }

    fn timeout_equivocation(&self, _epoch: Epoch) -> Duration {
        self.config.timeout_equivocation()
    }

    fn timeout_quit_epoch(&self, _epoch: Epoch) -> Duration {
        self.config.timeout_quit_epoch()
    }

    fn timeout_epoch_change(&self, _epoch: Epoch) -> Duration {
        self.config.timeout_epoch_change()
    }
}

/// Certificates carried into the next epoch
type Carried = (Option<Certificate>, Option<Certificate>);

/// One consensus participant
pub struct Replica {
    context: ReplicaContext,
    window: EpochWindow,
    /// Start refused by a full window, retried after the next decision
    deferred_start: Option<Carried>,
}

impl Replica {
    pub fn new(
        id: ProcessId,
        num_processes: usize,
        config: ConsensusConfig,
        deps: ReplicaDeps,
    ) -> ConsensusResult<Self> {
        config.validate()?;
        if num_processes == 0 || id as usize >= num_processes {
            return Err(ConsensusError::InvalidConfig(format!(
                "process {id} outside a system of {num_processes}"
            )));
        }
        Ok(Self {
            window: EpochWindow::new(&config, id),
            deferred_start: None,
            context: ReplicaContext {
                id,
                num_processes,
                blockchain: Blockchain::new(config.blockchain_size),
                config,
                deps,
                outcomes: VecDeque::new(),
            },
        })
    }

    pub fn id(&self) -> ProcessId {
        self.context.id
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.context.blockchain
    }

    pub fn window(&self) -> &EpochWindow {
        &self.window
    }

    /// Start epoch 0. Later calls do nothing.
    pub fn bootstrap(&mut self) {
        if self.window.last_epoch().is_some() {
            return;
        }
        self.window.start_new_epoch(&mut self.context, None, None);
        self.apply_outcomes();
    }

    /// Route a verified message to its epoch.
    ///
    /// Messages without an epoch go to the last started epoch.
    pub fn handle_message(&mut self, message: Message) {
        metrics::record_message_received(message.message_type().name());
        let Some(epoch) = message.epoch().or(self.window.last_epoch()) else {
            trace!(kind = message.message_type().name(), "no epoch started yet");
            return;
        };
        if let Some(instance) = self.window.get_consensus_epoch(epoch) {
            instance.process_message(&mut self.context, message);
        }
        self.apply_outcomes();
    }

    pub fn handle_timeout(&mut self, timeout: Timeout) {
        if let Some(instance) = self.window.instance_mut(timeout.epoch) {
            instance.process_timeout(&mut self.context, timeout);
        }
        self.apply_outcomes();
    }

    fn apply_outcomes(&mut self) {
        while let Some(outcome) = self.context.outcomes.pop_front() {
            match outcome {
                Outcome::Decided { epoch, block } => self.on_decided(epoch, block),
                Outcome::Finished {
                    epoch,
                    valid,
                    locked,
                } => {
                    if self.window.last_epoch() == Some(epoch) {
                        self.start_next_epoch(valid, locked);
                    }
                }
            }
        }
    }

    fn start_next_epoch(&mut self, valid: Option<Certificate>, locked: Option<Certificate>) {
        if self.window.is_full() {
            debug!(
                process = self.context.id,
                "next epoch deferred until a decision"
            );
            self.deferred_start = Some((valid, locked));
            return;
        }
        self.window.start_new_epoch(&mut self.context, valid, locked);
    }

    fn on_decided(&mut self, epoch: Epoch, block: Block) {
        metrics::record_decision();
        if !self.window.finish_epoch(epoch) {
            debug!(epoch, block = %block.id(), "decision for an already decided epoch");
            return;
        }
        metrics::record_epoch_finished();

        let committed = self.context.blockchain.commit(&block);
        for delivered in committed.iter().rev() {
            self.context.deps.application.deliver(epoch, delivered);
        }
        metrics::record_blocks_delivered(committed.len());
        info!(
            epoch,
            process = self.context.id,
            height = block.height(),
            block = %block.id(),
            delivered = committed.len(),
            "committed"
        );

        if let Some((valid, locked)) = self.deferred_start.take() {
            self.start_next_epoch(valid, locked);
        }
    }

    /// Drive the replica until shutdown.
    ///
    /// Starts epoch 0, then handles verified messages and expired timeouts one
    /// at a time. Returns an error if an input queue closes first.
    pub async fn run(
        mut self,
        mut messages: mpsc::Receiver<Message>,
        mut timeouts: mpsc::Receiver<Timeout>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ConsensusResult<()> {
        self.bootstrap();
        info!(process = self.context.id, "replica running");

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(
                            process = self.context.id,
                            last_epoch = ?self.window.last_epoch(),
                            last_decided = ?self.window.last_decided(),
                            "replica stopped"
                        );
                        return Ok(());
                    }
                }
                timeout = timeouts.recv() => match timeout {
                    Some(timeout) => self.handle_timeout(timeout),
                    None => return Err(ConsensusError::ChannelClosed("timeouts")),
                },
                message = messages.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => return Err(ConsensusError::ChannelClosed("messages")),
                },
            }
        }
    }
}
