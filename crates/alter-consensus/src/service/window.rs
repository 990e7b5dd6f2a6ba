//! Bounded window of epoch instances
//!
//! Epoch `e` lives in slot `e mod max_active_epochs`. At most
//! `max_active_epochs` epochs are started and not yet decided at any time.
//! Instances for epochs not started yet are created on demand so they can
//! buffer early messages.

use crate::domain::{Certificate, ConsensusConfig, Epoch, ProcessId};
use crate::metrics;
use crate::ports::{EpochProtocol, Process};
use crate::protocol::EpochFactory;
use tracing::{info, trace, warn};

/// `e + 1`, with `None` standing for "before epoch 0"
fn successor(epoch: Option<Epoch>) -> Epoch {
    epoch.map_or(0, |e| e + 1)
}

pub struct EpochWindow {
    slots: Vec<Option<Box<dyn EpochProtocol>>>,
    max_epoch_to_start: Epoch,
    last_epoch: Option<Epoch>,
    last_decided: Option<Epoch>,
    factory: EpochFactory,
}

impl EpochWindow {
    pub fn new(config: &ConsensusConfig, process: ProcessId) -> Self {
        Self {
            slots: (0..config.max_active_epochs).map(|_| None).collect(),
            max_epoch_to_start: config.max_epoch_to_start,
            last_epoch: None,
            last_decided: None,
            factory: EpochFactory::new(config, process),
        }
    }

    /// Last epoch started (or refused by the start cutoff)
    pub fn last_epoch(&self) -> Option<Epoch> {
        self.last_epoch
    }

    pub fn last_decided(&self) -> Option<Epoch> {
        self.last_decided
    }

    /// Started epochs not decided yet
    pub fn active_epochs(&self) -> u64 {
        successor(self.last_epoch).saturating_sub(successor(self.last_decided))
    }

    /// No slot left for another epoch until one is decided
    pub fn is_full(&self) -> bool {
        self.active_epochs() >= self.slots.len() as u64
    }

    fn index(&self, epoch: Epoch) -> usize {
        (epoch % self.slots.len() as u64) as usize
    }

    /// Started and not decided
    fn is_live(&self, epoch: Epoch) -> bool {
        epoch >= successor(self.last_decided) && Some(epoch) <= self.last_epoch
    }

    /// Start the epoch after `last_epoch` with the certificates carried over.
    ///
    /// Returns `false` when the window is full or the start cutoff is reached.
    pub fn start_new_epoch(
        &mut self,
        process: &mut dyn Process,
        valid: Option<Certificate>,
        locked: Option<Certificate>,
    ) -> bool {
        if self.is_full() {
            warn!(
                active = self.active_epochs(),
                max_active_epochs = self.slots.len(),
                "epoch window is full, not starting a new epoch"
            );
            return false;
        }
        let epoch = successor(self.last_epoch);
        self.last_epoch = Some(epoch);
        if self.max_epoch_to_start > 0 && epoch >= self.max_epoch_to_start {
            info!(
                epoch,
                max_epoch_to_start = self.max_epoch_to_start,
                "not starting epoch"
            );
            return false;
        }

        let index = self.index(epoch);
        let factory = &self.factory;
        let slot = &mut self.slots[index];
        if slot.as_ref().map(|instance| instance.epoch()) != Some(epoch) {
            *slot = Some(factory.create(epoch));
        }
        if let Some(instance) = slot.as_mut() {
            instance.start(process, valid, locked);
        }
        info!(epoch, process = process.id(), "epoch started");
        metrics::record_epoch_started(epoch);
        true
    }

    /// Close every live epoch up to `epoch` after a decision in `epoch`.
    ///
    /// Returns `false` if `epoch` was already covered by an earlier decision.
    pub fn finish_epoch(&mut self, epoch: Epoch) -> bool {
        if Some(epoch) <= self.last_decided {
            return false;
        }
        for closed in successor(self.last_decided)..=epoch {
            let index = self.index(closed);
            if let Some(instance) = self.slots[index].as_mut() {
                if instance.epoch() == closed {
                    instance.stop();
                }
            }
        }
        self.last_decided = Some(epoch);
        true
    }

    /// Instance for `epoch`, created unstarted if its slot is free or stale.
    ///
    /// Returns `None` when the slot holds a newer epoch, or a live epoch
    /// that `epoch` would evict.
    pub fn get_consensus_epoch(&mut self, epoch: Epoch) -> Option<&mut Box<dyn EpochProtocol>> {
        let index = self.index(epoch);
        let occupant = self.slots[index].as_ref().map(|instance| instance.epoch());
        match occupant {
            Some(current) if current == epoch => {}
            Some(current) if current > epoch || self.is_live(current) => {
                trace!(epoch, occupant = current, "slot taken, message dropped");
                return None;
            }
            _ => self.slots[index] = Some(self.factory.create(epoch)),
        }
        self.slots[index].as_mut()
    }

    /// Existing instance for `epoch`, never creating one
    pub fn instance_mut(&mut self, epoch: Epoch) -> Option<&mut Box<dyn EpochProtocol>> {
        let index = self.index(epoch);
        self.slots[index]
            .as_mut()
            .filter(|instance| instance.epoch() == epoch)
    }

    pub fn instance(&self, epoch: Epoch) -> Option<&dyn EpochProtocol> {
        self.slots[self.index(epoch)]
            .as_deref()
            .filter(|instance| instance.epoch() == epoch)
    }
}
