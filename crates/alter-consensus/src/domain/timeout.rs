//! Epoch timeouts

use super::Epoch;
use std::time::Duration;

/// Timeout kinds an epoch may schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeoutKind {
    /// Waiting for the proposer's block
    Propose,
    /// Waiting for conflicting votes before deciding the locked block
    Equivocation,
    /// Waiting before leaving an epoch that lost its leader
    QuitEpoch,
    /// Delayed action of an equivocating proposer
    EpochChange,
}

impl TimeoutKind {
    pub const COUNT: usize = 4;

    pub const ALL: [TimeoutKind; Self::COUNT] = [
        TimeoutKind::Propose,
        TimeoutKind::Equivocation,
        TimeoutKind::QuitEpoch,
        TimeoutKind::EpochChange,
    ];

    pub fn index(self) -> usize {
        match self {
            TimeoutKind::Propose => 0,
            TimeoutKind::Equivocation => 1,
            TimeoutKind::QuitEpoch => 2,
            TimeoutKind::EpochChange => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeoutKind::Propose => "propose",
            TimeoutKind::Equivocation => "equivocation",
            TimeoutKind::QuitEpoch => "quit_epoch",
            TimeoutKind::EpochChange => "epoch_change",
        }
    }
}

/// Timeout request; `duration` is relative to when the scheduler sees it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeout {
    pub epoch: Epoch,
    pub kind: TimeoutKind,
    pub duration: Duration,
}

impl Timeout {
    pub fn new(epoch: Epoch, kind: TimeoutKind, duration: Duration) -> Self {
        Self {
            epoch,
            kind,
            duration,
        }
    }
}
