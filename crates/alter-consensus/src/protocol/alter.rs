//! AlterBFT epoch state machine
//!
//! ```text
//!   Inactive ──start──► Ready ──Ce(Bk)──────────► Locked ──timeout──► Commit ──► Finished
//!                         │                          │                             ▲
//!                         └──Ce(SILENCE)/equiv──► EpochChange ──Ce(Bk)/timeout─────┘
//! ```
//!
//! A process votes at most once per epoch, for the single proposal it saw,
//! and only if the proposal's certificate ranks at least as high as the lock
//! it started the epoch with. A block certificate locks the process; it
//! decides the locked block once the equivocation timeout expires without
//! evidence that the proposer signed two blocks.

use super::policy::EpochPolicy;
use crate::domain::{
    ranks_higher_or_equal, Block, BlockId, Certificate, CertificateKind, CertificateSet, Epoch,
    Height, Message, ProcessId, Proposal, ProposalSet, QuitEpoch, Signature, Silence, Timeout,
    TimeoutKind, Vote, MIN_HEIGHT,
};
use crate::ports::{EpochProtocol, Process};
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

/// Phase of one epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Not started; messages are buffered
    Inactive,
    /// Waiting for a proposal or a certificate
    Ready,
    /// Holding a block certificate of this epoch
    Locked,
    /// Silence certificate or equivocation observed
    EpochChange,
    /// Decided, waiting for the decided proposal
    Commit,
    /// Terminal
    Finished,
}

/// One AlterBFT epoch
pub struct AlterBft {
    epoch: Epoch,
    policy: EpochPolicy,
    phase: Phase,

    pending: VecDeque<Message>,
    pending_limit: usize,

    valid: Option<Certificate>,
    locked: Option<Certificate>,
    initial_locked: Option<Certificate>,

    proposals: ProposalSet,
    votes: CertificateSet,
    silence: Certificate,

    has_voted: bool,
    equivocation_detected: bool,
    decision: Option<(Height, BlockId)>,
    scheduled: [bool; TimeoutKind::COUNT],
    /// Requests the scheduler refused, asked again on the next message
    rejected: [bool; TimeoutKind::COUNT],
}

impl AlterBft {
    pub fn new(epoch: Epoch, policy: EpochPolicy, pending_limit: usize) -> Self {
        Self {
            epoch,
            policy,
            phase: Phase::Inactive,
            pending: VecDeque::new(),
            pending_limit,
            valid: None,
            locked: None,
            initial_locked: None,
            proposals: ProposalSet::new(),
            votes: CertificateSet::new(),
            silence: Certificate::silence(epoch),
            has_voted: false,
            equivocation_detected: false,
            decision: None,
            scheduled: [false; TimeoutKind::COUNT],
            rejected: [false; TimeoutKind::COUNT],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn policy(&self) -> EpochPolicy {
        self.policy
    }

    pub fn valid_certificate(&self) -> Option<&Certificate> {
        self.valid.as_ref()
    }

    pub fn locked_certificate(&self) -> Option<&Certificate> {
        self.locked.as_ref()
    }

    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    pub fn proposals(&self) -> &ProposalSet {
        &self.proposals
    }

    /// Block id decided in this epoch, if any
    pub fn decision(&self) -> Option<BlockId> {
        self.decision.map(|(_, id)| id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn is_proposer(&self, process: &dyn Process) -> bool {
        process.proposer(self.epoch) == process.id()
    }

    // ---------------------------------------------------------------------
    // Proposals
    // ---------------------------------------------------------------------

    fn process_proposal(&mut self, process: &mut dyn Process, proposal: Proposal) {
        let block_id = proposal.block.id();
        if self.proposals.contains(&block_id) {
            return;
        }
        if !Self::is_valid_proposal(process, &proposal) {
            debug!(
                epoch = self.epoch,
                sender = proposal.sender,
                block = %block_id,
                "invalid proposal dropped"
            );
            return;
        }
        if !process.add_block(&proposal.block) {
            debug!(
                epoch = self.epoch,
                process = process.id(),
                height = proposal.block.height(),
                block = %block_id,
                "proposal could not be added to the blockchain"
            );
            return;
        }
        if proposal.epoch == self.epoch {
            self.proposals.add(proposal.clone());
        }
        self.try_to_vote(process, &proposal);
        self.try_to_commit(process);
    }

    /// Sent by the epoch's proposer and justified by a block quorum from an
    /// earlier epoch that names the block's parent (none for genesis)
    fn is_valid_proposal(process: &dyn Process, proposal: &Proposal) -> bool {
        let from_proposer = proposal.sender == process.proposer(proposal.epoch);
        let justified = match &proposal.certificate {
            None => proposal.block.height() == MIN_HEIGHT,
            Some(certificate) => {
                certificate.kind() == CertificateKind::Block
                    && certificate.has_quorum(process.num_processes())
                    && certificate.epoch() < proposal.epoch
                    && certificate.block_id().is_some()
                    && proposal.block.prev_block_id() == certificate.block_id()
                    && proposal.block.height() == certificate.height() + 1
            }
        };
        from_proposer && justified
    }

    fn try_to_vote(&mut self, process: &mut dyn Process, received: &Proposal) {
        if !self.policy.is_honest() {
            // Byzantine processes vote for whatever they see and follow the
            // highest certificate proposed to them.
            self.vote_for(process, received);
            if ranks_higher_or_equal(received.certificate.as_ref(), self.locked.as_ref()) {
                self.locked = received.certificate.clone();
            }
            return;
        }

        if self.has_voted || self.is_proposer(process) || self.phase != Phase::Ready {
            return;
        }
        let Some(proposal) = self.proposals.single().cloned() else {
            return;
        };
        if !ranks_higher_or_equal(proposal.certificate.as_ref(), self.initial_locked.as_ref()) {
            debug!(
                epoch = self.epoch,
                block = %proposal.block.id(),
                "proposal certificate ranks below the lock"
            );
            return;
        }
        if !process.extend_valid_chain(&proposal.block) {
            debug!(
                epoch = self.epoch,
                block = %proposal.block.id(),
                "proposal does not extend the committed chain"
            );
            return;
        }
        self.vote_for(process, &proposal);
    }

    /// Relay the proposal and the proposer's implicit vote, then vote
    fn vote_for(&mut self, process: &mut dyn Process, proposal: &Proposal) {
        let me = process.id();
        let block_id = proposal.block.id();
        let height = proposal.block.height();
        debug!(epoch = self.epoch, process = me, height, block = %block_id, "voting");

        let mut relayed = proposal.clone();
        relayed.sender_fwd = me;
        process.forward(Message::Propose(relayed));

        let proposer_vote = Vote {
            epoch: proposal.epoch,
            height,
            block_id,
            sender: proposal.sender,
            signature: proposal.signature,
            sender2: proposal.sender,
            signature2: Some(proposal.signature),
        };
        self.process_vote(process, proposer_vote.clone());
        process.forward(Message::Vote(proposer_vote));

        process.broadcast(Message::Vote(Vote {
            epoch: self.epoch,
            height,
            block_id,
            sender: me,
            signature: Signature::EMPTY,
            sender2: proposal.sender,
            signature2: Some(proposal.signature),
        }));
        self.has_voted = true;
    }

    // ---------------------------------------------------------------------
    // Votes
    // ---------------------------------------------------------------------

    fn process_vote(&mut self, process: &mut dyn Process, vote: Vote) {
        if self.phase == Phase::Commit {
            return;
        }
        if vote.epoch != self.epoch {
            trace!(
                epoch = self.epoch,
                vote_epoch = vote.epoch,
                "vote for another epoch"
            );
            return;
        }

        let proposer = process.proposer(self.epoch);
        let certificate = self
            .votes
            .get_or_create(self.epoch, vote.block_id, vote.height);
        let carried = match vote.signature2 {
            Some(signature2) if vote.sender2 == proposer => {
                certificate.add_signature(proposer, signature2)
            }
            _ => false,
        };
        let added = certificate.add_signature(vote.sender, vote.signature);
        if !added && !carried {
            return;
        }
        let count = certificate.signature_count();
        let quorum = certificate
            .has_quorum(process.num_processes())
            .then(|| certificate.clone());

        if carried || vote.sender == proposer {
            self.check_equivocation(process);
        }
        if let Some(certificate) = quorum {
            self.on_block_certificate(process, certificate);
        }
        if self.policy.fast_path
            && count == process.num_processes()
            && self.phase == Phase::Locked
        {
            debug!(epoch = self.epoch, "every process voted, deciding");
            self.decide_locked(process);
        }
    }

    /// Two certificates carrying the proposer's signature prove it signed two
    /// different blocks in this epoch.
    fn check_equivocation(&mut self, process: &mut dyn Process) {
        if self.equivocation_detected {
            return;
        }
        let proposer = process.proposer(self.epoch);
        let signed = self.votes.signed_by(proposer);
        if signed.len() < 2 {
            return;
        }
        let evidence: Vec<Message> = signed
            .iter()
            .filter_map(|certificate| certificate.reconstruct_message(proposer))
            .collect();
        self.equivocation_detected = true;
        warn!(
            epoch = self.epoch,
            proposer,
            phase = ?self.phase,
            "proposer equivocation detected"
        );

        match self.phase {
            Phase::Ready => {
                self.phase = Phase::EpochChange;
                self.schedule_timeout(process, TimeoutKind::QuitEpoch);
            }
            Phase::Locked => {
                info!(epoch = self.epoch, "locked, no decision: equivocation");
                self.phase = Phase::Finished;
            }
            _ => {}
        }

        if self.policy.is_honest() {
            for message in evidence {
                process.forward(message);
            }
        }
    }

    fn on_block_certificate(&mut self, process: &mut dyn Process, certificate: Certificate) {
        if matches!(self.phase, Phase::Locked | Phase::Commit | Phase::Finished) {
            return;
        }
        self.valid = Some(certificate.clone());
        match self.phase {
            Phase::Ready => {
                self.phase = Phase::Locked;
                self.locked = Some(certificate.clone());
                self.schedule_timeout(process, TimeoutKind::Equivocation);
            }
            Phase::EpochChange => {
                info!(epoch = self.epoch, "no lock, block certificate: finishing");
                if !self.policy.is_honest() {
                    self.locked = Some(certificate.clone());
                }
                self.phase = Phase::Finished;
            }
            _ => {}
        }
        debug!(
            epoch = self.epoch,
            height = certificate.height(),
            block = ?certificate.block_id(),
            "block certificate"
        );
        process.broadcast(Message::QuitEpoch(QuitEpoch { certificate }));
        process.finish(self.epoch, self.valid.clone(), self.locked.clone());
    }

    // ---------------------------------------------------------------------
    // Silence and quit-epoch
    // ---------------------------------------------------------------------

    fn process_silence(&mut self, process: &mut dyn Process, silence: Silence) {
        if !matches!(self.phase, Phase::Ready | Phase::Locked) || silence.epoch != self.epoch {
            return;
        }
        if !self.silence.add_signature(silence.sender, silence.signature) {
            return;
        }
        if self.silence.has_quorum(process.num_processes()) {
            self.on_silence_certificate(process);
        }
    }

    fn on_silence_certificate(&mut self, process: &mut dyn Process) {
        match self.phase {
            Phase::Ready => {
                debug!(epoch = self.epoch, "silence certificate, changing epoch");
                self.phase = Phase::EpochChange;
                process.broadcast(Message::QuitEpoch(QuitEpoch {
                    certificate: self.silence.clone(),
                }));
                self.schedule_timeout(process, TimeoutKind::QuitEpoch);
            }
            Phase::Locked => {
                info!(epoch = self.epoch, "locked, no decision: silence");
                self.phase = Phase::Finished;
            }
            _ => {}
        }
    }

    fn process_quit_epoch(&mut self, process: &mut dyn Process, quit: QuitEpoch) {
        if quit.certificate.epoch() != self.epoch {
            trace!(
                epoch = self.epoch,
                certificate_epoch = quit.certificate.epoch(),
                "quit-epoch for another epoch"
            );
            return;
        }
        for message in quit.certificate.reconstruct_messages() {
            self.process_message(process, message);
        }
    }

    // ---------------------------------------------------------------------
    // Timeouts and decisions
    // ---------------------------------------------------------------------

    fn schedule_timeout(&mut self, process: &mut dyn Process, kind: TimeoutKind) {
        if self.scheduled[kind.index()] {
            return;
        }
        let duration = match kind {
            TimeoutKind::Propose => process.timeout_propose(self.epoch),
            TimeoutKind::Equivocation => process.timeout_equivocation(self.epoch),
            TimeoutKind::QuitEpoch => process.timeout_quit_epoch(self.epoch),
            TimeoutKind::EpochChange => process.timeout_epoch_change(self.epoch),
        };
        let accepted = process.schedule(Timeout::new(self.epoch, kind, duration));
        self.scheduled[kind.index()] = accepted;
        self.rejected[kind.index()] = !accepted;
        if !accepted {
            debug!(
                epoch = self.epoch,
                kind = kind.name(),
                "timeout not scheduled, will retry"
            );
        }
    }

    fn retry_rejected_timeouts(&mut self, process: &mut dyn Process) {
        for kind in TimeoutKind::ALL {
            if self.rejected[kind.index()] {
                self.schedule_timeout(process, kind);
            }
        }
    }

    fn decide_locked(&mut self, process: &mut dyn Process) {
        let Some(locked) = &self.locked else {
            return;
        };
        let Some(block_id) = locked.block_id() else {
            return;
        };
        self.decision = Some((locked.height(), block_id));
        self.phase = Phase::Commit;
        self.try_to_commit(process);
    }

    fn try_to_commit(&mut self, process: &mut dyn Process) {
        if self.phase != Phase::Commit {
            return;
        }
        let Some((height, block_id)) = self.decision else {
            return;
        };
        let Some(proposal) = self.proposals.get(&block_id) else {
            debug!(epoch = self.epoch, height, block = %block_id, "decided block not received yet");
            return;
        };
        if !process.extend_valid_chain(&proposal.block) {
            return;
        }
        let block = proposal.block.clone();
        info!(epoch = self.epoch, height, block = %block_id, "decided");
        self.phase = Phase::Finished;
        process.decide(self.epoch, block);
    }

    // ---------------------------------------------------------------------
    // Proposer actions
    // ---------------------------------------------------------------------

    fn next_block(parent: Option<&Certificate>, value: Vec<u8>) -> Block {
        match parent.and_then(|c| c.block_id().map(|id| (c.height(), id))) {
            Some((height, block_id)) => Block::new(height + 1, value, Some(block_id)),
            None => Block::genesis(value),
        }
    }

    fn proposal(
        &self,
        process: &dyn Process,
        block: Block,
        parent: Option<&Certificate>,
    ) -> Proposal {
        Proposal {
            epoch: self.epoch,
            block,
            certificate: parent.cloned(),
            sender: process.id(),
            sender_fwd: process.id(),
            signature: Signature::EMPTY,
        }
    }

    fn broadcast_proposal(&mut self, process: &mut dyn Process) {
        let Some(value) = process.get_value() else {
            warn!(epoch = self.epoch, "no value to propose");
            return;
        };
        let block = Self::next_block(self.valid.as_ref(), value);
        debug!(
            epoch = self.epoch,
            height = block.height(),
            block = %block.id(),
            "proposing"
        );
        let proposal = self.proposal(process, block, self.valid.as_ref());
        process.broadcast(Message::Propose(proposal));
    }

    /// Send one block to ids `[0, N/2)` and a conflicting one to `[N/2, N)`
    fn send_split_proposals(&mut self, process: &mut dyn Process) {
        let (Some(first), Some(second)) = (process.get_value(), process.get_value()) else {
            warn!(epoch = self.epoch, "no value to propose");
            return;
        };
        let parent = self.locked.clone();
        let first = Self::next_block(parent.as_ref(), first);
        let second = Self::next_block(parent.as_ref(), second);
        debug!(
            epoch = self.epoch,
            height = first.height(),
            first = %first.id(),
            second = %second.id(),
            "sending conflicting proposals"
        );

        let n = process.num_processes() as ProcessId;
        let first_half: Vec<ProcessId> = (0..n / 2).collect();
        let second_half: Vec<ProcessId> = (n / 2..n).collect();
        let first = self.proposal(process, first, parent.as_ref());
        let second = self.proposal(process, second, parent.as_ref());
        process.send(Message::Propose(first), &first_half);
        process.send(Message::Propose(second), &second_half);
    }

    fn start_as_proposer(&mut self, process: &mut dyn Process) {
        if !self.policy.splits_proposals() {
            self.broadcast_proposal(process);
            return;
        }
        let follows_lock = self
            .locked
            .as_ref()
            .is_some_and(|locked| locked.epoch() + 1 == self.epoch);
        if self.epoch == 0 || follows_lock {
            self.send_split_proposals(process);
        } else {
            self.schedule_timeout(process, TimeoutKind::EpochChange);
        }
    }
}

impl EpochProtocol for AlterBft {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn started(&self) -> bool {
        self.phase != Phase::Inactive
    }

    fn finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    fn start(
        &mut self,
        process: &mut dyn Process,
        valid: Option<Certificate>,
        locked: Option<Certificate>,
    ) {
        if self.started() {
            warn!(epoch = self.epoch, "epoch already started");
            return;
        }
        self.valid = valid;
        self.initial_locked = locked.clone();
        self.locked = locked;
        self.phase = Phase::Ready;

        if self.policy.is_inert() {
            self.pending.clear();
            return;
        }
        if self.is_proposer(process) {
            self.start_as_proposer(process);
        } else {
            self.schedule_timeout(process, TimeoutKind::Propose);
        }

        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            trace!(
                epoch = self.epoch,
                count = pending.len(),
                "replaying buffered messages"
            );
        }
        for message in pending {
            self.process_message(process, message);
        }
    }

    fn stop(&mut self) {
        self.phase = Phase::Finished;
    }

    fn process_message(&mut self, process: &mut dyn Process, message: Message) {
        match self.phase {
            Phase::Inactive => {
                if self.pending.len() >= self.pending_limit {
                    warn!(
                        epoch = self.epoch,
                        limit = self.pending_limit,
                        "pending buffer full, message dropped"
                    );
                    return;
                }
                self.pending.push_back(message);
                return;
            }
            Phase::Finished => return,
            _ => {}
        }
        if self.policy.is_inert() {
            return;
        }
        self.retry_rejected_timeouts(process);
        match message {
            Message::Propose(proposal) => self.process_proposal(process, proposal),
            Message::Silence(silence) => self.process_silence(process, silence),
            Message::Vote(vote) => self.process_vote(process, vote),
            Message::QuitEpoch(quit) => self.process_quit_epoch(process, quit),
            other => trace!(
                epoch = self.epoch,
                kind = other.message_type().name(),
                "message ignored"
            ),
        }
    }

    fn process_timeout(&mut self, process: &mut dyn Process, timeout: Timeout) {
        if matches!(self.phase, Phase::Inactive | Phase::Finished)
            || self.policy.is_inert()
            || timeout.epoch != self.epoch
        {
            return;
        }
        self.scheduled[timeout.kind.index()] = false;
        trace!(epoch = self.epoch, kind = timeout.kind.name(), phase = ?self.phase, "timeout");

        match timeout.kind {
            TimeoutKind::Propose => {
                if self.phase == Phase::Ready && !self.has_voted && self.policy.is_honest() {
                    debug!(epoch = self.epoch, "proposer silent, blaming");
                    process.broadcast(Message::Silence(Silence {
                        epoch: self.epoch,
                        sender: process.id(),
                        signature: Signature::EMPTY,
                    }));
                }
            }
            TimeoutKind::Equivocation => {
                if self.phase == Phase::Locked {
                    self.decide_locked(process);
                }
            }
            TimeoutKind::QuitEpoch => {
                if self.phase == Phase::EpochChange {
                    info!(epoch = self.epoch, "no lock, no decision");
                    self.phase = Phase::Finished;
                    process.finish(self.epoch, self.valid.clone(), self.locked.clone());
                }
            }
            TimeoutKind::EpochChange => {
                if self.policy.splits_proposals() && self.is_proposer(process) {
                    self.send_split_proposals(process);
                }
            }
        }
    }
}
