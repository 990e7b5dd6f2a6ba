//! Driving ports (Inbound API)

use super::Process;
use crate::domain::{Certificate, Epoch, Message, Timeout};

/// One epoch of consensus.
///
/// An instance is created lazily, started at most once and afterwards only
/// reacts to messages and timeouts addressed to its epoch. The process is
/// lent on every call; the instance never holds on to it.
pub trait EpochProtocol: Send {
    fn epoch(&self) -> Epoch;

    /// Whether [`EpochProtocol::start`] has been called
    fn started(&self) -> bool;

    /// Whether the epoch reached its terminal phase
    fn finished(&self) -> bool;

    /// Start the epoch with the certificates carried over from the previous one.
    ///
    /// Messages buffered before the start are replayed, in arrival order,
    /// after the start action.
    fn start(
        &mut self,
        process: &mut dyn Process,
        valid: Option<Certificate>,
        locked: Option<Certificate>,
    );

    /// Move to the terminal phase without further output
    fn stop(&mut self);

    fn process_message(&mut self, process: &mut dyn Process, message: Message);

    fn process_timeout(&mut self, process: &mut dyn Process, timeout: Timeout);
}
