//! Ports layer (Hexagonal Architecture)
//!
//! Inbound: the epoch protocol interface the replica drives.
//! Outbound: the process capabilities an epoch uses, and the transport,
//! application, signing and timer collaborators behind them.

mod inbound;
mod outbound;

pub use inbound::*;
pub use outbound::*;
