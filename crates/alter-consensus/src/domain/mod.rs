//! Domain layer of the consensus crate
//!
//! Pure data structures and codecs: blocks, certificates, messages,
//! timeouts, configuration and the windowed blockchain.

mod block;
mod blockchain;
mod certificate;
mod config;
mod error;
mod message;
mod sets;
mod timeout;
mod types;
pub(crate) mod wire;

pub use block::*;
pub use blockchain::*;
pub use certificate::*;
pub use config::*;
pub use error::*;
pub use message::*;
pub use sets::*;
pub use timeout::*;
pub use types::*;
