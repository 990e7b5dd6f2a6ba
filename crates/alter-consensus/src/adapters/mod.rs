//! Adapters layer (Hexagonal Architecture)
//!
//! In-process implementations of the outbound ports: transport, application,
//! ed25519 signing and inbound signature verification.

mod application;
mod crypto;
mod network;
mod verifier;

pub use application::*;
pub use crypto::*;
pub use network::*;
pub use verifier::*;
