//! Replica service
//!
//! [`Replica`] drives one process: it owns the [`EpochWindow`] and the
//! blockchain, lends its context to epoch instances and applies their
//! decisions and completions.

mod replica;
mod window;


pub use replica::{Replica, ReplicaContext, ReplicaDeps};
pub use window::EpochWindow;
