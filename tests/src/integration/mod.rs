//! # Integration Scenarios
//!
//! Every scenario checks the same two things: processes that deliver agree
//! on the sequence (safety), and honest processes keep delivering
//! (liveness).

pub mod byzantine;
pub mod liveness;
