//! Fundamental types for the tally voting client.
//!
//! This crate defines the types shared across every other crate in the
//! workspace: the acting identity, the candidate projection, and the
//! snapshot the synchronization engine publishes.

pub mod candidate;
pub mod identity;
pub mod snapshot;

pub use candidate::Candidate;
pub use identity::Identity;
pub use snapshot::{ConnectionState, Snapshot};
