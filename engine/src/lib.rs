//! Synchronization engine for the tally client.
//!
//! The engine owns the local snapshot of ledger state {admin, roster,
//! remaining time}, keeps it fresh via a 1-second poll and targeted refresh
//! triggers, and mediates user intents (add candidate, start voting, cast a
//! vote) against the ledger: issue the write, await settlement, then re-sync
//! the affected slice of the snapshot.
//!
//! Concurrency model: writes are strictly serialized (a second intent while
//! one is in flight is rejected with [`EngineError::Busy`]); reads flow
//! through a single refresh queue and are applied wholesale, so consumers
//! never observe a partially-fetched roster.

pub mod engine;
pub mod error;
pub mod refresh;

pub use engine::{EngineConfig, SyncEngine};
pub use error::EngineError;
pub use refresh::RefreshKind;
