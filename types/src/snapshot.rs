//! The engine-published view of ledger state.

use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::identity::Identity;

/// Where the synchronization engine currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No identity has been observed yet.
    Uninitialized,
    /// A session is being opened and the initial refresh is running.
    Connecting,
    /// Session live, snapshot considered fresh.
    Ready,
    /// A read refresh is in progress.
    Refreshing,
    /// A user-initiated write is in flight.
    Mutating,
    /// Unrecoverable setup failure; requires an explicit reconnect.
    Degraded,
}

impl ConnectionState {
    /// Whether a live session exists in this state.
    pub fn has_session(&self) -> bool {
        matches!(self, Self::Ready | Self::Refreshing | Self::Mutating)
    }

    /// Whether a user intent may be issued in this state.
    pub fn accepts_intents(&self) -> bool {
        matches!(self, Self::Ready | Self::Refreshing)
    }
}

/// Immutable snapshot of ledger-derived state.
///
/// The engine replaces this wholesale between suspension points; consumers
/// only ever observe a fully-published value, never a partial update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The acting identity, if the host reports one.
    pub identity: Option<Identity>,
    /// True iff the acting identity matches the ledger-reported admin.
    pub is_admin: bool,
    /// Candidate roster ordered by id ascending, rebuilt wholesale on refresh.
    pub candidates: Vec<Candidate>,
    /// Seconds left in the voting window as of the last poll.
    pub remaining_seconds: u64,
    /// Engine lifecycle state.
    pub connection: ConnectionState,
}

impl Snapshot {
    /// The empty pre-connection snapshot.
    pub fn empty() -> Self {
        Self {
            identity: None,
            is_admin: false,
            candidates: Vec::new(),
            remaining_seconds: 0,
            connection: ConnectionState::Uninitialized,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
