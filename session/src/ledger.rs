//! The ledger call surface.
//!
//! Reads are independent round-trips; nothing guarantees two reads observe
//! the same ledger height. Writes return a [`WriteHandle`] and are not
//! applied until [`Ledger::await_settlement`] returns `Ok`.

use async_trait::async_trait;

use tally_types::{Candidate, Identity};

use crate::error::SessionError;

/// Pending-request token returned by the write operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteHandle {
    /// Ledger-assigned ticket identifying the pending request.
    pub ticket: String,
}

impl WriteHandle {
    pub fn new(ticket: impl Into<String>) -> Self {
        Self {
            ticket: ticket.into(),
        }
    }
}

/// Remote operations of an open ledger session.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The ledger-reported admin identity.
    async fn admin(&self) -> Result<Identity, SessionError>;

    /// Number of registered candidates.
    async fn candidates_count(&self) -> Result<u64, SessionError>;

    /// The candidate at `index` (0-based, ledger ordering).
    async fn candidate(&self, index: u64) -> Result<Candidate, SessionError>;

    /// Seconds left in the voting window.
    async fn remaining_time(&self) -> Result<u64, SessionError>;

    /// Register a candidate (admin-only per ledger policy).
    async fn add_candidate(&self, name: &str) -> Result<WriteHandle, SessionError>;

    /// Open a voting window (admin-only per ledger policy).
    async fn start_voting(&self, duration_minutes: u64) -> Result<WriteHandle, SessionError>;

    /// Cast a vote for `candidate_id`. The ledger is authoritative on
    /// validity; unknown ids are forwarded, not pre-checked.
    async fn cast_vote(&self, candidate_id: u64) -> Result<WriteHandle, SessionError>;

    /// Wait until the ledger durably accepts the write, or reports rejection.
    async fn await_settlement(&self, handle: &WriteHandle) -> Result<(), SessionError>;
}

/// Opens sessions bound to one identity and one endpoint.
///
/// The engine keeps exactly one session live at a time and calls `open`
/// again whenever the acting identity changes.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    type Session: Ledger + Send + Sync + 'static;

    async fn open(&self, identity: &Identity) -> Result<Self::Session, SessionError>;
}
