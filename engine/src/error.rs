use thiserror::Error;

use tally_identity::IdentityError;
use tally_session::SessionError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Another write is in flight. Writes are never queued; the caller may
    /// simply retry once the current write settles.
    #[error("another request is in flight — try again shortly")]
    Busy,

    /// No live ledger session (engine is uninitialized or degraded).
    #[error("not connected to the ledger")]
    NotConnected,

    /// The intent failed local pre-validation.
    #[error("invalid request: {0}")]
    InvalidIntent(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
