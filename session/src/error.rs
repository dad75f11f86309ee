use thiserror::Error;

/// Failure modes of talking to the ledger.
///
/// The split matters for callers: only [`SessionError::Transient`] is safe to
/// retry. A [`SessionError::Rejected`] is the ledger's authoritative answer
/// and retrying would just be rejected again.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Endpoint configuration is missing/malformed, or the endpoint refused
    /// the signing capability during the handshake.
    #[error("session open failed: {0}")]
    Open(String),

    /// Network-level failure: connect error, timeout, malformed response.
    #[error("transient ledger I/O error: {0}")]
    Transient(String),

    /// The ledger rejected the request (policy or validity).
    #[error("ledger rejected request: {0}")]
    Rejected(String),
}

impl SessionError {
    /// Whether a user-initiated retry of the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transient(e.to_string())
    }
}
