//! Read-only candidate projection.

use serde::{Deserialize, Serialize};

/// A candidate as reported by the ledger.
///
/// This is a cached projection: vote counts are only ever replaced by
/// re-fetching from the ledger, never adjusted by local arithmetic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Ledger-assigned candidate id, unique within the roster.
    pub id: u64,
    /// Candidate display name, non-empty.
    pub name: String,
    /// Current vote tally as of the last refresh.
    pub vote_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names() {
        let json = r#"{"id":3,"name":"Alice","vote_count":12}"#;
        let candidate: Candidate = serde_json::from_str(json).expect("decode");
        assert_eq!(candidate.id, 3);
        assert_eq!(candidate.name, "Alice");
        assert_eq!(candidate.vote_count, 12);
    }
}
