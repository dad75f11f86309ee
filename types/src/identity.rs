//! The acting party's address-like credential.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// An opaque identity token as reported by the host environment.
///
/// The ledger compares identities case-insensitively (the source of truth is
/// an address in mixed-case or lowercased hex depending on who reports it),
/// so equality and hashing here are case-insensitive over ASCII.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from a raw string token.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Return the raw token as reported by the host.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty (no identity available).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(id: &Identity) -> u64 {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_ignores_case() {
        let a = Identity::new("0xAbCdEf");
        let b = Identity::new("0xabcdef");
        assert_eq!(a, b);
        assert_ne!(a, Identity::new("0xabcde0"));
    }

    #[test]
    fn display_preserves_original_case() {
        let id = Identity::new("0xAbC");
        assert_eq!(id.to_string(), "0xAbC");
    }

    proptest! {
        #[test]
        fn case_folding_preserves_equality_and_hash(raw in "[a-zA-Z0-9]{1,64}") {
            let original = Identity::new(raw.clone());
            let upper = Identity::new(raw.to_ascii_uppercase());
            let lower = Identity::new(raw.to_ascii_lowercase());
            prop_assert_eq!(&original, &upper);
            prop_assert_eq!(&original, &lower);
            prop_assert_eq!(hash_of(&original), hash_of(&upper));
            prop_assert_eq!(hash_of(&original), hash_of(&lower));
        }
    }
}
