//! Session configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SessionError;

/// Configuration for the ledger session.
///
/// Can be loaded from a TOML file via [`SessionConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field except the endpoint
/// has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the ledger endpoint, e.g. `http://127.0.0.1:8545`.
    #[serde(default)]
    pub endpoint: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Interval between settlement-status polls, in milliseconds.
    #[serde(default = "default_settlement_poll")]
    pub settlement_poll_ms: u64,

    /// Give up waiting for settlement after this many seconds.
    #[serde(default = "default_settlement_timeout")]
    pub settlement_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_settlement_poll() -> u64 {
    500
}

fn default_settlement_timeout() -> u64 {
    120
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            settlement_poll_ms: default_settlement_poll(),
            settlement_timeout_secs: default_settlement_timeout(),
        }
    }
}

impl SessionConfig {
    /// A config pointing at `endpoint` with all defaults.
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, SessionError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Open(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| SessionError::Open(format!("failed to parse {}: {e}", path.display())))
    }

    /// Check that the endpoint is present and plausibly a URL.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.endpoint.is_empty() {
            return Err(SessionError::Open("no ledger endpoint configured".into()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(SessionError::Open(format!(
                "malformed ledger endpoint: {}",
                self.endpoint
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: SessionConfig =
            toml::from_str(r#"endpoint = "http://127.0.0.1:8545""#).expect("parse");
        assert_eq!(config.endpoint, "http://127.0.0.1:8545");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.settlement_poll_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_endpoint_fails_validation() {
        let config = SessionConfig::default();
        assert!(matches!(config.validate(), Err(SessionError::Open(_))));
    }

    #[test]
    fn malformed_endpoint_fails_validation() {
        let config = SessionConfig::for_endpoint("ledger.example.com");
        assert!(matches!(config.validate(), Err(SessionError::Open(_))));
    }

    #[test]
    fn loads_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "endpoint = \"https://ledger.example\"").expect("write");
        writeln!(file, "settlement_timeout_secs = 10").expect("write");

        let config = SessionConfig::from_toml_file(file.path()).expect("load");
        assert_eq!(config.endpoint, "https://ledger.example");
        assert_eq!(config.settlement_timeout_secs, 10);
        assert_eq!(config.connect_timeout_secs, 10);
    }
}
