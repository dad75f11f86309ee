//! HTTP JSON-RPC implementation of the ledger session.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use tally_types::{Candidate, Identity};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::ledger::{Ledger, LedgerConnector, WriteHandle};

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AdminResult {
    admin: String,
}

#[derive(Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Deserialize)]
struct RemainingTimeResult {
    seconds: u64,
}

#[derive(Deserialize)]
struct WriteResult {
    ticket: String,
}

#[derive(Deserialize)]
struct StatusResult {
    status: String,
    reason: Option<String>,
}

// ── LedgerClient ────────────────────────────────────────────────────────

/// An open session against one ledger endpoint, bound to one identity.
///
/// Wraps `reqwest::Client` with the endpoint base URL and provides typed
/// methods for each action the client needs. Requests carry the bound
/// account; the ledger enforces what that account may do.
#[derive(Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    endpoint: String,
    account: Identity,
    settlement_poll: Duration,
    settlement_timeout: Duration,
}

impl LedgerClient {
    fn new(config: &SessionConfig, account: Identity) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| SessionError::Open(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            account,
            settlement_poll: Duration::from_millis(config.settlement_poll_ms),
            settlement_timeout: Duration::from_secs(config.settlement_timeout_secs),
        })
    }

    /// The identity this session is bound to.
    pub fn account(&self) -> &Identity {
        &self.account
    }

    /// Send an action request and return the `result` field.
    ///
    /// Transport failures map to [`SessionError::Transient`]; a ledger-side
    /// `error` field is the ledger's authoritative answer and maps to
    /// [`SessionError::Rejected`].
    async fn rpc_call(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, SessionError> {
        let mut body = params;
        body.as_object_mut()
            .ok_or_else(|| SessionError::Transient("params must be a JSON object".into()))?
            .insert("action".to_string(), serde_json::json!(action));

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::Transient(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(SessionError::Transient(format!(
                "ledger returned HTTP {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SessionError::Transient(format!("invalid JSON response: {e}")))?;

        if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
            return Err(SessionError::Rejected(err.to_string()));
        }

        Ok(json.get("result").cloned().unwrap_or(json))
    }

    fn decode<T: serde::de::DeserializeOwned>(
        action: &str,
        value: serde_json::Value,
    ) -> Result<T, SessionError> {
        serde_json::from_value(value)
            .map_err(|e| SessionError::Transient(format!("invalid {action} response: {e}")))
    }
}

#[async_trait]
impl Ledger for LedgerClient {
    async fn admin(&self) -> Result<Identity, SessionError> {
        let result = self.rpc_call("admin", serde_json::json!({})).await?;
        let resp: AdminResult = Self::decode("admin", result)?;
        Ok(Identity::new(resp.admin))
    }

    async fn candidates_count(&self) -> Result<u64, SessionError> {
        let result = self
            .rpc_call("candidates_count", serde_json::json!({}))
            .await?;
        let resp: CountResult = Self::decode("candidates_count", result)?;
        Ok(resp.count)
    }

    async fn candidate(&self, index: u64) -> Result<Candidate, SessionError> {
        let result = self
            .rpc_call("candidate", serde_json::json!({ "index": index }))
            .await?;
        Self::decode("candidate", result)
    }

    async fn remaining_time(&self) -> Result<u64, SessionError> {
        let result = self
            .rpc_call("remaining_time", serde_json::json!({}))
            .await?;
        let resp: RemainingTimeResult = Self::decode("remaining_time", result)?;
        Ok(resp.seconds)
    }

    async fn add_candidate(&self, name: &str) -> Result<WriteHandle, SessionError> {
        let result = self
            .rpc_call(
                "add_candidate",
                serde_json::json!({ "name": name, "account": self.account.as_str() }),
            )
            .await?;
        let resp: WriteResult = Self::decode("add_candidate", result)?;
        Ok(WriteHandle::new(resp.ticket))
    }

    async fn start_voting(&self, duration_minutes: u64) -> Result<WriteHandle, SessionError> {
        let result = self
            .rpc_call(
                "start_voting",
                serde_json::json!({
                    "duration_minutes": duration_minutes,
                    "account": self.account.as_str(),
                }),
            )
            .await?;
        let resp: WriteResult = Self::decode("start_voting", result)?;
        Ok(WriteHandle::new(resp.ticket))
    }

    async fn cast_vote(&self, candidate_id: u64) -> Result<WriteHandle, SessionError> {
        let result = self
            .rpc_call(
                "cast_vote",
                serde_json::json!({
                    "candidate_id": candidate_id,
                    "account": self.account.as_str(),
                }),
            )
            .await?;
        let resp: WriteResult = Self::decode("cast_vote", result)?;
        Ok(WriteHandle::new(resp.ticket))
    }

    async fn await_settlement(&self, handle: &WriteHandle) -> Result<(), SessionError> {
        let deadline = tokio::time::Instant::now() + self.settlement_timeout;

        loop {
            let status = self
                .rpc_call(
                    "request_status",
                    serde_json::json!({ "ticket": handle.ticket }),
                )
                .await
                .and_then(|v| Self::decode::<StatusResult>("request_status", v));

            match status {
                Ok(resp) => match resp.status.as_str() {
                    "settled" => return Ok(()),
                    "rejected" => {
                        return Err(SessionError::Rejected(
                            resp.reason.unwrap_or_else(|| "request rejected".into()),
                        ))
                    }
                    _ => {}
                },
                // A rejected status poll is final; a transient one is not —
                // the write may still settle, so keep polling until the
                // deadline.
                Err(e @ SessionError::Rejected(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!("settlement poll failed: {e}");
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::Transient(format!(
                    "settlement not observed within {}s (ticket {})",
                    self.settlement_timeout.as_secs(),
                    handle.ticket
                )));
            }
            tokio::time::sleep(self.settlement_poll).await;
        }
    }
}

// ── LedgerEndpoint ──────────────────────────────────────────────────────

/// Connector that opens [`LedgerClient`] sessions against a configured
/// endpoint.
#[derive(Clone)]
pub struct LedgerEndpoint {
    config: SessionConfig,
}

impl LedgerEndpoint {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LedgerConnector for LedgerEndpoint {
    type Session = LedgerClient;

    async fn open(&self, identity: &Identity) -> Result<LedgerClient, SessionError> {
        self.config.validate()?;
        let client = LedgerClient::new(&self.config, identity.clone())?;

        // Handshake: the endpoint may refuse the signing capability.
        match client
            .rpc_call(
                "session_open",
                serde_json::json!({ "account": identity.as_str() }),
            )
            .await
        {
            Ok(_) => Ok(client),
            Err(SessionError::Rejected(reason)) => Err(SessionError::Open(format!(
                "endpoint refused session: {reason}"
            ))),
            Err(e) => Err(e),
        }
    }
}
