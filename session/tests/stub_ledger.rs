//! Integration tests for `LedgerClient` against an in-process stub ledger.
//!
//! The stub speaks the same action protocol over HTTP and lets each test
//! script the ledger's behavior: settlement delays, rejections, and refused
//! handshakes.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use tally_session::{Ledger, LedgerConnector, LedgerEndpoint, SessionConfig, SessionError};
use tally_types::Identity;

#[derive(Default)]
struct StubLedger {
    admin: String,
    candidates: Vec<(u64, String, u64)>,
    remaining_seconds: u64,
    refuse_session: bool,
    reject_votes_with: Option<String>,
    /// Ticket counter; also how many status polls report `pending` before
    /// the stub reports `settled`.
    next_ticket: u64,
    pending_polls: u64,
    tickets: std::collections::HashMap<String, TicketState>,
}

enum TicketState {
    Pending { polls_left: u64 },
    Rejected { reason: String },
}

type Shared = Arc<Mutex<StubLedger>>;

fn ok(result: Value) -> Json<Value> {
    Json(json!({ "result": result }))
}

fn err(msg: &str) -> Json<Value> {
    Json(json!({ "error": msg }))
}

async fn rpc(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let action = body["action"].as_str().unwrap_or_default().to_string();
    let mut stub = state.lock().expect("stub lock");

    match action.as_str() {
        "session_open" => {
            if stub.refuse_session {
                err("unauthorized signer")
            } else {
                ok(json!({}))
            }
        }
        "admin" => ok(json!({ "admin": stub.admin })),
        "candidates_count" => ok(json!({ "count": stub.candidates.len() })),
        "candidate" => {
            let index = body["index"].as_u64().unwrap_or(u64::MAX) as usize;
            match stub.candidates.get(index) {
                Some((id, name, votes)) => {
                    ok(json!({ "id": id, "name": name, "vote_count": votes }))
                }
                None => err("candidate index out of range"),
            }
        }
        "remaining_time" => ok(json!({ "seconds": stub.remaining_seconds })),
        "add_candidate" | "start_voting" | "cast_vote" => {
            if action == "cast_vote" {
                if let Some(reason) = stub.reject_votes_with.clone() {
                    return err(&reason);
                }
            }
            stub.next_ticket += 1;
            let ticket = format!("t-{}", stub.next_ticket);
            let polls_left = stub.pending_polls;
            stub.tickets
                .insert(ticket.clone(), TicketState::Pending { polls_left });
            if action == "add_candidate" {
                let id = stub.candidates.len() as u64;
                let name = body["name"].as_str().unwrap_or_default().to_string();
                stub.candidates.push((id, name, 0));
            }
            ok(json!({ "ticket": ticket }))
        }
        "request_status" => {
            let ticket = body["ticket"].as_str().unwrap_or_default().to_string();
            match stub.tickets.get_mut(&ticket) {
                Some(TicketState::Pending { polls_left }) => {
                    if *polls_left == 0 {
                        ok(json!({ "status": "settled" }))
                    } else {
                        *polls_left -= 1;
                        ok(json!({ "status": "pending" }))
                    }
                }
                Some(TicketState::Rejected { reason }) => {
                    let reason = reason.clone();
                    ok(json!({ "status": "rejected", "reason": reason }))
                }
                None => err("unknown ticket"),
            }
        }
        _ => err("unknown action"),
    }
}

/// Spawn the stub server, returning its shared state and a session config
/// pointed at it.
async fn spawn_stub(stub: StubLedger) -> (Shared, SessionConfig) {
    let shared: Shared = Arc::new(Mutex::new(stub));
    let app = Router::new()
        .route("/", post(rpc))
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub serve");
    });

    let mut config = SessionConfig::for_endpoint(format!("http://{addr}"));
    config.settlement_poll_ms = 10;
    config.settlement_timeout_secs = 2;
    (shared, config)
}

fn voter() -> Identity {
    Identity::new("0xV0TER")
}

#[tokio::test]
async fn reads_round_trip() {
    let (_, config) = spawn_stub(StubLedger {
        admin: "0xAdMiN".into(),
        candidates: vec![(0, "Alice".into(), 3), (1, "Bob".into(), 1)],
        remaining_seconds: 90,
        ..StubLedger::default()
    })
    .await;

    let session = LedgerEndpoint::new(config)
        .open(&voter())
        .await
        .expect("open session");

    assert_eq!(session.admin().await.expect("admin"), Identity::new("0xadmin"));
    assert_eq!(session.candidates_count().await.expect("count"), 2);
    let bob = session.candidate(1).await.expect("candidate");
    assert_eq!((bob.id, bob.name.as_str(), bob.vote_count), (1, "Bob", 1));
    assert_eq!(session.remaining_time().await.expect("time"), 90);
}

#[tokio::test]
async fn write_settles_after_pending_polls() {
    let (shared, config) = spawn_stub(StubLedger {
        admin: "0xadmin".into(),
        pending_polls: 3,
        ..StubLedger::default()
    })
    .await;

    let session = LedgerEndpoint::new(config)
        .open(&voter())
        .await
        .expect("open session");

    let handle = session.add_candidate("Carol").await.expect("submit");
    session.await_settlement(&handle).await.expect("settle");

    let count = shared.lock().expect("stub lock").candidates.len();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn ledger_rejection_maps_to_rejected() {
    let (_, config) = spawn_stub(StubLedger {
        admin: "0xadmin".into(),
        reject_votes_with: Some("voting closed".into()),
        ..StubLedger::default()
    })
    .await;

    let session = LedgerEndpoint::new(config)
        .open(&voter())
        .await
        .expect("open session");

    match session.cast_vote(7).await {
        Err(SessionError::Rejected(reason)) => assert_eq!(reason, "voting closed"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_settlement_reports_reason() {
    let (shared, config) = spawn_stub(StubLedger {
        admin: "0xadmin".into(),
        ..StubLedger::default()
    })
    .await;

    let session = LedgerEndpoint::new(config)
        .open(&voter())
        .await
        .expect("open session");

    let handle = session.cast_vote(0).await.expect("submit");
    shared.lock().expect("stub lock").tickets.insert(
        handle.ticket.clone(),
        TicketState::Rejected {
            reason: "already voted".into(),
        },
    );

    match session.await_settlement(&handle).await {
        Err(SessionError::Rejected(reason)) => assert_eq!(reason, "already voted"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_handshake_is_an_open_error() {
    let (_, config) = spawn_stub(StubLedger {
        refuse_session: true,
        ..StubLedger::default()
    })
    .await;

    match LedgerEndpoint::new(config).open(&voter()).await {
        Err(SessionError::Open(reason)) => assert!(reason.contains("unauthorized signer")),
        other => panic!("expected open error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_transient() {
    // Port 9 (discard) is almost certainly closed; connect fails fast.
    let mut config = SessionConfig::for_endpoint("http://127.0.0.1:9");
    config.connect_timeout_secs = 1;
    config.request_timeout_secs = 1;

    match LedgerEndpoint::new(config).open(&voter()).await {
        Err(e) => assert!(e.is_transient(), "expected transient, got {e:?}"),
        Ok(_) => panic!("expected connection failure"),
    }
}
