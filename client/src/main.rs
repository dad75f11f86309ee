//! tally — CLI client for the voting ledger.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use tally_engine::{EngineConfig, SyncEngine};
use tally_identity::{IdentityError, IdentityProvider, StaticIdentityProvider};
use tally_session::{LedgerEndpoint, SessionConfig};
use tally_types::{ConnectionState, Identity, Snapshot};
use tally_utils::format_remaining;

#[derive(Parser)]
#[command(name = "tally", about = "Client for the on-chain voting ledger")]
struct Cli {
    /// Ledger endpoint URL (overrides the config file).
    #[arg(long, env = "TALLY_ENDPOINT")]
    endpoint: Option<String>,

    /// Acting identity. Prepended to any identities from the config file.
    #[arg(long, env = "TALLY_IDENTITY")]
    identity: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "TALLY_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, env = "TALLY_LOG_JSON")]
    log_json: bool,

    /// Path to a TOML configuration file. If provided, file settings are
    /// used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Follow the ledger and print each snapshot change.
    Watch,
    /// Print one snapshot and exit.
    Status,
    /// Register a candidate (admin only per ledger policy).
    AddCandidate { name: String },
    /// Open a voting window of the given length (admin only per ledger policy).
    StartVoting { minutes: u64 },
    /// Cast a vote for a candidate id.
    Vote { candidate_id: u64 },
}

/// The TOML config file: session settings plus the authorized identities.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    identities: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tally_utils::init_tracing(&cli.log_level, cli.log_json);

    let file_config = match &cli.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let config: FileConfig = toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            tracing::info!("loaded config from {}", path.display());
            config
        }
        None => FileConfig::default(),
    };

    let mut session_config = file_config.session;
    if let Some(endpoint) = &cli.endpoint {
        session_config.endpoint = endpoint.clone();
    }

    let mut identities: Vec<Identity> = file_config
        .identities
        .iter()
        .map(Identity::new)
        .collect();
    if let Some(identity) = &cli.identity {
        identities.insert(0, Identity::new(identity));
    }
    if identities.is_empty() {
        return Err(IdentityError::NoProvider).context(
            "pass --identity, set TALLY_IDENTITY, or list identities in the config file",
        );
    }

    let provider = Arc::new(StaticIdentityProvider::new(identities));
    let engine = SyncEngine::new(
        LedgerEndpoint::new(session_config),
        provider as Arc<dyn IdentityProvider>,
        EngineConfig::default(),
    );

    let result = run(&engine, cli.command).await;
    engine.teardown().await;
    result
}

async fn run(engine: &SyncEngine<LedgerEndpoint>, command: Command) -> anyhow::Result<()> {
    engine.connect().await?;

    match command {
        Command::Watch => watch(engine).await,
        Command::Status => {
            print_snapshot(&engine.snapshot().borrow());
            Ok(())
        }
        Command::AddCandidate { name } => {
            warn_if_not_admin(engine);
            engine.add_candidate(&name).await?;
            println!("candidate \"{name}\" registered");
            Ok(())
        }
        Command::StartVoting { minutes } => {
            warn_if_not_admin(engine);
            engine.start_voting(minutes).await?;
            println!("voting window opened for {minutes} minute(s)");
            Ok(())
        }
        Command::Vote { candidate_id } => {
            engine.cast_vote(candidate_id).await?;
            println!("vote cast for candidate {candidate_id}");
            Ok(())
        }
    }
}

/// The ledger is the authority on admin rights; this is only an early hint.
fn warn_if_not_admin(engine: &SyncEngine<LedgerEndpoint>) {
    if !engine.snapshot().borrow().is_admin {
        tracing::warn!("acting identity is not the ledger admin; the ledger will likely reject this request");
    }
}

async fn watch(engine: &SyncEngine<LedgerEndpoint>) -> anyhow::Result<()> {
    let mut rx = engine.snapshot();
    let mut last = normalized(&rx.borrow());
    print_snapshot(&last);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, stopping watch");
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = normalized(&rx.borrow());
                if current != last {
                    println!();
                    print_snapshot(&current);
                    last = current;
                }
            }
        }
    }
    Ok(())
}

/// Collapse the Ready/Refreshing flicker so `watch` only prints real changes.
fn normalized(snapshot: &Snapshot) -> Snapshot {
    let mut snapshot = snapshot.clone();
    if snapshot.connection == ConnectionState::Refreshing {
        snapshot.connection = ConnectionState::Ready;
    }
    snapshot
}

fn print_snapshot(snapshot: &Snapshot) {
    let identity = snapshot
        .identity
        .as_ref()
        .map(|i| i.to_string())
        .unwrap_or_else(|| "<none>".into());
    let admin_tag = if snapshot.is_admin { " (admin)" } else { "" };

    println!("account: {identity}{admin_tag} [{:?}]", snapshot.connection);
    println!("voting window: {}", format_remaining(snapshot.remaining_seconds));
    if snapshot.candidates.is_empty() {
        println!("no candidates registered");
    } else {
        for candidate in &snapshot.candidates {
            println!(
                "  [{}] {} — {} votes",
                candidate.id, candidate.name, candidate.vote_count
            );
        }
    }
}
