//! The synchronization engine proper.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use tally_identity::IdentityProvider;
use tally_session::{Ledger, LedgerConnector, SessionError};
use tally_types::{ConnectionState, Identity, Snapshot};

use crate::error::EngineError;
use crate::refresh::{collapse, RefreshKind};

/// Default cadence of the remaining-time poll.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default timeout for waiting on background tasks during teardown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine tuning knobs.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Interval between remaining-time polls.
    pub poll_interval: Duration,
    /// How long teardown waits for background tasks before aborting them.
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// A user-initiated write, serialized through the write gate.
enum WriteIntent {
    AddCandidate(String),
    StartVoting(u64),
    CastVote(u64),
}

impl WriteIntent {
    fn describe(&self) -> &'static str {
        match self {
            Self::AddCandidate(_) => "add_candidate",
            Self::StartVoting(_) => "start_voting",
            Self::CastVote(_) => "cast_vote",
        }
    }

    /// Which slice of the snapshot to re-sync once the write settles.
    fn reconcile(&self) -> RefreshKind {
        match self {
            Self::AddCandidate(_) | Self::CastVote(_) => RefreshKind::Roster,
            Self::StartVoting(_) => RefreshKind::Window,
        }
    }
}

/// The live session together with its generation.
///
/// The generation is bumped every time the session is invalidated (identity
/// change, teardown). Refreshes capture the generation at issuance and their
/// results are discarded if it has moved on by the time they complete.
struct SessionSlot<S> {
    generation: u64,
    session: Option<Arc<S>>,
}

struct Inner<C: LedgerConnector> {
    connector: C,
    provider: Arc<dyn IdentityProvider>,
    config: EngineConfig,
    slot: RwLock<SessionSlot<C::Session>>,
    /// Held for the duration of one write; `try_lock` failure is `Busy`.
    write_gate: Mutex<()>,
    refresh_tx: mpsc::UnboundedSender<RefreshKind>,
    snapshot: watch::Sender<Snapshot>,
    shutdown: broadcast::Sender<()>,
}

/// The synchronization engine.
///
/// Owns the snapshot and the background tasks that keep it fresh. Created
/// inside a Tokio runtime; background tasks start immediately but stay idle
/// until [`SyncEngine::connect`] opens a session.
pub struct SyncEngine<C: LedgerConnector + 'static> {
    inner: Arc<Inner<C>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: LedgerConnector + 'static> SyncEngine<C> {
    /// Create the engine and spawn its background tasks (refresh worker,
    /// poll timer, identity watcher). Must be called within a Tokio runtime.
    pub fn new(connector: C, provider: Arc<dyn IdentityProvider>, config: EngineConfig) -> Self {
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let (snapshot, _) = watch::channel(Snapshot::empty());
        let (shutdown, _) = broadcast::channel(1);

        let inner = Arc::new(Inner {
            connector,
            provider,
            config,
            slot: RwLock::new(SessionSlot {
                generation: 0,
                session: None,
            }),
            write_gate: Mutex::new(()),
            refresh_tx,
            snapshot,
            shutdown,
        });

        let tasks = vec![
            tokio::spawn(Inner::refresh_worker(
                inner.clone(),
                refresh_rx,
                inner.shutdown.subscribe(),
            )),
            tokio::spawn(Inner::poll_timer(inner.clone(), inner.shutdown.subscribe())),
            tokio::spawn(Inner::identity_watcher(
                inner.clone(),
                inner.shutdown.subscribe(),
            )),
        ];

        Self {
            inner,
            tasks: Mutex::new(tasks),
        }
    }

    /// Subscribe to snapshot updates. The receiver always observes a
    /// fully-published value.
    pub fn snapshot(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Establish (or re-establish) the ledger session and run the initial
    /// full refresh.
    ///
    /// This is both the initial connection and the manual re-trigger out of
    /// `Degraded`. With no identity available the engine stays
    /// `Uninitialized` and waits for the provider to report one.
    pub async fn connect(&self) -> Result<(), EngineError> {
        let identities = match self.inner.provider.current_identities() {
            Ok(identities) => identities,
            Err(e) => {
                tracing::error!("identity provider unavailable: {e}");
                self.inner
                    .snapshot
                    .send_modify(|s| s.connection = ConnectionState::Degraded);
                return Err(e.into());
            }
        };

        match identities.into_iter().next() {
            Some(acting) => self.inner.rebind(acting).await,
            None => {
                tracing::info!("no identity available yet, waiting for the provider");
                self.inner.snapshot.send_modify(|s| {
                    s.identity = None;
                    s.is_admin = false;
                    s.connection = ConnectionState::Uninitialized;
                });
                Ok(())
            }
        }
    }

    /// Register a candidate. Admin-only per ledger policy; the ledger is the
    /// authority and will reject the write otherwise.
    pub async fn add_candidate(&self, name: &str) -> Result<(), EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidIntent(
                "candidate name must not be empty".into(),
            ));
        }
        self.inner
            .submit_write(WriteIntent::AddCandidate(name.to_string()))
            .await
    }

    /// Open a voting window for the given number of minutes.
    pub async fn start_voting(&self, duration_minutes: u64) -> Result<(), EngineError> {
        self.inner
            .submit_write(WriteIntent::StartVoting(duration_minutes))
            .await
    }

    /// Cast a vote. Ids unknown to the local roster are forwarded as-is; the
    /// ledger decides validity.
    pub async fn cast_vote(&self, candidate_id: u64) -> Result<(), EngineError> {
        self.inner
            .submit_write(WriteIntent::CastVote(candidate_id))
            .await
    }

    /// Request an out-of-band refresh of one snapshot slice (e.g. an
    /// external "candidates changed" signal).
    pub fn refresh(&self, kind: RefreshKind) {
        self.inner.enqueue(kind);
    }

    /// Stop all background activity and invalidate the session.
    ///
    /// After this returns no further remote calls are made; the identity
    /// subscription is deregistered by the watcher task exiting.
    pub async fn teardown(&self) {
        let _ = self.inner.shutdown.send(());

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().await;
            tasks.drain(..).collect()
        };
        for mut handle in handles {
            if tokio::time::timeout(self.inner.config.shutdown_timeout, &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }

        let mut slot = self.inner.slot.write().await;
        slot.generation += 1;
        slot.session = None;
    }
}

impl<C: LedgerConnector + 'static> Inner<C> {
    fn enqueue(&self, kind: RefreshKind) {
        // The send only fails once the worker has exited, and then a
        // refresh is moot anyway.
        let _ = self.refresh_tx.send(kind);
    }

    /// Move `connection` to `to` iff it currently is one of `from`.
    fn transition(&self, from: &[ConnectionState], to: ConnectionState) {
        self.snapshot.send_if_modified(|s| {
            if from.contains(&s.connection) && s.connection != to {
                s.connection = to;
                true
            } else {
                false
            }
        });
    }

    async fn current_generation(&self) -> u64 {
        self.slot.read().await.generation
    }

    /// Bind a session to `acting`: invalidate the old session, open a new
    /// one, and run the initial full refresh.
    async fn rebind(&self, acting: Identity) -> Result<(), EngineError> {
        self.snapshot.send_modify(|s| {
            s.identity = Some(acting.clone());
            s.is_admin = false;
            s.connection = ConnectionState::Connecting;
        });

        {
            let mut slot = self.slot.write().await;
            slot.generation += 1;
            slot.session = None;
        }

        match self.connector.open(&acting).await {
            Ok(session) => {
                {
                    let mut slot = self.slot.write().await;
                    slot.session = Some(Arc::new(session));
                }
                // Initial sync. Individual sub-reads may fail; partial data
                // is acceptable and the poll timer self-corrects.
                self.run_refresh(RefreshKind::Full).await;
                self.transition(&[ConnectionState::Connecting], ConnectionState::Ready);
                tracing::info!(identity = %acting, "ledger session established");
                Ok(())
            }
            Err(e) => {
                tracing::error!("failed to open ledger session: {e}");
                self.snapshot
                    .send_modify(|s| s.connection = ConnectionState::Degraded);
                Err(e.into())
            }
        }
    }

    /// React to a host-reported identity-set change.
    async fn handle_identity_change(&self, identities: Vec<Identity>) {
        let new_acting = identities.into_iter().next();
        let current = self.snapshot.borrow().identity.clone();

        match (current, new_acting) {
            // Acting identity unchanged: only the privilege flag needs a
            // re-check (the admin may have been reassigned on-ledger).
            (Some(current), Some(new)) if current == new => {
                self.enqueue(RefreshKind::Admin);
            }
            (None, None) => {}
            (_, Some(new)) => {
                tracing::info!(identity = %new, "acting identity changed, rebinding session");
                // A failed rebind already logged and moved us to Degraded.
                let _ = self.rebind(new).await;
            }
            (Some(_), None) => {
                tracing::info!("identity cleared by host");
                {
                    let mut slot = self.slot.write().await;
                    slot.generation += 1;
                    slot.session = None;
                }
                self.snapshot.send_modify(|s| {
                    s.identity = None;
                    s.is_admin = false;
                    s.connection = ConnectionState::Uninitialized;
                });
            }
        }
    }

    /// Issue one write, await settlement, then schedule reconciliation.
    async fn submit_write(&self, intent: WriteIntent) -> Result<(), EngineError> {
        let _gate = self.write_gate.try_lock().map_err(|_| EngineError::Busy)?;

        let session = {
            let slot = self.slot.read().await;
            slot.session.clone().ok_or(EngineError::NotConnected)?
        };

        self.transition(
            &[ConnectionState::Ready, ConnectionState::Refreshing],
            ConnectionState::Mutating,
        );

        let result = async {
            let handle = match &intent {
                WriteIntent::AddCandidate(name) => session.add_candidate(name).await?,
                WriteIntent::StartVoting(minutes) => session.start_voting(*minutes).await?,
                WriteIntent::CastVote(id) => session.cast_vote(*id).await?,
            };
            session.await_settlement(&handle).await
        }
        .await;

        self.transition(&[ConnectionState::Mutating], ConnectionState::Ready);

        match result {
            Ok(()) => {
                tracing::info!(intent = intent.describe(), "write settled");
                self.enqueue(intent.reconcile());
                Ok(())
            }
            Err(e) => {
                tracing::warn!(intent = intent.describe(), "write failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Serve one refresh request against the current session.
    async fn run_refresh(&self, kind: RefreshKind) {
        let (generation, session) = {
            let slot = self.slot.read().await;
            (slot.generation, slot.session.clone())
        };
        let Some(session) = session else {
            return;
        };

        self.transition(&[ConnectionState::Ready], ConnectionState::Refreshing);

        match kind {
            RefreshKind::Window => {
                if let Err(e) = self.refresh_window(&session, generation).await {
                    tracing::warn!("remaining-time refresh failed: {e}");
                }
            }
            RefreshKind::Roster => {
                if let Err(e) = self.refresh_roster(&session, generation).await {
                    tracing::warn!("roster refresh failed, keeping previous roster: {e}");
                }
            }
            RefreshKind::Admin => {
                if let Err(e) = self.refresh_admin(&session, generation).await {
                    tracing::warn!("admin refresh failed: {e}");
                }
            }
            RefreshKind::Full => {
                if let Err(e) = self.refresh_admin(&session, generation).await {
                    tracing::warn!("admin refresh failed: {e}");
                }
                if let Err(e) = self.refresh_roster(&session, generation).await {
                    tracing::warn!("roster refresh failed, keeping previous roster: {e}");
                }
                if let Err(e) = self.refresh_window(&session, generation).await {
                    tracing::warn!("remaining-time refresh failed: {e}");
                }
            }
        }

        self.transition(&[ConnectionState::Refreshing], ConnectionState::Ready);
    }

    async fn refresh_admin(
        &self,
        session: &C::Session,
        generation: u64,
    ) -> Result<(), SessionError> {
        let admin = session.admin().await?;
        if self.current_generation().await == generation {
            self.snapshot.send_modify(|s| {
                s.is_admin = s.identity.as_ref().is_some_and(|id| *id == admin);
            });
        }
        Ok(())
    }

    /// All-or-nothing roster rebuild: any mid-sequence failure discards the
    /// partial roster and keeps the previous good one.
    async fn refresh_roster(
        &self,
        session: &C::Session,
        generation: u64,
    ) -> Result<(), SessionError> {
        let count = session.candidates_count().await?;
        let mut roster = Vec::with_capacity(count as usize);
        for index in 0..count {
            roster.push(session.candidate(index).await?);
        }
        if self.current_generation().await == generation {
            self.snapshot.send_modify(|s| s.candidates = roster);
        }
        Ok(())
    }

    async fn refresh_window(
        &self,
        session: &C::Session,
        generation: u64,
    ) -> Result<(), SessionError> {
        let seconds = session.remaining_time().await?;
        if self.current_generation().await == generation {
            self.snapshot.send_modify(|s| s.remaining_seconds = seconds);
        }
        Ok(())
    }

    // ── Background tasks ────────────────────────────────────────────────

    /// Drains the refresh queue, collapsing bursts, one request at a time.
    async fn refresh_worker(
        inner: Arc<Self>,
        mut requests: mpsc::UnboundedReceiver<RefreshKind>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                request = requests.recv() => {
                    let Some(first) = request else { break };
                    let mut batch = vec![first];
                    while let Ok(more) = requests.try_recv() {
                        batch.push(more);
                    }
                    for kind in collapse(batch) {
                        inner.run_refresh(kind).await;
                    }
                }
            }
        }
    }

    /// Enqueues a remaining-time refresh at the poll cadence while a session
    /// is live.
    async fn poll_timer(inner: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(inner.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    if inner.snapshot.borrow().connection.has_session() {
                        inner.enqueue(RefreshKind::Window);
                    }
                }
            }
        }
    }

    /// Forwards host identity changes into the engine. Exiting drops the
    /// `watch` receiver, which deregisters the subscription.
    async fn identity_watcher(inner: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut changes = inner.provider.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        // Provider dropped; no further changes will come.
                        break;
                    }
                    let identities = changes.borrow_and_update().clone();
                    inner.handle_identity_change(identities).await;
                }
            }
        }
    }
}
