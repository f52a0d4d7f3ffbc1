//! Test session orchestration
//!
//! A `TestSession` runs one round of latency testing over a profile group:
//! it seeds the shared [`TestQueue`], spawns the worker pool, tracks
//! aggregate progress, and walks the Active -> Minimized -> Cancelled /
//! Completed state machine. Foreground (dialog-driven) and background
//! (counters-only) testing are the same orchestrator with a different
//! [`ProgressSink`].

pub mod queue;
pub mod worker;


pub use queue::TestQueue;

use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::{Config, ProfileRecord},
    probe::ProberRegistry,
    store::{GroupOrdering, ProfileStore},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;
use worker::{run_worker, SessionInner, CONTROL_ACTIVE};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Workers running, per-item results delivered to the sink
    Active,
    /// Workers running, per-item callbacks replaced by progress counts
    Minimized,
    /// Cooperatively cancelled; terminal once the pool is joined
    Cancelled,
    /// Queue drained and pool joined with no cancellation
    Completed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Minimized => "minimized",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

/// Where a session reports progress.
///
/// Callbacks arrive on worker tasks and must not block; they may arrive
/// out of queue order but exactly once per completed item.
pub trait ProgressSink: Send + Sync {
    /// One item resolved while the session is Active
    fn on_result(&self, profile: &ProfileRecord, completed: usize, total: usize);

    /// One item resolved while per-item reporting is suppressed
    /// (Minimized or after a cancel request)
    fn on_progress(&self, _completed: usize, _total: usize) {}

    /// Terminal state reached; `snapshot` is the enrolled set with all
    /// resolved results merged in
    fn on_terminal(&self, state: SessionState, snapshot: &[ProfileRecord]);
}

/// Sink that ignores everything
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_result(&self, _profile: &ProfileRecord, _completed: usize, _total: usize) {}
    fn on_terminal(&self, _state: SessionState, _snapshot: &[ProfileRecord]) {}
}

/// Sink that only counts, for background rounds and tests
#[derive(Default)]
pub struct CountingSink {
    results: AtomicUsize,
    progress_only: AtomicUsize,
    terminal: AtomicBool,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items reported through `on_result`
    pub fn results_seen(&self) -> usize {
        self.results.load(Ordering::SeqCst)
    }

    /// Items reported through `on_progress`
    pub fn progress_seen(&self) -> usize {
        self.progress_only.load(Ordering::SeqCst)
    }

    pub fn terminal_seen(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }
}

impl ProgressSink for CountingSink {
    fn on_result(&self, _profile: &ProfileRecord, _completed: usize, _total: usize) {
        self.results.fetch_add(1, Ordering::SeqCst);
    }

    fn on_progress(&self, _completed: usize, _total: usize) {
        self.progress_only.fetch_add(1, Ordering::SeqCst);
    }

    fn on_terminal(&self, _state: SessionState, _snapshot: &[ProfileRecord]) {
        self.terminal.store(true, Ordering::SeqCst);
    }
}

/// Per-group "test running" guards.
///
/// One flag per group id, acquired with compare-and-set so two sessions can
/// never start concurrently for the same group while independent groups
/// test freely.
#[derive(Default)]
pub struct GroupGuards {
    inner: Mutex<HashMap<i64, Arc<AtomicBool>>>,
}

impl GroupGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the guard for a group, or fail if a session is running
    pub fn try_acquire(&self, group_id: i64) -> Result<GuardToken> {
        let flag = {
            let mut map = self.inner.lock().expect("guard mutex poisoned");
            map.entry(group_id).or_default().clone()
        };

        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(GuardToken { group_id, flag })
        } else {
            Err(AppError::SessionAlreadyRunning { group_id })
        }
    }

    /// Whether a session currently holds the group's guard
    pub fn is_running(&self, group_id: i64) -> bool {
        self.inner
            .lock()
            .expect("guard mutex poisoned")
            .get(&group_id)
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

/// Held for the lifetime of one session; releases the group flag on drop,
/// which happens only once the session reaches a terminal state (or
/// startup fails before any side effect).
pub struct GuardToken {
    group_id: i64,
    flag: Arc<AtomicBool>,
}

impl GuardToken {
    pub fn group_id(&self) -> i64 {
        self.group_id
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Creates and supervises test sessions over profile groups
pub struct SessionCoordinator {
    store: Arc<dyn ProfileStore>,
    registry: Arc<ProberRegistry>,
    guards: Arc<GroupGuards>,
    logger: Logger,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn ProfileStore>, registry: Arc<ProberRegistry>, config: &Config) -> Self {
        Self {
            store,
            registry,
            guards: Arc::new(GroupGuards::new()),
            logger: Logger::with_config("session", config),
        }
    }

    /// Guard registry, shared so callers can query run state
    pub fn guards(&self) -> Arc<GroupGuards> {
        self.guards.clone()
    }

    /// Start one test round over a profile group.
    ///
    /// Fails synchronously with no side effects when a session is already
    /// running for the group or the datastore cannot load it. Concurrency
    /// is clamped to the enrolled profile count.
    pub async fn start_session(
        &self,
        group_id: i64,
        concurrency: usize,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<SessionHandle> {
        // Contract guard first: second start for the same group is rejected
        // before any other work happens
        let token = self.guards.try_acquire(group_id)?;

        // A load failure aborts startup entirely; the token drop releases
        // the guard on the way out
        let profiles = self.store.load_group(group_id).await?;

        let mut enrolled: Vec<ProfileRecord> = profiles
            .into_iter()
            .filter(|p| self.registry.can_enroll(p))
            .collect();
        for profile in &mut enrolled {
            profile.reset_for_round();
        }

        let total = enrolled.len();
        let workers = concurrency.max(1).min(total);
        let session_id = Uuid::new_v4();
        let logger = self.logger.with_correlation_id(session_id.to_string());

        logger
            .info("Session starting")
            .field("group_id", group_id)
            .field("profiles", total)
            .field("workers", workers)
            .field("method", self.registry.method().name())
            .log();

        let (state_tx, state_rx) = watch::channel(SessionState::Active);

        let inner = Arc::new(SessionInner {
            session_id,
            group_id,
            queue: TestQueue::new(enrolled.clone()),
            enrolled,
            store: self.store.clone(),
            registry: self.registry.clone(),
            sink,
            control: AtomicU8::new(CONTROL_ACTIVE),
            completed: AtomicUsize::new(0),
            total,
            results: Mutex::new(HashMap::new()),
            state_tx,
            logger,
        });

        let worker_handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|_| tokio::spawn(run_worker(inner.clone())))
            .collect();

        let driver = tokio::spawn(run_driver(inner.clone(), worker_handles, token));

        Ok(SessionHandle {
            session_id,
            group_id,
            inner,
            state_rx,
            driver,
        })
    }
}

/// Joins the pool, then finalizes: flush results, notify the group,
/// publish the terminal state, release the guard.
async fn run_driver(
    inner: Arc<SessionInner>,
    workers: Vec<JoinHandle<()>>,
    token: GuardToken,
) -> (SessionState, Vec<ProfileRecord>) {
    // The session is not terminal until every spawned worker has exited
    futures::future::join_all(workers).await;

    let state = if inner.cancelled() {
        SessionState::Cancelled
    } else {
        SessionState::Completed
    };

    let resolved = inner.resolved();
    if !resolved.is_empty() {
        if let Err(e) = inner.store.persist_many(&resolved).await {
            inner
                .logger
                .warn("Failed to flush session results")
                .field("error", e.to_string())
                .log();
        }
    }

    if let Err(e) = inner
        .store
        .notify_group_changed(inner.group_id, GroupOrdering::ByLatency)
        .await
    {
        inner
            .logger
            .warn("Failed to notify group change")
            .field("error", e.to_string())
            .log();
    }

    let snapshot = inner.snapshot();
    let (completed, total) = inner.progress();
    inner
        .logger
        .info("Session terminal")
        .field("state", state.name())
        .field("completed", completed)
        .field("total", total)
        .log();

    let _ = inner.state_tx.send(state);
    inner.sink.on_terminal(state, &snapshot);

    drop(token);
    (state, snapshot)
}

/// Caller-side handle to a running session
pub struct SessionHandle {
    session_id: Uuid,
    group_id: i64,
    inner: Arc<SessionInner>,
    state_rx: watch::Receiver<SessionState>,
    driver: JoinHandle<(SessionState, Vec<ProfileRecord>)>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.session_id
    }

    pub fn group_id(&self) -> i64 {
        self.group_id
    }

    /// Current state; Active/Minimized until the pool is joined
    pub fn state(&self) -> SessionState {
        self.control().state()
    }

    /// (completed, total) progress counters
    pub fn progress(&self) -> (usize, usize) {
        self.inner.progress()
    }

    /// Request cooperative cancellation: in-flight probes finish, no new
    /// dequeues, resolved results are persisted. No-op once terminal.
    pub fn cancel(&self) {
        self.control().cancel()
    }

    /// Background the session: work continues, per-item callbacks become
    /// progress-only counts. Never cancels.
    pub fn minimize(&self) {
        self.control().minimize()
    }

    /// Detachable control surface for cancelling/minimizing from another
    /// task while this handle is parked in [`wait`](Self::wait)
    pub fn control(&self) -> SessionControl {
        SessionControl {
            inner: self.inner.clone(),
            state_rx: self.state_rx.clone(),
        }
    }

    /// Wait for the terminal state and final snapshot.
    ///
    /// This is the only blocking operation the session exposes, and it is
    /// itself async.
    pub async fn wait(self) -> Result<(SessionState, Vec<ProfileRecord>)> {
        self.driver
            .await
            .map_err(|e| AppError::internal(format!("Session driver failed: {}", e)))
    }
}

/// Cloneable control surface over a running session
#[derive(Clone)]
pub struct SessionControl {
    inner: Arc<SessionInner>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionControl {
    /// Current state; Active/Minimized until the pool is joined
    pub fn state(&self) -> SessionState {
        let published = *self.state_rx.borrow();
        if published.is_terminal() {
            return published;
        }
        match self.inner.control.load(Ordering::SeqCst) {
            worker::CONTROL_MINIMIZED => SessionState::Minimized,
            worker::CONTROL_CANCELLED => SessionState::Cancelled,
            _ => SessionState::Active,
        }
    }

    pub fn progress(&self) -> (usize, usize) {
        self.inner.progress()
    }

    pub fn cancel(&self) {
        if self.state_rx.borrow().is_terminal() {
            return;
        }
        self.inner.logger.info("Cancellation requested").log();
        self.inner.request_cancel();
    }

    pub fn minimize(&self) {
        self.inner.request_minimize();
    }
}
