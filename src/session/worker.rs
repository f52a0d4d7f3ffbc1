//! Session worker loop and shared session state
//!
//! Workers drain the queue, probe, classify, and report. All state shared
//! between workers, the session driver and the handle lives in
//! [`SessionInner`].

use crate::{
    logging::Logger,
    models::{ProfileRecord, ProfileStatus},
    probe::ProberRegistry,
    session::{ProgressSink, SessionState, TestQueue},
    store::ProfileStore,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use uuid::Uuid;

/// Control word values: reporting mode and cancellation share one atomic,
/// mirroring the session's Active -> Minimized -> Cancelled escalation.
pub(crate) const CONTROL_ACTIVE: u8 = 0;
pub(crate) const CONTROL_MINIMIZED: u8 = 1;
pub(crate) const CONTROL_CANCELLED: u8 = 2;

/// State shared by the workers, the driver and the session handle
pub(crate) struct SessionInner {
    pub(crate) session_id: Uuid,
    pub(crate) group_id: i64,
    pub(crate) queue: TestQueue,
    /// Enrolled snapshot in seed order, statuses reset to Untested
    pub(crate) enrolled: Vec<ProfileRecord>,
    pub(crate) store: Arc<dyn ProfileStore>,
    pub(crate) registry: Arc<ProberRegistry>,
    pub(crate) sink: Arc<dyn ProgressSink>,
    pub(crate) control: AtomicU8,
    pub(crate) completed: AtomicUsize,
    pub(crate) total: usize,
    /// Resolved records, keyed by profile id; flushed again at terminal
    /// state so a cancelled session persists everything that finished
    pub(crate) results: Mutex<HashMap<i64, ProfileRecord>>,
    pub(crate) state_tx: watch::Sender<SessionState>,
    pub(crate) logger: Logger,
}

impl SessionInner {
    pub(crate) fn cancelled(&self) -> bool {
        self.control.load(Ordering::SeqCst) == CONTROL_CANCELLED
    }

    /// Request cancellation; reporting mode can only escalate
    pub(crate) fn request_cancel(&self) {
        self.control.fetch_max(CONTROL_CANCELLED, Ordering::SeqCst);
    }

    /// Switch per-item reporting to progress-only counts. No effect once
    /// cancelled.
    pub(crate) fn request_minimize(&self) {
        let _ = self.control.compare_exchange(
            CONTROL_ACTIVE,
            CONTROL_MINIMIZED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub(crate) fn progress(&self) -> (usize, usize) {
        (self.completed.load(Ordering::SeqCst), self.total)
    }

    /// Enrolled snapshot with resolved records merged in
    pub(crate) fn snapshot(&self) -> Vec<ProfileRecord> {
        let results = self.results.lock().expect("results mutex poisoned");
        self.enrolled
            .iter()
            .map(|p| results.get(&p.id).cloned().unwrap_or_else(|| p.clone()))
            .collect()
    }

    /// Resolved records only, for the terminal persistence flush
    pub(crate) fn resolved(&self) -> Vec<ProfileRecord> {
        let results = self.results.lock().expect("results mutex poisoned");
        let mut resolved: Vec<ProfileRecord> = results.values().cloned().collect();
        resolved.sort_by_key(|p| p.id);
        resolved
    }

    /// Record one completed item: accumulate, persist, count, report.
    /// Called exactly once per dequeued record regardless of outcome.
    async fn record_result(&self, profile: ProfileRecord) {
        debug_assert_ne!(profile.status, ProfileStatus::Testing);
        debug_assert_ne!(profile.status, ProfileStatus::Untested);

        self.results
            .lock()
            .expect("results mutex poisoned")
            .insert(profile.id, profile.clone());

        // A persist failure downgrades to a warning: the in-memory result
        // stands and the terminal flush retries the batch
        if let Err(e) = self.store.persist(&profile).await {
            self.logger
                .warn("Failed to persist probe result")
                .field("profile_id", profile.id)
                .field("error", e.to_string())
                .log();
        }

        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        match self.control.load(Ordering::SeqCst) {
            CONTROL_ACTIVE => self.sink.on_result(&profile, completed, self.total),
            _ => self.sink.on_progress(completed, self.total),
        }
    }
}

/// One worker: dequeue, probe, classify, report; observe cancellation
/// between dequeue attempts.
///
/// A probe in progress is never interrupted; the prober owns the timeout.
pub(crate) async fn run_worker(inner: Arc<SessionInner>) {
    loop {
        if inner.cancelled() {
            break;
        }

        let Some(mut profile) = inner.queue.poll() else {
            break;
        };

        profile.status = ProfileStatus::Testing;

        let outcome = match inner.registry.prober_for(&profile) {
            Ok(prober) => prober.probe(&profile).await,
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(latency_ms) => {
                profile.mark_available(latency_ms);
                inner
                    .logger
                    .debug("Probe succeeded")
                    .field("profile_id", profile.id)
                    .field("latency_ms", latency_ms)
                    .log();
            }
            Err(failure) => {
                let (status, detail) = failure.classify();
                inner
                    .logger
                    .debug("Probe failed")
                    .field("profile_id", profile.id)
                    .field("detail", detail.as_str())
                    .log();
                profile.mark_failed(status, detail);
            }
        }

        inner.record_result(profile).await;
    }
}
