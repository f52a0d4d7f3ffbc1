//! Scripted prober for tests and dry runs
//!
//! Returns pre-programmed outcomes per profile id, optionally holding
//! selected probes open until released so tests can exercise cancellation
//! and minimize behavior at exact points in a round.

use crate::{error::ProbeFailure, models::ProfileRecord, probe::Prober};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

type Outcome = Result<u32, ProbeFailure>;

/// Prober that replays scripted outcomes
pub struct ScriptedProber {
    outcomes: Mutex<HashMap<i64, Outcome>>,
    default_outcome: Outcome,
    delay: Duration,
    held: Mutex<HashSet<i64>>,
    release: Notify,
    probed: Mutex<Vec<i64>>,
}

impl Default for ScriptedProber {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
            default_outcome: Ok(10),
            delay: Duration::ZERO,
            held: Mutex::new(HashSet::new()),
            release: Notify::new(),
            probed: Mutex::new(Vec::new()),
        }
    }

    /// Script the outcome for one profile id
    pub fn with_outcome(self, id: i64, outcome: Outcome) -> Self {
        self.outcomes.lock().unwrap().insert(id, outcome);
        self
    }

    /// Outcome returned for unscripted ids
    pub fn with_default(mut self, outcome: Outcome) -> Self {
        self.default_outcome = outcome;
        self
    }

    /// Artificial per-probe delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Hold the probe for `id` open until [`release`](Self::release) or
    /// [`release_all`](Self::release_all)
    pub fn hold(&self, id: i64) {
        self.held.lock().unwrap().insert(id);
    }

    /// Release one held probe
    pub fn release(&self, id: i64) {
        self.held.lock().unwrap().remove(&id);
        self.release.notify_waiters();
    }

    /// Release every held probe
    pub fn release_all(&self) {
        self.held.lock().unwrap().clear();
        self.release.notify_waiters();
    }

    /// Profile ids probed so far, in invocation order
    pub fn probed_ids(&self) -> Vec<i64> {
        self.probed.lock().unwrap().clone()
    }

    async fn wait_released(&self, id: i64) {
        loop {
            let notified = self.release.notified();
            tokio::pin!(notified);
            // Register for the next notify_waiters before re-checking, so a
            // release between the check and the await is never lost
            notified.as_mut().enable();
            if !self.held.lock().unwrap().contains(&id) {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, profile: &ProfileRecord) -> Result<u32, ProbeFailure> {
        self.probed.lock().unwrap().push(profile.id);

        self.wait_released(profile.id).await;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.outcomes
            .lock()
            .unwrap()
            .get(&profile.id)
            .cloned()
            .unwrap_or_else(|| self.default_outcome.clone())
    }
}
