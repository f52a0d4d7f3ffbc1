//! Continuous background testing
//!
//! While the application is connected, re-test every enrolled profile on a
//! fixed cadence and keep the auto selection fresh. Rounds start on the
//! cadence regardless of how long the previous round takes; a per-profile
//! in-flight set is what prevents two rounds from probing the same profile
//! at once.

use crate::{
    logging::Logger,
    models::{Config, ProfileRecord, ProfileStatus},
    probe::ProberRegistry,
    selection::SelectionController,
    store::{GroupOrdering, ProfileStore},
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Connection state of the surrounding application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Long-lived background test loop.
///
/// Exits at the first iteration boundary where the connection state is no
/// longer `Connected`; no other cancellation signaling.
pub struct ContinuousTestLoop {
    store: Arc<dyn ProfileStore>,
    registry: Arc<ProberRegistry>,
    selection: Arc<SelectionController>,
    connection: watch::Receiver<ConnectionState>,
    interval: Duration,
    in_flight: Arc<Mutex<HashSet<i64>>>,
    logger: Logger,
}

impl ContinuousTestLoop {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        registry: Arc<ProberRegistry>,
        selection: Arc<SelectionController>,
        connection: watch::Receiver<ConnectionState>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            registry,
            selection,
            connection,
            interval: config.test_interval(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            logger: Logger::with_config("continuous", config),
        }
    }

    /// Run until disconnected. Spawned rounds may outlive the loop; they
    /// hold their own references and drain on their own.
    pub async fn run(mut self) {
        self.logger
            .info("Continuous testing started")
            .field("interval_secs", self.interval.as_secs())
            .log();

        loop {
            if *self.connection.borrow_and_update() != ConnectionState::Connected {
                break;
            }

            self.spawn_round().await;

            // Sleep the cadence, but react to a disconnect immediately.
            // A dropped sender counts as a disconnect.
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = self.connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.logger.info("Continuous testing stopped").log();
    }

    /// Start one round over every enrolled profile not already in flight.
    /// The round runs in its own task so the cadence does not stretch with
    /// round duration.
    async fn spawn_round(&self) {
        let profiles = match self.store.load_all().await {
            Ok(profiles) => profiles,
            Err(e) => {
                self.logger
                    .warn("Failed to load profiles for round")
                    .field("error", e.to_string())
                    .log();
                return;
            }
        };

        let round: Vec<ProfileRecord> = {
            let mut in_flight = self.in_flight.lock().expect("in-flight mutex poisoned");
            profiles
                .into_iter()
                .filter(|p| self.registry.can_enroll(p))
                .filter(|p| in_flight.insert(p.id))
                .collect()
        };

        if round.is_empty() {
            return;
        }

        self.logger
            .debug("Round starting")
            .field("profiles", round.len())
            .log();

        self.selection.begin_round();

        let store = self.store.clone();
        let registry = self.registry.clone();
        let selection = self.selection.clone();
        let in_flight = self.in_flight.clone();
        let logger = self.logger.clone();
        let groups: HashSet<i64> = round.iter().map(|p| p.group_id).collect();

        tokio::spawn(async move {
            let mut probes = JoinSet::new();
            for mut profile in round {
                let store = store.clone();
                let registry = registry.clone();
                let selection = selection.clone();
                let in_flight = in_flight.clone();
                let logger = logger.clone();

                probes.spawn(async move {
                    profile.reset_for_round();
                    profile.status = ProfileStatus::Testing;

                    let outcome = match registry.prober_for(&profile) {
                        Ok(prober) => prober.probe(&profile).await,
                        Err(failure) => Err(failure),
                    };

                    match outcome {
                        Ok(latency_ms) => profile.mark_available(latency_ms),
                        Err(failure) => {
                            let (status, detail) = failure.classify();
                            profile.mark_failed(status, detail);
                        }
                    }

                    if let Err(e) = store.persist(&profile).await {
                        logger
                            .warn("Failed to persist background result")
                            .field("profile_id", profile.id)
                            .field("error", e.to_string())
                            .log();
                    }

                    selection.observe_result(&profile);
                    in_flight
                        .lock()
                        .expect("in-flight mutex poisoned")
                        .remove(&profile.id);
                });
            }

            while probes.join_next().await.is_some() {}

            // Round finished: apply the authoritative selection pass and
            // let observers re-sort
            match store.load_all().await {
                Ok(all) => selection.on_round_complete(&all),
                Err(e) => logger
                    .warn("Failed to reload profiles after round")
                    .field("error", e.to_string())
                    .log(),
            }
            for group_id in groups {
                let _ = store.notify_group_changed(group_id, GroupOrdering::ByLatency).await;
            }
        });
    }
}
