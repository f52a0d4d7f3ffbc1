//! Best-node selection policy
//!
//! Pure selection over a profile snapshot plus the Auto/Manual mode
//! machine. Picking a node by hand always switches to Manual; Auto is only
//! ever re-entered explicitly.

use crate::models::{ProfileRecord, ProfileStatus};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Route through the lowest-latency Available profile
    Auto,
    /// Route through the user's explicit pick
    Manual,
}

/// Selection state: the mode and the currently active node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub mode: SelectionMode,
    pub active_profile_id: Option<i64>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            mode: SelectionMode::Auto,
            active_profile_id: None,
        }
    }
}

impl SelectionPolicy {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            active_profile_id: None,
        }
    }

    /// The Available profile with the minimum latency; ties break to the
    /// lowest id so repeated invocations are stable.
    pub fn pick_best(profiles: &[ProfileRecord]) -> Option<&ProfileRecord> {
        profiles
            .iter()
            .filter(|p| p.status == ProfileStatus::Available)
            .min_by_key(|p| (p.latency_ms, p.id))
    }

    /// Apply a finished round. Auto adopts the best profile when one
    /// exists and otherwise leaves the active node alone; Manual never
    /// changes.
    pub fn on_round_complete(&mut self, profiles: &[ProfileRecord]) {
        if self.mode != SelectionMode::Auto {
            return;
        }
        if let Some(best) = Self::pick_best(profiles) {
            self.active_profile_id = Some(best.id);
        }
    }

    /// Explicit user pick: unconditionally Manual + the picked node
    pub fn on_user_select(&mut self, profile_id: i64) {
        self.mode = SelectionMode::Manual;
        self.active_profile_id = Some(profile_id);
    }

    /// Explicit mode switch (the only way back to Auto)
    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
    }
}

/// Stable presentation order: Available first, then Testing, then the
/// rest; within a rank, ascending latency with the unmeasured sentinel for
/// anything not Available. Does not touch the active node.
pub fn sort_for_display(profiles: &mut [ProfileRecord]) {
    profiles.sort_by_key(|p| (p.status.display_rank(), p.sort_latency(), p.id));
}

/// Thread-safe selection shared between sessions, the continuous loop and
/// the caller.
///
/// `observe_result` refreshes the pick incrementally while a round is
/// still running; `on_round_complete` stays authoritative at round end.
pub struct SelectionController {
    inner: Mutex<ControllerState>,
}

struct ControllerState {
    policy: SelectionPolicy,
    /// Latency of the node adopted during the current round, for
    /// incremental comparisons
    round_best: Option<(u32, i64)>,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new(SelectionMode::Auto)
    }
}

impl SelectionController {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            inner: Mutex::new(ControllerState {
                policy: SelectionPolicy::new(mode),
                round_best: None,
            }),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.lock().policy.mode
    }

    pub fn active_profile_id(&self) -> Option<i64> {
        self.lock().policy.active_profile_id
    }

    pub fn set_mode(&self, mode: SelectionMode) {
        self.lock().policy.set_mode(mode);
    }

    /// Explicit user pick; always disables Auto
    pub fn select_manually(&self, profile_id: i64) {
        self.lock().policy.on_user_select(profile_id);
    }

    /// Forget the running round's incremental best
    pub fn begin_round(&self) {
        self.lock().round_best = None;
    }

    /// Incremental refresh from one resolved record. In Auto mode the
    /// active node follows the best result seen so far this round.
    pub fn observe_result(&self, profile: &ProfileRecord) {
        let mut state = self.lock();
        if state.policy.mode != SelectionMode::Auto || profile.status != ProfileStatus::Available {
            return;
        }

        let candidate = (profile.latency_ms, profile.id);
        let adopt = match state.round_best {
            None => true,
            Some(best) => candidate < best,
        };
        if adopt {
            state.round_best = Some(candidate);
            state.policy.active_profile_id = Some(profile.id);
        }
    }

    /// Authoritative round-end application
    pub fn on_round_complete(&self, profiles: &[ProfileRecord]) {
        let mut state = self.lock();
        state.round_best = None;
        state.policy.on_round_complete(profiles);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ControllerState> {
        self.inner.lock().expect("selection mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProtocolKind, LATENCY_UNMEASURED};

    fn available(id: i64, latency: u32) -> ProfileRecord {
        let mut p = ProfileRecord::new(id, 1, format!("n{}", id), "203.0.113.20", 443, ProtocolKind::Trojan);
        p.mark_available(latency);
        p
    }

    fn failed(id: i64) -> ProfileRecord {
        let mut p = ProfileRecord::new(id, 1, format!("n{}", id), "203.0.113.20", 443, ProtocolKind::Trojan);
        p.mark_failed(ProfileStatus::Unreachable, "Connection timed out");
        p
    }

    fn untested(id: i64) -> ProfileRecord {
        ProfileRecord::new(id, 1, format!("n{}", id), "203.0.113.20", 443, ProtocolKind::Trojan)
    }

    #[test]
    fn test_pick_best_minimum_latency() {
        let profiles = vec![available(1, 80), available(2, 30), failed(3)];
        assert_eq!(SelectionPolicy::pick_best(&profiles).unwrap().id, 2);
    }

    #[test]
    fn test_pick_best_tie_breaks_lowest_id() {
        let profiles = vec![available(9, 30), available(2, 30), available(5, 30)];
        assert_eq!(SelectionPolicy::pick_best(&profiles).unwrap().id, 2);
    }

    #[test]
    fn test_pick_best_none_when_nothing_available() {
        let profiles = vec![failed(1), untested(2)];
        assert!(SelectionPolicy::pick_best(&profiles).is_none());
    }

    #[test]
    fn test_auto_round_adopts_best() {
        let mut policy = SelectionPolicy::default();
        policy.on_round_complete(&[available(1, 80), available(2, 30)]);
        assert_eq!(policy.active_profile_id, Some(2));
    }

    #[test]
    fn test_auto_round_without_available_keeps_active() {
        let mut policy = SelectionPolicy::default();
        policy.active_profile_id = Some(4);
        policy.on_round_complete(&[failed(1), failed(2)]);
        assert_eq!(policy.active_profile_id, Some(4));
    }

    #[test]
    fn test_manual_round_never_changes_active() {
        let mut policy = SelectionPolicy::default();
        policy.on_user_select(7);
        policy.on_round_complete(&[available(1, 5)]);
        assert_eq!(policy.mode, SelectionMode::Manual);
        assert_eq!(policy.active_profile_id, Some(7));
    }

    #[test]
    fn test_user_select_always_enters_manual() {
        let mut policy = SelectionPolicy::default();
        assert_eq!(policy.mode, SelectionMode::Auto);
        policy.on_user_select(3);
        assert_eq!(policy.mode, SelectionMode::Manual);
        assert_eq!(policy.active_profile_id, Some(3));

        // Only an explicit switch restores Auto
        policy.set_mode(SelectionMode::Auto);
        assert_eq!(policy.mode, SelectionMode::Auto);
    }

    #[test]
    fn test_sort_for_display_ranks_and_latency() {
        let mut profiles = vec![failed(1), available(2, 90), untested(3), available(4, 20)];
        sort_for_display(&mut profiles);
        let ids: Vec<i64> = profiles.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
        assert_eq!(profiles[2].sort_latency(), LATENCY_UNMEASURED);
    }

    #[test]
    fn test_controller_incremental_observation() {
        let controller = SelectionController::new(SelectionMode::Auto);
        controller.begin_round();

        controller.observe_result(&available(1, 80));
        assert_eq!(controller.active_profile_id(), Some(1));

        controller.observe_result(&available(2, 30));
        assert_eq!(controller.active_profile_id(), Some(2));

        // Worse result does not steal the pick
        controller.observe_result(&available(3, 50));
        assert_eq!(controller.active_profile_id(), Some(2));

        // Failures are ignored
        controller.observe_result(&failed(4));
        assert_eq!(controller.active_profile_id(), Some(2));
    }

    #[test]
    fn test_controller_manual_ignores_observations() {
        let controller = SelectionController::new(SelectionMode::Auto);
        controller.select_manually(9);
        controller.observe_result(&available(1, 1));
        controller.on_round_complete(&[available(1, 1)]);
        assert_eq!(controller.mode(), SelectionMode::Manual);
        assert_eq!(controller.active_profile_id(), Some(9));
    }

    proptest::proptest! {
        /// pick_best is deterministic and the tie-break always favors the
        /// lowest id among equal minimum latencies
        #[test]
        fn prop_pick_best_deterministic(entries in proptest::collection::vec((1i64..200, 0u32..5000), 1..40)) {
            let mut profiles: Vec<ProfileRecord> = entries
                .iter()
                .map(|(id, latency)| available(*id, *latency))
                .collect();

            let first = SelectionPolicy::pick_best(&profiles).map(|p| p.id);
            let second = SelectionPolicy::pick_best(&profiles).map(|p| p.id);
            proptest::prop_assert_eq!(first, second);

            // Shuffle-invariance: reversing the slice cannot change the pick
            profiles.reverse();
            let reversed = SelectionPolicy::pick_best(&profiles).map(|p| p.id);
            proptest::prop_assert_eq!(first, reversed);

            let min_latency = profiles.iter().map(|p| p.latency_ms).min().unwrap();
            let expected = profiles
                .iter()
                .filter(|p| p.latency_ms == min_latency)
                .map(|p| p.id)
                .min();
            proptest::prop_assert_eq!(first, expected);
        }
    }
}
