//! Profile datastore boundary
//!
//! Profile persistence belongs to the surrounding application; this module
//! specifies the interface the selector consumes and ships an in-memory
//! implementation used by the CLI and the test suite.

use crate::{
    error::{AppError, Result},
    models::ProfileRecord,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::{broadcast, RwLock};

/// Re-sort hint attached to a group-changed notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrdering {
    /// Keep whatever ordering the group had
    Unchanged,
    /// Order members by measured latency
    ByLatency,
}

/// Notification that a group's membership ordering may need recomputing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChange {
    pub group_id: i64,
    pub ordering: GroupOrdering,
}

/// Datastore interface consumed by the selector.
///
/// Implementations must tolerate concurrent calls from multiple workers;
/// persistence of the same record twice with identical contents must be
/// idempotent.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load all profiles enrolled in a group
    async fn load_group(&self, group_id: i64) -> Result<Vec<ProfileRecord>>;

    /// Load every profile across all groups
    async fn load_all(&self) -> Result<Vec<ProfileRecord>>;

    /// Persist one record
    async fn persist(&self, profile: &ProfileRecord) -> Result<()>;

    /// Persist a batch of records
    async fn persist_many(&self, profiles: &[ProfileRecord]) -> Result<()> {
        for profile in profiles {
            self.persist(profile).await?;
        }
        Ok(())
    }

    /// Tell the surrounding app that group ordering may need recomputing
    async fn notify_group_changed(&self, group_id: i64, ordering: GroupOrdering) -> Result<()>;
}

/// In-memory profile store.
///
/// Group-changed notifications fan out on a broadcast channel so observers
/// (the CLI, tests) can react to re-sort hints.
pub struct MemoryStore {
    profiles: RwLock<HashMap<i64, ProfileRecord>>,
    changes: broadcast::Sender<GroupChange>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            profiles: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Build a store seeded with the given records
    pub async fn with_profiles(profiles: Vec<ProfileRecord>) -> Self {
        let store = Self::new();
        store.insert_all(profiles).await;
        store
    }

    /// Load records from a JSON file (an array of profile objects)
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| AppError::io(format!("Failed to read {}: {}", path.as_ref().display(), e)))?;
        let profiles: Vec<ProfileRecord> = serde_json::from_str(&raw)?;

        let mut seen = HashMap::new();
        for profile in &profiles {
            if seen.insert(profile.id, ()).is_some() {
                return Err(AppError::validation(format!(
                    "Duplicate profile id {} in {}",
                    profile.id,
                    path.as_ref().display()
                )));
            }
        }

        Ok(Self::with_profiles(profiles).await)
    }

    /// Insert or replace records
    pub async fn insert_all(&self, profiles: Vec<ProfileRecord>) {
        let mut map = self.profiles.write().await;
        for profile in profiles {
            map.insert(profile.id, profile);
        }
    }

    /// Fetch one record by id
    pub async fn get(&self, id: i64) -> Option<ProfileRecord> {
        self.profiles.read().await.get(&id).cloned()
    }

    /// Subscribe to group-changed notifications
    pub fn subscribe(&self) -> broadcast::Receiver<GroupChange> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load_group(&self, group_id: i64) -> Result<Vec<ProfileRecord>> {
        let map = self.profiles.read().await;
        let mut group: Vec<ProfileRecord> = map
            .values()
            .filter(|p| p.group_id == group_id)
            .cloned()
            .collect();
        // Stable enrollment order: manual ordering first, id as tie-break
        group.sort_by_key(|p| (p.user_order, p.id));
        Ok(group)
    }

    async fn load_all(&self) -> Result<Vec<ProfileRecord>> {
        let map = self.profiles.read().await;
        let mut all: Vec<ProfileRecord> = map.values().cloned().collect();
        all.sort_by_key(|p| (p.group_id, p.user_order, p.id));
        Ok(all)
    }

    async fn persist(&self, profile: &ProfileRecord) -> Result<()> {
        let mut map = self.profiles.write().await;
        map.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn notify_group_changed(&self, group_id: i64, ordering: GroupOrdering) -> Result<()> {
        // Nobody listening is fine
        let _ = self.changes.send(GroupChange { group_id, ordering });
        Ok(())
    }
}

/// Store wrapper that fails every call; exercises session-startup fault
/// handling in tests
#[cfg(test)]
pub(crate) struct FailingStore;

#[cfg(test)]
#[async_trait]
impl ProfileStore for FailingStore {
    async fn load_group(&self, _group_id: i64) -> Result<Vec<ProfileRecord>> {
        Err(AppError::store("datastore unavailable"))
    }

    async fn load_all(&self) -> Result<Vec<ProfileRecord>> {
        Err(AppError::store("datastore unavailable"))
    }

    async fn persist(&self, _profile: &ProfileRecord) -> Result<()> {
        Err(AppError::store("datastore unavailable"))
    }

    async fn notify_group_changed(&self, _group_id: i64, _ordering: GroupOrdering) -> Result<()> {
        Err(AppError::store("datastore unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProfileStatus, ProtocolKind};
    use tokio_test::assert_ok;

    fn profile(id: i64, group_id: i64, order: u32) -> ProfileRecord {
        let mut p = ProfileRecord::new(
            id,
            group_id,
            format!("node-{}", id),
            "203.0.113.4",
            443,
            ProtocolKind::Trojan,
        );
        p.user_order = order;
        p
    }

    #[tokio::test]
    async fn test_load_group_filters_and_orders() {
        let store = MemoryStore::with_profiles(vec![
            profile(3, 1, 2),
            profile(1, 1, 1),
            profile(9, 2, 0),
            profile(2, 1, 1),
        ])
        .await;

        let group = store.load_group(1).await.unwrap();
        let ids: Vec<i64> = group.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_persist_updates_record() {
        let store = MemoryStore::with_profiles(vec![profile(1, 1, 0)]).await;

        let mut updated = store.get(1).await.unwrap();
        updated.mark_available(77);
        tokio_test::assert_ok!(store.persist(&updated).await);

        let reloaded = store.get(1).await.unwrap();
        assert_eq!(reloaded.status, ProfileStatus::Available);
        assert_eq!(reloaded.latency_ms, 77);
    }

    #[tokio::test]
    async fn test_group_change_notification() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.notify_group_changed(5, GroupOrdering::ByLatency).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.group_id, 5);
        assert_eq!(change.ordering, GroupOrdering::ByLatency);
    }

    #[tokio::test]
    async fn test_from_json_file_rejects_duplicate_ids() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": 1, "group_id": 1, "display_name": "a", "server_address": "h", "server_port": 1, "protocol": "vmess"}},
                {{"id": 1, "group_id": 1, "display_name": "b", "server_address": "h", "server_port": 2, "protocol": "vmess"}}
            ]"#
        )
        .unwrap();

        let result = MemoryStore::from_json_file(file.path()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
