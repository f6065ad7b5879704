//! Restore state
//!
//! Entities that survive restarts remember their last state together with
//! an opaque `extra_data` blob. The store holds what was loaded from the
//! previous run separately from what live entities report during this run,
//! and [`RestoreStateStore::save`] writes the union back with live entries
//! taking precedence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hass_core::State;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{Storable, Storage, StorageResult};

pub const STORAGE_KEY: &str = "core.restore_state";

/// A remembered entity state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredState {
    pub state: State,
    /// Entity specific data saved alongside the state
    pub extra_data: Option<serde_json::Value>,
    pub last_seen: DateTime<Utc>,
}

impl StoredState {
    pub fn new(state: State, extra_data: Option<serde_json::Value>) -> Self {
        Self {
            state,
            extra_data,
            last_seen: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct RestoreStateData(Vec<StoredState>);

impl Storable for RestoreStateData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = 1;
    const MINOR_VERSION: u32 = 1;
}

pub struct RestoreStateStore {
    storage: Arc<Storage>,
    /// States from the previous run
    last_states: DashMap<String, StoredState>,
    /// States reported by entities during this run
    current: DashMap<String, StoredState>,
}

impl RestoreStateStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            last_states: DashMap::new(),
            current: DashMap::new(),
        }
    }

    pub async fn load(&self) -> StorageResult<()> {
        let Some(RestoreStateData(stored)) = self.storage.load_data::<RestoreStateData>().await?
        else {
            return Ok(());
        };

        for entry in stored {
            self.last_states.insert(entry.state.entity_id.to_string(), entry);
        }
        info!("Loaded {} restore states", self.last_states.len());
        Ok(())
    }

    pub async fn save(&self) -> StorageResult<()> {
        let mut merged: Vec<StoredState> = self
            .last_states
            .iter()
            .filter(|r| !self.current.contains_key(r.key()))
            .map(|r| r.value().clone())
            .collect();
        merged.extend(self.current.iter().map(|r| r.value().clone()));
        merged.sort_by(|a, b| a.state.entity_id.cmp(&b.state.entity_id));

        debug!("Saving {} restore states", merged.len());
        self.storage.save_data(&RestoreStateData(merged)).await
    }

    /// The state an entity had when the previous run ended
    pub fn last_state(&self, entity_id: &str) -> Option<StoredState> {
        self.last_states.get(entity_id).map(|r| r.clone())
    }

    /// Seed a previous-run state, as if it had been loaded
    pub fn insert_last_state(&self, stored: StoredState) {
        self.last_states
            .insert(stored.state.entity_id.to_string(), stored);
    }

    /// Record what an entity should be restored to on the next run
    pub fn remember(&self, state: State, extra_data: Option<serde_json::Value>) {
        self.current.insert(
            state.entity_id.to_string(),
            StoredState::new(state, extra_data),
        );
    }

    /// Keep a removed entity's state for when it is added again
    ///
    /// The entity's entry from this run replaces whatever the previous run
    /// left, so a re-add in the same run restores what was shown last.
    pub fn entity_removed(&self, entity_id: &str) {
        if let Some((entity_id, stored)) = self.current.remove(entity_id) {
            self.last_states.insert(entity_id, stored);
        }
    }

    /// What this run has recorded for a live entity
    pub fn remembered(&self, entity_id: &str) -> Option<StoredState> {
        self.current.get(entity_id).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hass_core::{Attributes, Context, EntityId};
    use serde_json::json;
    use tempfile::TempDir;

    fn state(object_id: &str, value: &str) -> State {
        State::new(
            EntityId::new("sensor", object_id).unwrap(),
            value,
            Attributes::new(),
            Context::new(),
        )
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        let store = RestoreStateStore::new(storage.clone());
        store.remember(
            state("front_door_operation", "lock_locked"),
            Some(json!({"value": "lock_locked", "attributes": {"source": "auto_lock"}})),
        );
        store.save().await.unwrap();

        let reloaded = RestoreStateStore::new(storage);
        reloaded.load().await.unwrap();

        let stored = reloaded.last_state("sensor.front_door_operation").unwrap();
        assert_eq!(stored.state.state, "lock_locked");
        assert_eq!(stored.extra_data.unwrap()["attributes"]["source"], "auto_lock");
        assert!(reloaded.remembered("sensor.front_door_operation").is_none());
    }

    #[tokio::test]
    async fn test_live_entries_win_over_previous_run() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        let store = RestoreStateStore::new(storage.clone());
        store.insert_last_state(StoredState::new(state("front_door_operation", "old"), None));
        store.insert_last_state(StoredState::new(state("back_door_operation", "kept"), None));
        store.remember(state("front_door_operation", "new"), None);
        store.save().await.unwrap();

        let reloaded = RestoreStateStore::new(storage);
        reloaded.load().await.unwrap();
        assert_eq!(
            reloaded.last_state("sensor.front_door_operation").unwrap().state.state,
            "new"
        );
        assert_eq!(
            reloaded.last_state("sensor.back_door_operation").unwrap().state.state,
            "kept"
        );
    }

    #[tokio::test]
    async fn test_removed_entity_restores_this_run() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        let store = RestoreStateStore::new(storage.clone());
        store.insert_last_state(StoredState::new(state("front_door_operation", "door_closed"), None));
        store.remember(state("front_door_operation", "lock_unlocked"), None);
        store.entity_removed("sensor.front_door_operation");

        assert!(store.remembered("sensor.front_door_operation").is_none());
        assert_eq!(
            store.last_state("sensor.front_door_operation").unwrap().state.state,
            "lock_unlocked"
        );

        store.save().await.unwrap();
        let reloaded = RestoreStateStore::new(storage);
        reloaded.load().await.unwrap();
        assert_eq!(
            reloaded.last_state("sensor.front_door_operation").unwrap().state.state,
            "lock_unlocked"
        );
    }

    #[tokio::test]
    async fn test_load_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = RestoreStateStore::new(Arc::new(Storage::new(temp_dir.path())));

        store.load().await.unwrap();
        assert!(store.last_state("sensor.front_door_operation").is_none());
    }
}
