//! Config Entries
//!
//! Holds every config entry, persists them under `core.config_entries`,
//! keeps per-entry runtime data for the integration that loaded it and
//! notifies listeners when an entry's stored data changes.

mod entry;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate};

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::storage::{Storable, Storage, StorageError, StorageResult};

pub const STORAGE_KEY: &str = "core.config_entries";

#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigEntriesData {
    entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = 1;
    const MINOR_VERSION: u32 = 5;
}

type RuntimeData = Arc<dyn Any + Send + Sync>;

pub struct ConfigEntries {
    storage: Arc<Storage>,
    entries: DashMap<String, ConfigEntry>,
    /// Data published by the integration that loaded the entry
    runtime_data: DashMap<String, RuntimeData>,
    /// Entry ids whose stored fields changed
    updates: broadcast::Sender<String>,
}

impl ConfigEntries {
    pub fn new(storage: Arc<Storage>) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            storage,
            entries: DashMap::new(),
            runtime_data: DashMap::new(),
            updates,
        }
    }

    pub async fn load(&self) -> StorageResult<()> {
        if let Some(data) = self.storage.load_data::<ConfigEntriesData>().await? {
            info!("Loading {} config entries from storage", data.entries.len());
            for entry in data.entries {
                self.entries.insert(entry.entry_id.clone(), entry);
            }
        }
        Ok(())
    }

    pub async fn save(&self) -> StorageResult<()> {
        let mut entries: Vec<ConfigEntry> = self.entries.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        self.storage.save_data(&ConfigEntriesData { entries }).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.clone())
    }

    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let mut entries: Vec<ConfigEntry> = self
            .entries
            .iter()
            .filter(|r| r.domain == domain)
            .map(|r| r.value().clone())
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        entries
    }

    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(unique_id) = &entry.unique_id {
            let duplicate = self
                .entries
                .iter()
                .any(|r| r.domain == entry.domain && r.unique_id.as_ref() == Some(unique_id));
            if duplicate {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.entries.insert(entry.entry_id.clone(), entry.clone());
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Update an entry's stored fields
    ///
    /// Listeners are only notified, and storage only written, when a field
    /// actually changed.
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let (updated, changed) = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
            let changed = update.apply(&mut entry);
            (entry.clone(), changed)
        };

        if changed {
            self.save().await?;
            debug!("Updated config entry: {}", entry_id);
            // no listeners is fine
            let _ = self.updates.send(entry_id.to_string());
        }
        Ok(updated)
    }

    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let (_, entry) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        self.runtime_data.remove(entry_id);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    pub fn set_state(&self, entry_id: &str, state: ConfigEntryState, reason: Option<String>) {
        if let Some(mut entry) = self.entries.get_mut(entry_id) {
            entry.state = state;
            entry.reason = reason;
            debug!("Entry {} state changed to {:?}", entry_id, state);
        }
    }

    /// Receive the id of every entry whose stored fields change
    pub fn subscribe_updates(&self) -> broadcast::Receiver<String> {
        self.updates.subscribe()
    }

    pub fn set_runtime_data<T: Any + Send + Sync>(&self, entry_id: &str, data: T) {
        self.runtime_data
            .insert(entry_id.to_string(), Arc::new(data));
    }

    /// Runtime data of an entry, if it was set with type `T`
    pub fn runtime_data<T: Any + Send + Sync>(&self, entry_id: &str) -> Option<Arc<T>> {
        let data = Arc::clone(self.runtime_data.get(entry_id)?.value());
        data.downcast::<T>().ok()
    }

    pub fn clear_runtime_data(&self, entry_id: &str) {
        self.runtime_data.remove(entry_id);
    }

    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
