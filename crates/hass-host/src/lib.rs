//! In-process host for integrations
//!
//! [`HomeAssistant`] bundles the pieces an integration talks to: the event
//! bus, the state store, the recorder queue, restore state, the entity,
//! device and issue registries, and config entries. It also drives config
//! entry setup and unload through the [`IntegrationHandler`] registered for
//! each domain.

pub mod config_entries;
pub mod device_registry;
pub mod diagnostics;
pub mod entity_registry;
pub mod flow;
pub mod integration;
pub mod issue_registry;
pub mod recorder;
pub mod restore_state;
pub mod state_store;
pub mod storage;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use hass_event_bus::EventBus;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub use config_entries::{
    ConfigEntries, ConfigEntriesError, ConfigEntriesResult, ConfigEntry, ConfigEntryState,
    ConfigEntryUpdate,
};
pub use device_registry::{DeviceEntry, DeviceIdentifier, DeviceInfo, DeviceRegistry};
pub use entity_registry::{EntityEntry, EntityRegistry, EntityRegistryError};
pub use flow::{FlowError, FlowHandler, FlowResult, FlowResultType, FormField};
pub use integration::{ConfigEntryError, IntegrationHandler};
pub use issue_registry::{Issue, IssueRegistry, IssueSeverity};
pub use recorder::{Recorder, RecorderQueue};
pub use restore_state::{RestoreStateStore, StoredState};
pub use state_store::StateStore;
pub use storage::{Storage, StorageError, StorageResult};

pub struct HomeAssistant {
    pub config_dir: PathBuf,
    pub bus: Arc<EventBus>,
    pub storage: Arc<Storage>,
    pub states: Arc<StateStore>,
    pub recorder: Arc<RecorderQueue>,
    pub restore_state: Arc<RestoreStateStore>,
    pub entities: Arc<EntityRegistry>,
    pub devices: Arc<DeviceRegistry>,
    pub config_entries: Arc<ConfigEntries>,
    pub issues: Arc<IssueRegistry>,
    integrations: DashMap<String, Arc<dyn IntegrationHandler>>,
    /// Serializes setup and unload
    setup_lock: Mutex<()>,
}

impl HomeAssistant {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        let bus = Arc::new(EventBus::new());
        let storage = Arc::new(Storage::new(&config_dir));

        Self {
            states: Arc::new(StateStore::new(bus.clone())),
            recorder: Arc::new(RecorderQueue::new()),
            restore_state: Arc::new(RestoreStateStore::new(storage.clone())),
            entities: Arc::new(EntityRegistry::new(bus.clone())),
            devices: Arc::new(DeviceRegistry::new()),
            config_entries: Arc::new(ConfigEntries::new(storage.clone())),
            issues: Arc::new(IssueRegistry::new(bus.clone())),
            integrations: DashMap::new(),
            setup_lock: Mutex::new(()),
            config_dir,
            bus,
            storage,
        }
    }

    /// Load persisted config entries and restore state
    pub async fn load(&self) -> StorageResult<()> {
        self.config_entries.load().await?;
        self.restore_state.load().await
    }

    pub fn register_integration(&self, domain: &str, handler: Arc<dyn IntegrationHandler>) {
        self.integrations.insert(domain.to_string(), handler);
        debug!("Registered integration: {}", domain);
    }

    fn integration(&self, domain: &str) -> Option<Arc<dyn IntegrationHandler>> {
        self.integrations.get(domain).map(|h| Arc::clone(h.value()))
    }

    pub async fn setup_entry(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .config_entries
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_loaded() {
            debug!("Entry already loaded: {}", entry_id);
            return Ok(());
        }

        self.config_entries
            .set_state(entry_id, ConfigEntryState::SetupInProgress, None);

        let Some(handler) = self.integration(&entry.domain) else {
            self.config_entries
                .set_state(entry_id, ConfigEntryState::Loaded, None);
            debug!("No integration for domain {}, marking as loaded", entry.domain);
            return Ok(());
        };

        let title = entry.title.clone();
        match handler.setup_entry(Arc::clone(self), entry).await {
            Ok(()) => {
                self.config_entries
                    .set_state(entry_id, ConfigEntryState::Loaded, None);
                info!("Setup completed for entry: {} ({})", title, entry_id);
                Ok(())
            }
            Err(err) => {
                error!("Error setting up entry {} for {}: {}", title, entry_id, err);
                self.config_entries.set_state(
                    entry_id,
                    ConfigEntryState::SetupError,
                    Some(err.to_string()),
                );
                Err(ConfigEntriesError::SetupFailed(err.to_string()))
            }
        }
    }

    /// Unload an entry, returning whether the integration unloaded cleanly
    pub async fn unload_entry(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<bool> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .config_entries
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if !entry.state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }
        if !entry.is_loaded() {
            self.config_entries
                .set_state(entry_id, ConfigEntryState::NotLoaded, None);
            return Ok(true);
        }

        self.config_entries
            .set_state(entry_id, ConfigEntryState::UnloadInProgress, None);

        let unloaded = match self.integration(&entry.domain) {
            Some(handler) => handler.unload_entry(Arc::clone(self), entry.clone()).await,
            None => true,
        };

        if unloaded {
            self.config_entries
                .set_state(entry_id, ConfigEntryState::NotLoaded, None);
            info!("Unloaded entry: {} ({})", entry.title, entry_id);
        } else {
            warn!("Failed to unload entry: {} ({})", entry.title, entry_id);
            self.config_entries
                .set_state(entry_id, ConfigEntryState::FailedUnload, None);
        }
        Ok(unloaded)
    }

    pub async fn reload_entry(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        info!("Reloading entry: {}", entry_id);
        if self.unload_entry(entry_id).await? {
            self.setup_entry(entry_id).await?;
        }
        Ok(())
    }

    pub async fn setup_all(self: &Arc<Self>) -> Vec<ConfigEntriesResult<()>> {
        let mut results = Vec::new();
        for entry_id in self.config_entries.entry_ids() {
            results.push(self.setup_entry(&entry_id).await);
        }
        results
    }

    /// Add the entry a finished flow describes and set it up
    pub async fn create_entry_from_flow(
        self: &Arc<Self>,
        result: &FlowResult,
    ) -> Result<ConfigEntry, FlowError> {
        let (Some(title), Some(serde_json::Value::Object(data))) = (&result.title, &result.data)
        else {
            return Err(FlowError::NotFinished(result.handler.clone()));
        };
        if result.result_type != FlowResultType::CreateEntry {
            return Err(FlowError::NotFinished(result.handler.clone()));
        }

        let data: HashMap<String, serde_json::Value> =
            data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let entry = self
            .config_entries
            .add(ConfigEntry::new(&result.handler, title).with_data(data))
            .await?;

        if let Err(err) = self.setup_entry(&entry.entry_id).await {
            warn!("Created entry {} did not set up: {}", entry.entry_id, err);
        }
        Ok(self.config_entries.get(&entry.entry_id).unwrap_or(entry))
    }

    /// Unload every loaded entry and persist state for the next run
    pub async fn stop(self: &Arc<Self>) -> StorageResult<()> {
        info!("Stopping");
        for entry_id in self.config_entries.entry_ids() {
            let loaded = self
                .config_entries
                .get(&entry_id)
                .is_some_and(|e| e.is_loaded());
            if loaded {
                if let Err(err) = self.unload_entry(&entry_id).await {
                    warn!("Error unloading entry {}: {}", entry_id, err);
                }
            }
        }

        self.restore_state.save().await?;
        self.config_entries.save().await
    }
}
