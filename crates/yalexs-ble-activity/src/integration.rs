//! Integration setup and unload

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use hass_host::{ConfigEntry, ConfigEntryError, HomeAssistant, IntegrationHandler};
use tracing::{debug, info, warn};

use crate::compat::{patch_url, BundledLibrary, LibraryCompat};
use crate::config::{ActivityConfig, SensorSettings};
use crate::error::SetupError;
use crate::sensor::{setup_sensors, OperationSensor};
use crate::tracking::EntryListener;

/// What a loaded entry keeps running
struct EntryRuntime {
    sensors: Vec<OperationSensor>,
    listener: EntryListener,
}

pub struct YaleXSBLEActivity {
    compat: Arc<dyn LibraryCompat>,
    settings: SensorSettings,
    runtime: DashMap<String, EntryRuntime>,
}

impl YaleXSBLEActivity {
    pub fn new(compat: Arc<dyn LibraryCompat>, settings: SensorSettings) -> Self {
        Self {
            compat,
            settings,
            runtime: DashMap::new(),
        }
    }

    /// Entity ids of the sensors running for an entry
    pub fn sensor_entity_ids(&self, entry_id: &str) -> Vec<String> {
        self.runtime
            .get(entry_id)
            .map(|runtime| {
                runtime
                    .sensors
                    .iter()
                    .map(|sensor| sensor.entity_id().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fail setup when the library cannot deliver activity, installing a
    /// patched build when one exists
    async fn check_compat(&self) -> Result<(), SetupError> {
        if self.compat.supports_activity_callback() {
            return Ok(());
        }

        let version = self.compat.version();
        let url = patch_url(&version);
        warn!(%version, %url, "Lock library cannot report activity, installing patch");

        let compat = Arc::clone(&self.compat);
        let installed = tokio::task::spawn_blocking(move || compat.install_patch(&url))
            .await
            .unwrap_or_else(|err| {
                warn!(%err, "Patch install task failed");
                false
            });

        if installed {
            Err(SetupError::LibraryPatched { version })
        } else {
            Err(SetupError::NoPatchAvailable { version })
        }
    }
}

impl Default for YaleXSBLEActivity {
    fn default() -> Self {
        Self::new(Arc::new(BundledLibrary), SensorSettings::default())
    }
}

#[async_trait]
impl IntegrationHandler for YaleXSBLEActivity {
    async fn setup_entry(
        &self,
        hass: Arc<HomeAssistant>,
        entry: ConfigEntry,
    ) -> Result<(), ConfigEntryError> {
        debug!(title = %entry.title, data = ?entry.data, "Setting up entry");

        self.check_compat().await?;
        let config = ActivityConfig::from_entry_data(&entry.data).map_err(SetupError::from)?;

        let listener = EntryListener::start(Arc::clone(&hass), &entry.entry_id, &config);
        let sensors = setup_sensors(&hass, &entry, &config, self.settings);
        info!(
            entry_id = %entry.entry_id,
            sensors = sensors.len(),
            locks = config.lock_entities.len(),
            "Started activity sensors"
        );

        if let Some(previous) = self
            .runtime
            .insert(entry.entry_id.clone(), EntryRuntime { sensors, listener })
        {
            warn!(entry_id = %entry.entry_id, "Entry was already running, stopping old sensors");
            shutdown_runtime(previous).await;
        }
        Ok(())
    }

    async fn unload_entry(&self, hass: Arc<HomeAssistant>, entry: ConfigEntry) -> bool {
        if let Some((_, runtime)) = self.runtime.remove(&entry.entry_id) {
            shutdown_runtime(runtime).await;
        }

        for device in hass.devices.get_by_config_entry_id(&entry.entry_id) {
            hass.devices.remove_config_entry(&device.id, &entry.entry_id);
        }
        debug!(entry_id = %entry.entry_id, "Unloaded entry");
        true
    }
}

async fn shutdown_runtime(runtime: EntryRuntime) {
    runtime.listener.stop().await;
    join_all(runtime.sensors.into_iter().map(OperationSensor::shutdown)).await;
}
