//! Test host
//!
//! An isolated [`HomeAssistant`] in a temporary config directory with the
//! activity integration registered.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hass_core::State;
use hass_event_bus::JsonEvent;
use hass_host::{ConfigEntriesResult, ConfigEntry, HomeAssistant};
use serde_json::json;
use tempfile::TempDir;
use yalexs_ble::ActivityEvent;
use yalexs_ble_activity::consts::{ENTRY_TITLE, EVENT_ACTIVITY, OPERATION_SENSOR_WRITE_DELAY};
use yalexs_ble_activity::{SensorSettings, YaleXSBLEActivity, DOMAIN};

use super::{MockCompat, MockLock};

pub struct TestHomeAssistant {
    pub hass: Arc<HomeAssistant>,
    pub integration: Arc<YaleXSBLEActivity>,
    pub compat: Arc<MockCompat>,
    config_dir: TempDir,
}

impl TestHomeAssistant {
    pub fn new() -> Self {
        Self::with_compat(MockCompat::compatible())
    }

    pub fn with_compat(compat: MockCompat) -> Self {
        Self::in_dir(TempDir::new().unwrap(), Arc::new(compat))
    }

    fn in_dir(config_dir: TempDir, compat: Arc<MockCompat>) -> Self {
        let hass = Arc::new(HomeAssistant::new(config_dir.path()));
        let integration = Arc::new(YaleXSBLEActivity::new(
            compat.clone(),
            SensorSettings::default(),
        ));
        yalexs_ble_activity::register(&hass, Arc::clone(&integration));

        Self {
            hass,
            integration,
            compat,
            config_dir,
        }
    }

    /// Stop the host and start a new one from what it stored
    ///
    /// Locks live in memory only; add them again after restarting.
    pub async fn restart(self) -> Self {
        self.hass.stop().await.unwrap();
        let restarted = Self::in_dir(self.config_dir, self.compat);
        restarted.hass.load().await.unwrap();
        restarted
    }

    /// Add an activity entry tracking `locks` and set it up
    pub async fn setup_activity_entry(&self, locks: &[&str]) -> (ConfigEntry, ConfigEntriesResult<()>) {
        let entry = self
            .hass
            .config_entries
            .add(
                ConfigEntry::new(DOMAIN, ENTRY_TITLE)
                    .with_data(HashMap::from([("lock_entities".to_string(), json!(locks))])),
            )
            .await
            .unwrap();
        let result = self.hass.setup_entry(&entry.entry_id).await;
        (self.entry(&entry.entry_id), result)
    }

    pub fn entry(&self, entry_id: &str) -> ConfigEntry {
        self.hass.config_entries.get(entry_id).unwrap()
    }

    pub fn activity_entry(&self) -> ConfigEntry {
        self.hass
            .config_entries
            .get_by_domain(DOMAIN)
            .into_iter()
            .next()
            .unwrap()
    }

    pub fn state(&self, entity_id: &str) -> State {
        self.hass
            .states
            .get(entity_id)
            .unwrap_or_else(|| panic!("no state for {entity_id}"))
    }

    pub fn assert_state(&self, entity_id: &str, expected: &str) {
        let state = self.hass.states.get_state(entity_id);
        assert_eq!(
            state.as_deref(),
            Some(expected),
            "Expected entity {} to be in state '{}', but was {:?}",
            entity_id,
            expected,
            state
        );
    }

    /// Dispatch an activity and wait until its sensor has handled it
    pub async fn deliver(&self, lock: &MockLock, activity: ActivityEvent) -> JsonEvent {
        let mut activity_rx = self.hass.bus.subscribe(EVENT_ACTIVITY);
        lock.dispatch(activity);
        activity_rx.recv().await.unwrap()
    }

    /// Let the write delay pass so pending activity is written
    pub async fn wait_for_write(&self) {
        tokio::time::sleep(OPERATION_SENSOR_WRITE_DELAY + Duration::from_millis(1)).await;
    }

    /// Let time pass without reaching the write delay
    pub async fn wait_under_write_delay(&self) {
        tokio::time::sleep(OPERATION_SENSOR_WRITE_DELAY / 2).await;
    }
}

impl Default for TestHomeAssistant {
    fn default() -> Self {
        Self::new()
    }
}
