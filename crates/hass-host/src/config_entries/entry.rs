//! Config entry types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    #[default]
    NotLoaded,
    SetupInProgress,
    Loaded,
    /// Setup failed; the reason is kept on the entry
    SetupError,
    UnloadInProgress,
    FailedUnload,
}

impl ConfigEntryState {
    /// Whether the entry can be unloaded or reloaded from this state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigEntryState::Loaded | ConfigEntryState::SetupError | ConfigEntryState::NotLoaded
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    #[default]
    User,
    Import,
    Bluetooth,
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,

    /// Integration domain, e.g. `yalexs_ble_activity`
    pub domain: String,

    pub title: String,

    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_version")]
    pub minor_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Explanation for a failed state (not persisted)
    #[serde(skip, default)]
    pub reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string().to_lowercase(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            options: HashMap::new(),
            version: 1,
            minor_version: 1,
            unique_id: None,
            source: ConfigEntrySource::default(),
            state: ConfigEntryState::NotLoaded,
            reason: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_entry_id(mut self, entry_id: impl Into<String>) -> Self {
        self.entry_id = entry_id.into();
        self
    }

    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// The persisted fields as a JSON object, as shown in diagnostics
    pub fn as_dict(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Fields to change in [`super::ConfigEntries::update`]
#[derive(Debug, Clone, Default)]
pub struct ConfigEntryUpdate {
    pub title: Option<String>,
    pub data: Option<HashMap<String, serde_json::Value>>,
    pub options: Option<HashMap<String, serde_json::Value>>,
}

impl ConfigEntryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = Some(options);
        self
    }

    /// Apply to an entry, returning whether anything changed
    pub(crate) fn apply(self, entry: &mut ConfigEntry) -> bool {
        let mut changed = false;
        if let Some(title) = self.title {
            changed |= entry.title != title;
            entry.title = title;
        }
        if let Some(data) = self.data {
            changed |= entry.data != data;
            entry.data = data;
        }
        if let Some(options) = self.options {
            changed |= entry.options != options;
            entry.options = options;
        }
        if changed {
            entry.modified_at = Utc::now();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_dict_skips_runtime_fields() {
        let mut entry = ConfigEntry::new("yalexs_ble_activity", "Yale Access Bluetooth Activity")
            .with_data(HashMap::from([(
                "lock_entities".to_string(),
                json!(["lock.front_door"]),
            )]));
        entry.state = ConfigEntryState::Loaded;

        let dict = entry.as_dict().unwrap();
        assert_eq!(dict["domain"], "yalexs_ble_activity");
        assert_eq!(dict["data"]["lock_entities"], json!(["lock.front_door"]));
        assert_eq!(dict["source"], "user");
        assert!(dict.get("state").is_none());
    }

    #[test]
    fn test_update_reports_changes() {
        let mut entry = ConfigEntry::new("yalexs_ble_activity", "Activity");
        let data = HashMap::from([("lock_entities".to_string(), json!(["lock.a"]))]);

        assert!(ConfigEntryUpdate::new().data(data.clone()).apply(&mut entry));
        assert!(!ConfigEntryUpdate::new().data(data).apply(&mut entry));
        assert!(ConfigEntryUpdate::new().title("Renamed").apply(&mut entry));
        assert_eq!(entry.title, "Renamed");
    }

    #[test]
    fn test_recoverable_states() {
        assert!(ConfigEntryState::Loaded.is_recoverable());
        assert!(ConfigEntryState::SetupError.is_recoverable());
        assert!(!ConfigEntryState::UnloadInProgress.is_recoverable());
        assert!(!ConfigEntryState::FailedUnload.is_recoverable());
    }
}
