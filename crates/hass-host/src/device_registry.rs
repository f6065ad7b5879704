//! Device Registry
//!
//! Devices are keyed by `(domain, id)` identifiers and keep the list of
//! config entries that contribute entities to them. A device whose last
//! config entry goes away is removed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A device identifier (domain, id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier(pub String, pub String);

impl DeviceIdentifier {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self(domain.into(), id.into())
    }

    pub fn domain(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        &self.1
    }
}

/// Descriptive device fields supplied by an integration
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub identifiers: Vec<DeviceIdentifier>,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub sw_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    #[serde(default)]
    pub identifiers: Vec<DeviceIdentifier>,
    /// Associated config entries, in the order they were added
    #[serde(default)]
    pub config_entries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl DeviceEntry {
    fn new(info: DeviceInfo) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            identifiers: info.identifiers,
            config_entries: Vec::new(),
            name: info.name,
            manufacturer: info.manufacturer,
            model: info.model,
            serial_number: info.serial_number,
            sw_version: info.sw_version,
            created_at: now,
            modified_at: now,
        }
    }
}

#[derive(Default)]
pub struct DeviceRegistry {
    by_id: DashMap<String, Arc<DeviceEntry>>,
    by_identifier: DashMap<DeviceIdentifier, String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_id.get(device_id).map(|r| Arc::clone(r.value()))
    }

    pub fn get_by_identifier(&self, domain: &str, id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_identifier
            .get(&DeviceIdentifier::new(domain, id))
            .and_then(|device_id| self.get(&device_id))
    }

    pub fn get_by_config_entry_id(&self, config_entry_id: &str) -> Vec<Arc<DeviceEntry>> {
        self.by_id
            .iter()
            .filter(|r| r.config_entries.iter().any(|id| id == config_entry_id))
            .map(|r| Arc::clone(r.value()))
            .collect()
    }

    /// Find the device matching any of the identifiers, or create it,
    /// and link it to the config entry
    pub fn get_or_create(&self, config_entry_id: &str, info: DeviceInfo) -> Arc<DeviceEntry> {
        let existing = info
            .identifiers
            .iter()
            .find_map(|ident| self.by_identifier.get(ident).and_then(|id| self.get(&id)));

        let entry = match existing {
            Some(entry) => entry,
            None => {
                let entry = Arc::new(DeviceEntry::new(info));
                for ident in &entry.identifiers {
                    self.by_identifier.insert(ident.clone(), entry.id.clone());
                }
                info!("Registered new device: {}", entry.id);
                entry
            }
        };

        if entry.config_entries.iter().any(|id| id == config_entry_id) {
            return entry;
        }
        let mut linked = (*entry).clone();
        linked.config_entries.push(config_entry_id.to_string());
        linked.modified_at = Utc::now();
        let linked = Arc::new(linked);
        self.by_id.insert(linked.id.clone(), Arc::clone(&linked));
        linked
    }

    /// Link a config entry to a device, returning the updated device
    pub fn add_config_entry(
        &self,
        device_id: &str,
        config_entry_id: &str,
    ) -> Option<Arc<DeviceEntry>> {
        let mut slot = self.by_id.get_mut(device_id)?;
        if !slot.config_entries.iter().any(|id| id == config_entry_id) {
            let mut entry = (**slot).clone();
            entry.config_entries.push(config_entry_id.to_string());
            entry.modified_at = Utc::now();
            *slot = Arc::new(entry);
            debug!(device_id, config_entry_id, "Linked config entry to device");
        }
        Some(Arc::clone(&slot))
    }

    /// Unlink a config entry from a device
    ///
    /// Returns the updated device, or `None` when the device no longer
    /// exists afterwards.
    pub fn remove_config_entry(
        &self,
        device_id: &str,
        config_entry_id: &str,
    ) -> Option<Arc<DeviceEntry>> {
        let updated = {
            let mut slot = self.by_id.get_mut(device_id)?;
            let mut entry = (**slot).clone();
            entry.config_entries.retain(|id| id != config_entry_id);
            entry.modified_at = Utc::now();
            let entry = Arc::new(entry);
            *slot = Arc::clone(&entry);
            entry
        };
        debug!(device_id, config_entry_id, "Unlinked config entry from device");

        if updated.config_entries.is_empty() {
            self.remove(device_id);
            return None;
        }
        Some(updated)
    }

    pub fn remove(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        let (_, entry) = self.by_id.remove(device_id)?;
        for ident in &entry.identifiers {
            self.by_identifier.remove(ident);
        }
        info!("Removed device: {}", device_id);
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
