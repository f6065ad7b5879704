//! Mock Yale Access Bluetooth locks
//!
//! A mock lock is what the lock integration would leave behind once set up:
//! a loaded `yalexs_ble` config entry holding [`LockData`], a device and a
//! `lock` entity on that device.

use std::collections::HashMap;
use std::sync::Arc;

use hass_core::{slugify, EntityId};
use hass_host::{ConfigEntry, ConfigEntryState, DeviceIdentifier, DeviceInfo, HomeAssistant};
use serde_json::json;
use yalexs_ble::{ActivityEvent, LockData, LockInfo, PushLock};

pub const FRONT_DOOR_ADDRESS: &str = "AA:BB:CC:DD:EE:01";
pub const BACK_DOOR_ADDRESS: &str = "AA:BB:CC:DD:EE:02";

pub struct MockLock {
    pub title: String,
    pub entity_id: String,
    pub entry_id: String,
    pub device_id: String,
    pub lock: Arc<PushLock>,
}

impl MockLock {
    pub fn dispatch(&self, activity: ActivityEvent) {
        self.lock.dispatch_activity(activity);
    }
}

/// Add a lock, reusing its config entry when one was stored for `address`
pub async fn add_mock_lock(hass: &HomeAssistant, title: &str, address: &str) -> MockLock {
    let stored = hass
        .config_entries
        .get_by_domain("yalexs_ble")
        .into_iter()
        .find(|entry| entry.unique_id.as_deref() == Some(address));
    let entry = match stored {
        Some(entry) => entry,
        None => hass
            .config_entries
            .add(
                ConfigEntry::new("yalexs_ble", title)
                    .with_unique_id(address)
                    .with_data(HashMap::from([
                        ("address".to_string(), json!(address)),
                        ("key".to_string(), json!("0123456789abcdef")),
                        ("slot".to_string(), json!(1)),
                    ])),
            )
            .await
            .unwrap(),
    };
    hass.config_entries
        .set_state(&entry.entry_id, ConfigEntryState::Loaded, None);

    let lock_info = LockInfo {
        manufacturer: "August Home Inc.".to_string(),
        model: "ASL-05".to_string(),
        serial: format!("M1FBA0{}", &address[address.len() - 2..]),
        firmware: "2.2.1".to_string(),
    };
    let device = hass.devices.get_or_create(
        &entry.entry_id,
        DeviceInfo {
            identifiers: vec![DeviceIdentifier::new("yalexs_ble", address)],
            name: Some(title.to_string()),
            manufacturer: Some(lock_info.manufacturer.clone()),
            model: Some(lock_info.model.clone()),
            serial_number: Some(lock_info.serial.clone()),
            sw_version: Some(lock_info.firmware.clone()),
        },
    );

    let entity = hass.entities.get_or_create(
        "yalexs_ble",
        &EntityId::new("lock", slugify(title)).unwrap(),
        Some(address),
        Some(&entry.entry_id),
        Some(&device.id),
    );

    let lock = Arc::new(PushLock::new(address, lock_info));
    hass.config_entries
        .set_runtime_data(&entry.entry_id, LockData::new(title, Arc::clone(&lock)));

    MockLock {
        title: title.to_string(),
        entity_id: entity.entity_id.clone(),
        entry_id: entry.entry_id,
        device_id: device.id.clone(),
        lock,
    }
}
