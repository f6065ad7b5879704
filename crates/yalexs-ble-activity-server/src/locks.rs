//! Simulated locks
//!
//! Each configured lock is registered the way the lock integration would
//! register a real one, so the activity integration can find it.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use hass_host::{ConfigEntry, ConfigEntryState, DeviceIdentifier, DeviceInfo, HomeAssistant};
use serde_json::json;
use tracing::info;
use yalexs_ble::{LockData, LockInfo, PushLock};
use yalexs_ble_activity::consts::YALEXSBLE_DOMAIN;

use crate::config::LockConfig;

/// Register a lock, returning its entity id and handle
pub async fn register_lock(hass: &HomeAssistant, config: &LockConfig) -> Result<(String, Arc<PushLock>)> {
    let stored = hass
        .config_entries
        .get_by_domain(YALEXSBLE_DOMAIN)
        .into_iter()
        .find(|entry| entry.unique_id.as_deref() == Some(config.address.as_str()));
    let entry = match stored {
        Some(entry) => entry,
        None => hass
            .config_entries
            .add(
                ConfigEntry::new(YALEXSBLE_DOMAIN, &config.name)
                    .with_unique_id(&config.address)
                    .with_data(HashMap::from([("address".to_string(), json!(config.address))])),
            )
            .await
            .with_context(|| format!("adding lock {}", config.name))?,
    };
    hass.config_entries
        .set_state(&entry.entry_id, ConfigEntryState::Loaded, None);

    let device = hass.devices.get_or_create(
        &entry.entry_id,
        DeviceInfo {
            identifiers: vec![DeviceIdentifier::new(YALEXSBLE_DOMAIN, &config.address)],
            name: Some(config.name.clone()),
            manufacturer: Some("August Home Inc.".to_string()),
            ..DeviceInfo::default()
        },
    );
    let entity = hass.entities.get_or_create(
        YALEXSBLE_DOMAIN,
        &config.entity_id()?,
        Some(&config.address),
        Some(&entry.entry_id),
        Some(&device.id),
    );

    let lock = Arc::new(PushLock::new(&config.address, LockInfo::default()));
    hass.config_entries
        .set_runtime_data(&entry.entry_id, LockData::new(&config.name, Arc::clone(&lock)));

    info!(entity_id = %entity.entity_id, address = %config.address, "Registered lock");
    Ok((entity.entity_id.clone(), lock))
}
