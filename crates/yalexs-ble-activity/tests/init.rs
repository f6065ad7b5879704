mod common;

use common::*;
use hass_core::events::StateChangedData;
use hass_host::issue_registry::EVENT_REPAIRS_ISSUE_REGISTRY_UPDATED;
use hass_host::{ConfigEntriesError, ConfigEntryState, IssueSeverity};
use hass_event_bus::TypedEventReceiver;
use serde_json::json;
use yalexs_ble_activity::DOMAIN;

const FRONT_SENSOR: &str = "sensor.front_door_operation";
const BACK_SENSOR: &str = "sensor.back_door_operation";

/// Wait until a sensor's state is written again after being removed
async fn wait_for_reattach(rx: &mut TypedEventReceiver<StateChangedData>, entity_id: &str) {
    let mut removed = false;
    loop {
        let event = rx.recv().await.unwrap();
        if event.data.entity_id.to_string() != entity_id {
            continue;
        }
        match event.data.new_state {
            None => removed = true,
            Some(_) if removed => return,
            Some(_) => {}
        }
    }
}

/// Wait until a sensor's state is first written
async fn wait_for_attach(rx: &mut TypedEventReceiver<StateChangedData>, entity_id: &str) {
    loop {
        let event = rx.recv().await.unwrap();
        if event.data.entity_id.to_string() == entity_id && event.data.old_state.is_none() {
            return;
        }
    }
}

#[tokio::test]
async fn test_setup_links_sensor_to_lock_device() {
    let test = TestHomeAssistant::new();
    let lock = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;

    let (entry, result) = test.setup_activity_entry(&[&lock.entity_id]).await;
    result.unwrap();
    assert_eq!(entry.state, ConfigEntryState::Loaded);
    assert_eq!(test.integration.sensor_entity_ids(&entry.entry_id), [FRONT_SENSOR]);

    let sensor = test.hass.entities.get(FRONT_SENSOR).unwrap();
    assert_eq!(sensor.platform, DOMAIN);
    assert_eq!(sensor.unique_id.as_deref(), Some("AA:BB:CC:DD:EE:01operation"));
    assert_eq!(sensor.config_entry_id.as_deref(), Some(entry.entry_id.as_str()));
    assert_eq!(sensor.device_id.as_deref(), Some(lock.device_id.as_str()));

    let device = test.hass.devices.get(&lock.device_id).unwrap();
    assert_eq!(device.config_entries, [lock.entry_id.clone(), entry.entry_id.clone()]);
    assert!(test.compat.installs().is_empty());
}

#[tokio::test]
async fn test_setup_skips_unresolvable_locks() {
    let test = TestHomeAssistant::new();
    let front = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;
    let back = add_mock_lock(&test.hass, "Back Door", BACK_DOOR_ADDRESS).await;
    test.hass.config_entries.clear_runtime_data(&back.entry_id);

    let (entry, result) = test
        .setup_activity_entry(&["lock.missing", &back.entity_id, &front.entity_id])
        .await;
    result.unwrap();

    assert_eq!(entry.state, ConfigEntryState::Loaded);
    assert_eq!(test.integration.sensor_entity_ids(&entry.entry_id), [FRONT_SENSOR]);
    assert!(test.hass.states.get(BACK_SENSOR).is_none());
}

#[tokio::test]
async fn test_setup_installs_patch_for_incompatible_library() {
    let test = TestHomeAssistant::with_compat(MockCompat::incompatible("2.6.0", true));
    let lock = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;

    let (entry, result) = test.setup_activity_entry(&[&lock.entity_id]).await;
    let message = "Restart required to use newly patched `yalexs_ble` package";
    assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(reason)) if reason == message));
    assert_eq!(entry.state, ConfigEntryState::SetupError);
    assert_eq!(entry.reason.as_deref(), Some(message));
    assert_eq!(
        test.compat.installs(),
        ["git+https://github.com/wbyoung/yalexs-ble@yalexs-ble-2.6.0-patches"]
    );
    assert!(test.hass.states.get(FRONT_SENSOR).is_none());
    assert_eq!(lock.lock.callback_count(), 0);
}

#[tokio::test]
async fn test_setup_without_available_patch() {
    let test = TestHomeAssistant::with_compat(MockCompat::incompatible("2.6.0", false));
    let lock = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;

    let (entry, result) = test.setup_activity_entry(&[&lock.entity_id]).await;
    assert!(result.is_err());
    assert_eq!(entry.state, ConfigEntryState::SetupError);
    assert_eq!(
        entry.reason.as_deref(),
        Some("No patches for `yalexs_ble==2.6.0`; one must be created")
    );
    assert_eq!(test.compat.installs().len(), 1);
}

#[tokio::test]
async fn test_setup_with_invalid_entry_data() {
    let test = TestHomeAssistant::new();
    let entry = test
        .hass
        .config_entries
        .add(
            hass_host::ConfigEntry::new(DOMAIN, "Yale Access Bluetooth Activity").with_data(
                std::collections::HashMap::from([("lock_entities".to_string(), json!("lock.front_door"))]),
            ),
        )
        .await
        .unwrap();

    assert!(test.hass.setup_entry(&entry.entry_id).await.is_err());
    let entry = test.entry(&entry.entry_id);
    assert_eq!(entry.state, ConfigEntryState::SetupError);
    assert!(entry.reason.unwrap().starts_with("Invalid configuration"));
}

#[tokio::test]
async fn test_tracked_lock_removed_raises_issue() {
    let test = TestHomeAssistant::new();
    let front = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;
    let back = add_mock_lock(&test.hass, "Back Door", BACK_DOOR_ADDRESS).await;
    test.setup_activity_entry(&[&front.entity_id]).await.1.unwrap();
    let mut issue_rx = test.hass.bus.subscribe(EVENT_REPAIRS_ISSUE_REGISTRY_UPDATED);

    test.hass.entities.remove(&back.entity_id);
    test.hass.entities.remove(&front.entity_id);

    let event = issue_rx.recv().await.unwrap();
    assert_eq!(event.data["issue_id"], "lock_entity_removed_lock.front_door");

    let issues = test.hass.issues.issues_for_domain(DOMAIN);
    assert_eq!(issues.len(), 1);
    let issue = &issues[0];
    assert!(issue.is_fixable);
    assert!(issue.is_persistent);
    assert_eq!(issue.severity, IssueSeverity::Warning);
    assert_eq!(issue.translation_key, "lock_entity_removed");
    assert_eq!(issue.translation_placeholders["entity_id"], "lock.front_door");
}

#[tokio::test]
async fn test_tracked_lock_renamed() {
    let test = TestHomeAssistant::new();
    let front = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;
    let back = add_mock_lock(&test.hass, "Back Door", BACK_DOOR_ADDRESS).await;
    let (entry, result) = test
        .setup_activity_entry(&[&front.entity_id, &back.entity_id])
        .await;
    result.unwrap();
    let mut states_rx = test.hass.bus.subscribe_typed::<StateChangedData>();

    test.hass
        .entities
        .update_entity_id("lock.front_door", "lock.porch_door")
        .unwrap();
    wait_for_reattach(&mut states_rx, FRONT_SENSOR).await;

    let entry = test.entry(&entry.entry_id);
    assert_eq!(
        entry.data["lock_entities"],
        json!(["lock.porch_door", "lock.back_door"])
    );
    assert_eq!(entry.state, ConfigEntryState::Loaded);
    assert_eq!(front.lock.callback_count(), 1);

    // the new id is tracked from now on
    let mut issue_rx = test.hass.bus.subscribe(EVENT_REPAIRS_ISSUE_REGISTRY_UPDATED);
    test.hass.entities.remove("lock.porch_door");
    let event = issue_rx.recv().await.unwrap();
    assert_eq!(event.data["issue_id"], "lock_entity_removed_lock.porch_door");
}

#[tokio::test]
async fn test_entry_update_reloads() {
    let test = TestHomeAssistant::new();
    let front = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;
    let back = add_mock_lock(&test.hass, "Back Door", BACK_DOOR_ADDRESS).await;
    let (entry, result) = test.setup_activity_entry(&[&front.entity_id]).await;
    result.unwrap();
    let mut states_rx = test.hass.bus.subscribe_typed::<StateChangedData>();

    let mut data = entry.data.clone();
    data.insert(
        "lock_entities".to_string(),
        json!([&front.entity_id, &back.entity_id]),
    );
    test.hass
        .config_entries
        .update(
            &entry.entry_id,
            hass_host::ConfigEntryUpdate::new().data(data),
        )
        .await
        .unwrap();
    wait_for_attach(&mut states_rx, BACK_SENSOR).await;

    assert_eq!(
        test.integration.sensor_entity_ids(&entry.entry_id).len(),
        2
    );
    assert_eq!(front.lock.callback_count(), 1);
    assert_eq!(back.lock.callback_count(), 1);
}

#[tokio::test]
async fn test_unload_releases_devices_and_sensors() {
    let test = TestHomeAssistant::new();
    let lock = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;
    let (entry, result) = test.setup_activity_entry(&[&lock.entity_id]).await;
    result.unwrap();

    assert!(test.hass.unload_entry(&entry.entry_id).await.unwrap());
    assert_eq!(test.entry(&entry.entry_id).state, ConfigEntryState::NotLoaded);

    let device = test.hass.devices.get(&lock.device_id).unwrap();
    assert_eq!(device.config_entries, [lock.entry_id.clone()]);
    assert!(test.hass.devices.get_by_config_entry_id(&entry.entry_id).is_empty());

    assert!(test.hass.states.get(FRONT_SENSOR).is_none());
    assert_eq!(lock.lock.callback_count(), 0);
    assert!(test.integration.sensor_entity_ids(&entry.entry_id).is_empty());

    // no longer tracking
    test.hass.entities.remove(&lock.entity_id);
    tokio::task::yield_now().await;
    assert!(test.hass.issues.is_empty());
}

#[tokio::test]
async fn test_setup_after_unload() {
    let test = TestHomeAssistant::new();
    let lock = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;
    let (entry, result) = test.setup_activity_entry(&[&lock.entity_id]).await;
    result.unwrap();

    test.hass.unload_entry(&entry.entry_id).await.unwrap();
    test.hass.setup_entry(&entry.entry_id).await.unwrap();

    test.assert_state(FRONT_SENSOR, "unknown");
    assert_eq!(lock.lock.callback_count(), 1);
    assert_eq!(test.hass.entities.get_by_config_entry_id(&entry.entry_id).len(), 1);
}
