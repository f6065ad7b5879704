mod common;

use common::*;
use serde_json::json;
use yalexs_ble_activity::diagnostics::config_entry_diagnostics;

#[tokio::test]
async fn test_entry_diagnostics() {
    let test = TestHomeAssistant::new();
    let lock = add_mock_lock(&test.hass, "Front Door", FRONT_DOOR_ADDRESS).await;
    let (entry, result) = test.setup_activity_entry(&[&lock.entity_id]).await;
    result.unwrap();

    let diagnostics = config_entry_diagnostics(&entry).unwrap();
    assert_eq!(diagnostics["entry_id"], json!(entry.entry_id));
    assert_eq!(diagnostics["domain"], "yalexs_ble_activity");
    assert_eq!(diagnostics["title"], "Yale Access Bluetooth Activity");
    assert_eq!(diagnostics["data"], json!({"lock_entities": ["lock.front_door"]}));
    assert_eq!(diagnostics["options"], json!({}));
}
