use std::time::Duration;

pub const DOMAIN: &str = "yalexs_ble_activity";

/// Domain of the integration that owns the locks
pub const YALEXSBLE_DOMAIN: &str = "yalexs_ble";
pub const LOCK_DOMAIN: &str = "lock";
pub const SENSOR_DOMAIN: &str = "sensor";

/// Where compatibility patches for a library release live; `{version}` is
/// replaced with the installed release
pub const YALEXSBLE_PATCH_URL: &str =
    "git+https://github.com/wbyoung/yalexs-ble@yalexs-ble-{version}-patches";

pub const ATTR_REMOTE_TYPE: &str = "remote_type";
pub const ATTR_SLOT: &str = "slot";
pub const ATTR_SOURCE: &str = "source";
pub const ATTR_TIMESTAMP: &str = "timestamp";

pub const CONF_LOCK_ENTITIES: &str = "lock_entities";

/// Bus event fired for every raw activity
pub const EVENT_ACTIVITY: &str = "yalexs_ble_activity";

pub const ENTRY_TITLE: &str = "Yale Access Bluetooth Activity";

pub const OPERATION_SENSOR_WRITE_DELAY: Duration = Duration::from_secs(2);
pub const OPERATION_SENSOR_ICON: &str = "mdi:lock-clock";
pub const OPERATION_SENSOR_KEY: &str = "operation";
