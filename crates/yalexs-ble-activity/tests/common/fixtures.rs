//! Activity fixtures

use chrono::{DateTime, Duration, TimeZone, Utc};
use yalexs_ble::{
    ActivityEvent, DoorActivity, DoorStatus, LockActivity, LockOperationRemoteType,
    LockOperationSource, LockStatus, UnrecognizedActivity,
};

/// Fixed wall-clock time activity is stamped with
pub fn mock_utc_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, 10, 51, 32).unwrap() + Duration::microseconds(3245)
}

pub const MOCK_UTC_NOW_ISO: &str = "2025-05-20T10:51:32.003245Z";

pub fn seconds_after(seconds: i64) -> DateTime<Utc> {
    mock_utc_now() + Duration::seconds(seconds)
}

pub fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

pub fn lock_activity(
    status: LockStatus,
    source: LockOperationSource,
    remote_type: Option<LockOperationRemoteType>,
    slot: Option<u32>,
    timestamp: DateTime<Utc>,
) -> ActivityEvent {
    ActivityEvent::Lock(LockActivity {
        timestamp,
        status,
        source,
        remote_type,
        slot,
    })
}

/// Unlocked with a keypad code
pub fn pin_unlock(timestamp: DateTime<Utc>) -> ActivityEvent {
    lock_activity(
        LockStatus::Unlocked,
        LockOperationSource::Pin,
        Some(LockOperationRemoteType::Unknown),
        Some(3),
        timestamp,
    )
}

pub fn auto_lock(timestamp: DateTime<Utc>) -> ActivityEvent {
    lock_activity(
        LockStatus::Locked,
        LockOperationSource::AutoLock,
        None,
        None,
        timestamp,
    )
}

/// Locked from the app over Bluetooth
pub fn remote_lock(timestamp: DateTime<Utc>) -> ActivityEvent {
    lock_activity(
        LockStatus::Locked,
        LockOperationSource::Remote,
        Some(LockOperationRemoteType::Ble),
        None,
        timestamp,
    )
}

pub fn door(status: DoorStatus, timestamp: DateTime<Utc>) -> ActivityEvent {
    ActivityEvent::Door(DoorActivity { timestamp, status })
}

pub fn unrecognized(timestamp: DateTime<Utc>) -> ActivityEvent {
    ActivityEvent::Unrecognized(UnrecognizedActivity {
        timestamp,
        kind: "battery_level".to_string(),
    })
}
