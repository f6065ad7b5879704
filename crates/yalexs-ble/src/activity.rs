//! Activity reports pushed by a lock

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            /// Upper-case symbolic name, e.g. `AUTO_LOCK`
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

status_enum! {
    LockStatus {
        Unknown => "UNKNOWN",
        Unlocking => "UNLOCKING",
        Unlocked => "UNLOCKED",
        Locking => "LOCKING",
        Locked => "LOCKED",
        Jammed => "JAMMED",
        SecureMode => "SECUREMODE",
    }
}

status_enum! {
    DoorStatus {
        Unknown => "UNKNOWN",
        Closed => "CLOSED",
        Ajar => "AJAR",
        Opened => "OPENED",
        Disabled => "DISABLED",
    }
}

status_enum! {
    /// What operated the lock
    LockOperationSource {
        Unknown => "UNKNOWN",
        Manual => "MANUAL",
        AutoLock => "AUTO_LOCK",
        Pin => "PIN",
        Remote => "REMOTE",
        Fingerprint => "FINGERPRINT",
    }
}

status_enum! {
    /// Transport of a remote operation
    LockOperationRemoteType {
        Unknown => "UNKNOWN",
        Ble => "BLE",
        Wifi => "WIFI",
        Autounlock => "AUTOUNLOCK",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorActivity {
    pub timestamp: DateTime<Utc>,
    pub status: DoorStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockActivity {
    pub timestamp: DateTime<Utc>,
    pub status: LockStatus,
    pub source: LockOperationSource,
    #[serde(default)]
    pub remote_type: Option<LockOperationRemoteType>,
    /// Keypad or credential slot that operated the lock
    #[serde(default)]
    pub slot: Option<u32>,
}

/// An activity kind this library does not model yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrecognizedActivity {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
}

/// One activity report from a lock
///
/// Reports are tagged by `type`. A type this library does not model yet
/// still reads as [`ActivityEvent::Unrecognized`] with the type as its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ActivityEvent {
    Door(DoorActivity),
    Lock(LockActivity),
    Unrecognized(UnrecognizedActivity),
}

impl ActivityEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ActivityEvent::Door(door) => door.timestamp,
            ActivityEvent::Lock(lock) => lock.timestamp,
            ActivityEvent::Unrecognized(other) => other.timestamp,
        }
    }
}

#[derive(Deserialize)]
struct Timestamped {
    timestamp: DateTime<Utc>,
}

impl<'de> Deserialize<'de> for ActivityEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "activity type must be a string, got {other}"
                )))
            }
            None => return Err(de::Error::missing_field("type")),
        };
        let fields = Value::Object(fields);

        let activity = match kind.as_str() {
            "door" => DoorActivity::deserialize(fields).map(ActivityEvent::Door),
            "lock" => LockActivity::deserialize(fields).map(ActivityEvent::Lock),
            "unrecognized" => {
                UnrecognizedActivity::deserialize(fields).map(ActivityEvent::Unrecognized)
            }
            _ => Timestamped::deserialize(fields).map(|Timestamped { timestamp }| {
                ActivityEvent::Unrecognized(UnrecognizedActivity { timestamp, kind })
            }),
        };
        activity.map_err(de::Error::custom)
    }
}

impl From<DoorActivity> for ActivityEvent {
    fn from(activity: DoorActivity) -> Self {
        ActivityEvent::Door(activity)
    }
}

impl From<LockActivity> for ActivityEvent {
    fn from(activity: LockActivity) -> Self {
        ActivityEvent::Lock(activity)
    }
}
