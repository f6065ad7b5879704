//! What an activity looks like as sensor state

use hass_core::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use yalexs_ble::ActivityEvent;

use crate::consts::{ATTR_REMOTE_TYPE, ATTR_SLOT, ATTR_SOURCE, ATTR_TIMESTAMP};

/// Display value and attributes derived from one activity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub value: Option<String>,
    pub attributes: Attributes,
}

impl Observation {
    /// Derive the observation for an activity
    ///
    /// Door activity becomes `door_<status>` and lock activity
    /// `lock_<status>`. Activity kinds without a mapping give no value and
    /// no attributes.
    pub fn from_activity(activity: &ActivityEvent) -> Self {
        match activity {
            ActivityEvent::Door(door) => Self {
                value: Some(format!("door_{}", door.status.name().to_lowercase())),
                attributes: Attributes::from([(
                    ATTR_TIMESTAMP.to_string(),
                    timestamp_value(activity),
                )]),
            },
            ActivityEvent::Lock(lock) => {
                let mut attributes = Attributes::from([
                    (ATTR_TIMESTAMP.to_string(), timestamp_value(activity)),
                    (
                        ATTR_SOURCE.to_string(),
                        Value::from(lock.source.name().to_lowercase()),
                    ),
                ]);
                if let Some(remote_type) = lock.remote_type {
                    attributes.insert(
                        ATTR_REMOTE_TYPE.to_string(),
                        Value::from(remote_type.name().to_lowercase()),
                    );
                }
                if let Some(slot) = lock.slot {
                    attributes.insert(ATTR_SLOT.to_string(), Value::from(slot));
                }
                Self {
                    value: Some(format!("lock_{}", lock.status.name().to_lowercase())),
                    attributes,
                }
            }
            _ => Self::default(),
        }
    }
}

fn timestamp_value(activity: &ActivityEvent) -> Value {
    Value::from(activity.timestamp().to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
}

/// Displayed state saved across restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoredSnapshot {
    pub value: Option<String>,
    pub attributes: Option<Attributes>,
}
