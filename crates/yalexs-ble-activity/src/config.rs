//! Integration configuration
//!
//! The tracked lock list lives in the config entry's data; the sensor write
//! delay is a host-side setting.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{CONF_LOCK_ENTITIES, OPERATION_SENSOR_WRITE_DELAY};
use crate::error::ActivityConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Tracked lock entity ids, in the order the user chose them
    pub lock_entities: Vec<String>,
}

impl ActivityConfig {
    pub fn from_entry_data(
        data: &HashMap<String, serde_json::Value>,
    ) -> Result<Self, ActivityConfigError> {
        let lock_entities = data
            .get(CONF_LOCK_ENTITIES)
            .ok_or(ActivityConfigError::Missing(CONF_LOCK_ENTITIES))?;
        Ok(Self {
            lock_entities: serde_json::from_value(lock_entities.clone())?,
        })
    }

    pub fn to_entry_data(&self) -> HashMap<String, serde_json::Value> {
        HashMap::from([(
            CONF_LOCK_ENTITIES.to_string(),
            serde_json::Value::from(self.lock_entities.clone()),
        )])
    }

    /// Swap one tracked id for another, keeping its position
    pub fn rename_lock_entity(&mut self, old_entity_id: &str, new_entity_id: &str) -> bool {
        let mut renamed = false;
        for entity_id in &mut self.lock_entities {
            if entity_id == old_entity_id {
                *entity_id = new_entity_id.to_string();
                renamed = true;
            }
        }
        renamed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSettings {
    /// How long an activity waits before it becomes the displayed state
    pub write_delay: Duration,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            write_delay: OPERATION_SENSOR_WRITE_DELAY,
        }
    }
}
