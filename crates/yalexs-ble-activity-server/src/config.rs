//! Harness configuration
//!
//! Read from `configuration.yaml` in the config directory:
//!
//! ```yaml
//! write_delay_secs: 2
//! locks:
//!   - name: Front Door
//!     address: "AA:BB:CC:DD:EE:01"
//!   - name: Back Door
//!     address: "AA:BB:CC:DD:EE:02"
//!     entity_id: lock.back
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use hass_core::{slugify, EntityId};
use serde::Deserialize;
use yalexs_ble_activity::consts::OPERATION_SENSOR_WRITE_DELAY;
use yalexs_ble_activity::SensorSettings;

pub const CONFIG_FILE: &str = "configuration.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LockConfig {
    pub name: String,
    pub address: String,
    /// Defaults to `lock.<slugified name>`
    #[serde(default)]
    pub entity_id: Option<String>,
}

impl LockConfig {
    pub fn entity_id(&self) -> Result<EntityId> {
        match &self.entity_id {
            Some(entity_id) => entity_id
                .parse::<EntityId>()
                .with_context(|| format!("invalid entity id for lock {}", self.name)),
            None => EntityId::new("lock", slugify(&self.name))
                .with_context(|| format!("cannot derive an entity id for lock {}", self.name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub locks: Vec<LockConfig>,
    #[serde(default = "default_write_delay_secs")]
    pub write_delay_secs: u64,
}

fn default_write_delay_secs() -> u64 {
    OPERATION_SENSOR_WRITE_DELAY.as_secs()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            locks: Vec::new(),
            write_delay_secs: default_write_delay_secs(),
        }
    }
}

impl HarnessConfig {
    /// Load from the config directory; a missing file means no locks
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn sensor_settings(&self) -> SensorSettings {
        SensorSettings {
            write_delay: Duration::from_secs(self.write_delay_secs),
        }
    }
}
