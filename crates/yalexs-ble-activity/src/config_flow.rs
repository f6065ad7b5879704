//! Config and options flows
//!
//! Both flows ask for a single thing: which Yale Access Bluetooth lock
//! entities to track.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hass_host::{ConfigEntryUpdate, FlowError, FlowHandler, FlowResult, FormField, HomeAssistant};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::consts::{CONF_LOCK_ENTITIES, DOMAIN, ENTRY_TITLE, LOCK_DOMAIN, YALEXSBLE_DOMAIN};

pub const STEP_USER: &str = "user";
pub const STEP_INIT: &str = "init";

pub const ERROR_NO_LOCK_ENTITIES: &str = "no_lock_entities";
pub const ERROR_INVALID_LOCK_ENTITY: &str = "invalid_lock_entity";

#[derive(Debug, Default, Deserialize)]
struct LockEntitiesInput {
    #[serde(default)]
    lock_entities: Vec<String>,
}

fn lock_entities_schema(suggested: Option<Value>) -> Vec<FormField> {
    vec![FormField {
        name: CONF_LOCK_ENTITIES.to_string(),
        field_type: "select".to_string(),
        required: Some(true),
        suggested_value: suggested,
        selector: Some(json!({
            "entity": {
                "integration": YALEXSBLE_DOMAIN,
                "domain": [LOCK_DOMAIN],
                "multiple": true,
            }
        })),
    }]
}

/// Check submitted lock entities against the entity registry
fn validate_lock_entities(hass: &HomeAssistant, input: &Value) -> Result<HashMap<String, String>, FlowError> {
    let input = LockEntitiesInput::deserialize(input)?;
    let mut errors = HashMap::new();

    if input.lock_entities.is_empty() {
        errors.insert(CONF_LOCK_ENTITIES.to_string(), ERROR_NO_LOCK_ENTITIES.to_string());
        return Ok(errors);
    }

    let all_valid = input.lock_entities.iter().all(|entity_id| {
        hass.entities.get(entity_id).is_some_and(|entry| {
            entry.domain() == LOCK_DOMAIN && entry.platform == YALEXSBLE_DOMAIN
        })
    });
    if !all_valid {
        errors.insert(CONF_LOCK_ENTITIES.to_string(), ERROR_INVALID_LOCK_ENTITY.to_string());
    }
    Ok(errors)
}

pub struct ActivityConfigFlow {
    hass: Arc<HomeAssistant>,
}

impl ActivityConfigFlow {
    pub fn new(hass: Arc<HomeAssistant>) -> Self {
        Self { hass }
    }
}

#[async_trait]
impl FlowHandler for ActivityConfigFlow {
    async fn step(&self, step_id: &str, user_input: Option<Value>) -> Result<FlowResult, FlowError> {
        if step_id != STEP_USER {
            return Err(FlowError::UnknownStep(step_id.to_string()));
        }

        let Some(input) = user_input else {
            return Ok(FlowResult::form(DOMAIN, STEP_USER, lock_entities_schema(None)));
        };

        let errors = validate_lock_entities(&self.hass, &input)?;
        if !errors.is_empty() {
            debug!(?errors, "Rejected lock entities");
            return Ok(
                FlowResult::form(DOMAIN, STEP_USER, lock_entities_schema(Some(input))).with_errors(errors),
            );
        }

        Ok(FlowResult::create_entry(DOMAIN, ENTRY_TITLE, input))
    }
}

/// Change the tracked locks of an existing entry
pub struct ActivityOptionsFlow {
    hass: Arc<HomeAssistant>,
    entry_id: String,
}

impl ActivityOptionsFlow {
    pub fn new(hass: Arc<HomeAssistant>, entry_id: impl Into<String>) -> Self {
        Self {
            hass,
            entry_id: entry_id.into(),
        }
    }

    fn current_data(&self) -> Result<HashMap<String, Value>, FlowError> {
        self.hass
            .config_entries
            .get(&self.entry_id)
            .map(|entry| entry.data)
            .ok_or_else(|| hass_host::ConfigEntriesError::NotFound(self.entry_id.clone()).into())
    }
}

#[async_trait]
impl FlowHandler for ActivityOptionsFlow {
    async fn step(&self, step_id: &str, user_input: Option<Value>) -> Result<FlowResult, FlowError> {
        if step_id != STEP_INIT {
            return Err(FlowError::UnknownStep(step_id.to_string()));
        }

        let mut data = self.current_data()?;
        let Some(input) = user_input else {
            let suggested = data.get(CONF_LOCK_ENTITIES).cloned();
            return Ok(FlowResult::form(DOMAIN, STEP_INIT, lock_entities_schema(suggested)));
        };

        let errors = validate_lock_entities(&self.hass, &input)?;
        if !errors.is_empty() {
            return Ok(
                FlowResult::form(DOMAIN, STEP_INIT, lock_entities_schema(Some(input))).with_errors(errors),
            );
        }

        if let Value::Object(submitted) = input {
            data.extend(submitted);
        }
        self.hass
            .config_entries
            .update(&self.entry_id, ConfigEntryUpdate::new().data(data))
            .await?;

        Ok(FlowResult::create_entry(DOMAIN, "", json!({})))
    }
}
