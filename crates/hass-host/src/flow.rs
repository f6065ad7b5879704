//! Config and options flows
//!
//! A flow is a short conversation with the user: each step either shows a
//! form (optionally with per-field errors), finishes by creating an entry,
//! or aborts.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config_entries::ConfigEntriesError;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Unknown flow step: {0}")]
    UnknownStep(String),

    #[error("Flow for {0} did not finish with an entry")]
    NotFinished(String),

    #[error("Invalid user input: {0}")]
    InvalidInput(#[from] serde_json::Error),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// Result of a flow step
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    /// Integration domain
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub data_schema: Vec<FormField>,
    /// Field name (or `base`) to error key
    pub errors: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Entry data, for create_entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl FlowResult {
    pub fn form(handler: impl Into<String>, step_id: impl Into<String>, schema: Vec<FormField>) -> Self {
        Self {
            handler: handler.into(),
            result_type: FlowResultType::Form,
            step_id: Some(step_id.into()),
            data_schema: schema,
            errors: None,
            title: None,
            reason: None,
            data: None,
        }
    }

    pub fn create_entry(
        handler: impl Into<String>,
        title: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            handler: handler.into(),
            result_type: FlowResultType::CreateEntry,
            step_id: None,
            data_schema: Vec::new(),
            errors: None,
            title: Some(title.into()),
            reason: None,
            data: Some(data),
        }
    }

    pub fn abort(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            result_type: FlowResultType::Abort,
            step_id: None,
            data_schema: Vec::new(),
            errors: None,
            title: None,
            reason: Some(reason.into()),
            data: None,
        }
    }

    pub fn with_errors(mut self, errors: HashMap<String, String>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Pre-filled value that is not applied unless submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_value: Option<serde_json::Value>,
    /// Widget hints, e.g. `{"entity": {"domain": "lock", "multiple": true}}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<serde_json::Value>,
}

/// One integration's flow
#[async_trait]
pub trait FlowHandler: Send + Sync {
    /// Run a step; `None` input asks for the step's form
    async fn step(
        &self,
        step_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowResult, FlowError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_serialization() {
        let result = FlowResult::form(
            "yalexs_ble_activity",
            "user",
            vec![FormField {
                name: "lock_entities".to_string(),
                field_type: "select".to_string(),
                required: Some(true),
                suggested_value: None,
                selector: Some(json!({"entity": {"domain": "lock", "multiple": true}})),
            }],
        )
        .with_errors(HashMap::from([(
            "lock_entities".to_string(),
            "no_lock_entities".to_string(),
        )]));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "form");
        assert_eq!(json["step_id"], "user");
        assert_eq!(json["data_schema"][0]["selector"]["entity"]["domain"], "lock");
        assert_eq!(json["errors"]["lock_entities"], "no_lock_entities");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_create_entry() {
        let result = FlowResult::create_entry(
            "yalexs_ble_activity",
            "Yale Access Bluetooth Activity",
            json!({"lock_entities": ["lock.front_door"]}),
        );
        assert_eq!(result.result_type, FlowResultType::CreateEntry);
        assert_eq!(result.title.as_deref(), Some("Yale Access Bluetooth Activity"));
    }
}
