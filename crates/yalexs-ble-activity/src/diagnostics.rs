use std::collections::HashSet;

use hass_host::diagnostics::redact_data;
use hass_host::ConfigEntry;
use serde_json::Value;

/// Entry keys hidden from diagnostics; nothing in the entry is sensitive
const TO_REDACT: [&str; 0] = [];

pub fn config_entry_diagnostics(entry: &ConfigEntry) -> Result<Value, serde_json::Error> {
    let to_redact: HashSet<&str> = TO_REDACT.into_iter().collect();
    Ok(redact_data(&entry.as_dict()?, &to_redact))
}
