//! Entity state snapshots

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, STATE_UNAVAILABLE, STATE_UNKNOWN};

/// Attribute mapping attached to a state
pub type Attributes = HashMap<String, serde_json::Value>;

/// The state of an entity at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,

    /// The state value, e.g. `lock_unlocked` or `unknown`
    pub state: String,

    #[serde(default)]
    pub attributes: Attributes,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state value or attributes were last written
    pub last_updated: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reported: Option<DateTime<Utc>>,

    pub context: Context,
}

impl State {
    /// Create a state stamped with the current time
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: Attributes,
        context: Context,
    ) -> Self {
        Self::recorded_at(entity_id, state, attributes, Utc::now(), context)
    }

    /// Create a state whose timestamps all point at `at`
    ///
    /// Used for history records describing something that happened earlier
    /// than the write itself.
    pub fn recorded_at(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: Attributes,
        at: DateTime<Utc>,
        context: Context,
    ) -> Self {
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: at,
            last_updated: at,
            last_reported: Some(at),
            context,
        }
    }

    /// Derive the next state, keeping `last_changed` when the value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: Attributes,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
            last_reported: Some(now),
            context,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    pub fn is_unknown(&self) -> bool {
        self.state == STATE_UNKNOWN
    }

    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // timestamps and context are bookkeeping
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}
