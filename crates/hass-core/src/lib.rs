//! Host platform types
//!
//! The activity integration runs inside a home-automation host. This crate
//! holds the vocabulary shared between the host adapters and the integration:
//! entity ids, states, bus events and the contexts that tie them together.

mod context;
mod entity_id;
mod event;
mod state;

pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use event::{Event, EventData, EventOrigin, EventType};
pub use state::{Attributes, State};

/// State value shown before an entity has produced a value
pub const STATE_UNKNOWN: &str = "unknown";

/// State value shown when an entity cannot produce a value
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Standard event types fired by the host
pub mod events {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use super::*;

    /// Fired whenever an entity state is written
    pub const STATE_CHANGED: &str = "state_changed";

    /// Fired when the entity registry creates, updates or removes an entry
    pub const ENTITY_REGISTRY_UPDATED: &str = "entity_registry_updated";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }

    /// What happened to an entity registry entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum RegistryAction {
        Create,
        Update,
        Remove,
    }

    /// Data for ENTITY_REGISTRY_UPDATED events
    ///
    /// `changes` maps each modified field to its previous value. A rename
    /// carries `entity_id` in `changes` and the previous id in
    /// `old_entity_id`.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EntityRegistryUpdatedData {
        pub action: RegistryAction,
        pub entity_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub old_entity_id: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        pub changes: BTreeMap<String, serde_json::Value>,
    }

    impl EntityRegistryUpdatedData {
        pub fn created(entity_id: impl Into<String>) -> Self {
            Self {
                action: RegistryAction::Create,
                entity_id: entity_id.into(),
                old_entity_id: None,
                changes: BTreeMap::new(),
            }
        }

        pub fn removed(entity_id: impl Into<String>) -> Self {
            Self {
                action: RegistryAction::Remove,
                entity_id: entity_id.into(),
                old_entity_id: None,
                changes: BTreeMap::new(),
            }
        }

        /// Whether this update renamed the entity
        pub fn is_rename(&self) -> bool {
            self.action == RegistryAction::Update && self.changes.contains_key("entity_id")
        }
    }

    impl EventData for EntityRegistryUpdatedData {
        fn event_type() -> &'static str {
            ENTITY_REGISTRY_UPDATED
        }
    }
}
