//! Current entity states
//!
//! Every write fires a `state_changed` event on the bus, which is also what
//! the recorder listens to for live history.

use std::sync::Arc;

use dashmap::DashMap;
use hass_core::events::StateChangedData;
use hass_core::{Attributes, Context, EntityId, State};
use hass_event_bus::EventBus;
use tracing::{debug, instrument};

pub struct StateStore {
    /// All entity states keyed by entity_id string
    states: DashMap<String, State>,
    event_bus: Arc<EventBus>,
}

impl StateStore {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            event_bus,
        }
    }

    /// Write the state of an entity
    ///
    /// `last_changed` only moves when the value differs from the current one.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: Attributes,
        context: Context,
    ) -> State {
        let key = entity_id.to_string();
        let old_state = self.states.get(&key).map(|s| s.clone());

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context.clone()),
            None => State::new(entity_id.clone(), state, attributes, context.clone()),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map(|s| s.state != new_state.state).unwrap_or(true),
            "Setting entity state"
        );

        self.states.insert(key, new_state.clone());

        self.event_bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state,
                new_state: Some(new_state.clone()),
            },
            context,
        );

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// The state value, or None when the entity has no state
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.get_state(entity_id).as_deref() == Some(state)
    }

    pub fn all(&self) -> Vec<State> {
        self.states.iter().map(|r| r.value().clone()).collect()
    }

    /// Remove an entity's state, firing `state_changed` with no new state
    pub fn remove(&self, entity_id: &str, context: Context) -> Option<State> {
        let (_, old_state) = self.states.remove(entity_id)?;

        debug!(entity_id, "Removing entity state");
        self.event_bus.fire_typed(
            StateChangedData {
                entity_id: old_state.entity_id.clone(),
                old_state: Some(old_state.clone()),
                new_state: None,
            },
            context,
        );

        Some(old_state)
    }
}
