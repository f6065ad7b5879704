//! Recorder queue
//!
//! Integrations hand `state_changed` events to the recorder for history
//! storage without putting them on the bus. Queued events sit in order until
//! [`RecorderQueue::commit`] moves them into per-entity history, sorted by
//! when the state was recorded rather than when it was queued.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use hass_core::events::StateChangedData;
use hass_core::{Event, State};
use hass_event_bus::EventBus;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Accepts events for asynchronous history recording
pub trait Recorder: Send + Sync {
    fn queue_event(&self, event: Event<StateChangedData>);
}

#[derive(Default)]
pub struct RecorderQueue {
    queue: Mutex<VecDeque<Event<StateChangedData>>>,
    history: DashMap<String, Vec<State>>,
}

impl RecorderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events waiting to be committed, oldest first
    pub fn queued(&self) -> Vec<Event<StateChangedData>> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Move queued events into history, returning how many were written
    pub fn commit(&self) -> usize {
        let drained: Vec<_> = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let count = drained.len();
        for event in drained {
            let Some(new_state) = event.data.new_state else {
                continue;
            };
            let mut states = self
                .history
                .entry(event.data.entity_id.to_string())
                .or_default();
            let at = states.partition_point(|s| s.last_updated <= new_state.last_updated);
            states.insert(at, new_state);
        }

        if count > 0 {
            debug!(count, "Committed recorder queue");
        }
        count
    }

    /// Committed history of an entity, oldest first
    pub fn history(&self, entity_id: &str) -> Vec<State> {
        self.history
            .get(entity_id)
            .map(|states| states.clone())
            .unwrap_or_default()
    }

    /// Queue every `state_changed` fired on the bus
    pub fn listen(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe_typed::<StateChangedData>();
        let recorder = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => recorder.queue_event(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Recorder fell behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Recorder for RecorderQueue {
    fn queue_event(&self, event: Event<StateChangedData>) {
        trace!(entity_id = %event.data.entity_id, "Queueing state for recording");
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(event);
    }
}
