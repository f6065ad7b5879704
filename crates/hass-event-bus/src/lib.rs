//! Broadcast event bus
//!
//! Every subscriber of an event type gets its own copy of each event fired
//! under that type. Firing never blocks and never fails: events fired while
//! nobody listens are dropped.

use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use hass_core::{Context, Event, EventData, EventType};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

pub type JsonEvent = Event<serde_json::Value>;

pub struct EventBus {
    /// One broadcast channel per event type, created on first subscription
    listeners: DashMap<EventType, broadcast::Sender<JsonEvent>>,
    match_all_sender: broadcast::Sender<JsonEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            capacity,
        }
    }

    /// Subscribe to one event type, or to everything with `*`
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<JsonEvent> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        if event_type.is_match_all() {
            return self.match_all_sender.subscribe();
        }

        self.listeners
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to a typed payload, skipping events whose data does not parse
    pub fn subscribe_typed<T>(&self) -> TypedEventReceiver<T>
    where
        T: EventData + serde::de::DeserializeOwned,
    {
        TypedEventReceiver {
            rx: self.subscribe(T::event_type()),
            _phantom: PhantomData,
        }
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<JsonEvent> {
        self.match_all_sender.subscribe()
    }

    pub fn fire(&self, event: JsonEvent) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // no receivers is fine
            let _ = sender.send(event.clone());
        }
        let _ = self.match_all_sender.send(event);
    }

    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        match Event::typed(data, context).into_json() {
            Ok(event) => self.fire(event),
            Err(err) => warn!(event_type = T::event_type(), %err, "Dropping unserializable event"),
        }
    }

    /// Number of event types that have been subscribed to
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<JsonEvent>,
    _phantom: PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    /// Wait for the next event whose payload parses as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Some(typed) = Self::parse(event) {
                return Ok(typed);
            }
        }
    }

    /// Take the next already-delivered event without waiting
    pub fn try_recv(&mut self) -> Result<Event<T>, broadcast::error::TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if let Some(typed) = Self::parse(event) {
                return Ok(typed);
            }
        }
    }

    fn parse(event: JsonEvent) -> Option<Event<T>> {
        let data = serde_json::from_value::<T>(event.data).ok()?;
        Some(Event {
            event_type: event.event_type,
            data,
            origin: event.origin,
            time_fired: event.time_fired,
            context: event.context,
        })
    }
}

pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use hass_core::events::{EntityRegistryUpdatedData, RegistryAction};
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("yalexs_ble_activity");

        bus.fire(Event::new(
            "yalexs_ble_activity",
            json!({"entity_id": "sensor.front_door_operation", "state": "door_ajar"}),
            Context::new(),
        ));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), "yalexs_ble_activity");
        assert_eq!(received.data["state"], "door_ajar");
    }

    #[tokio::test]
    async fn test_match_all_sees_every_type() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("*");

        bus.fire(Event::new("event_a", json!({}), Context::new()));
        bus.fire(Event::new("event_b", json!({}), Context::new()));

        assert_eq!(rx.recv().await.unwrap().event_type.as_str(), "event_a");
        assert_eq!(rx.recv().await.unwrap().event_type.as_str(), "event_b");
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<EntityRegistryUpdatedData>();

        bus.fire_typed(EntityRegistryUpdatedData::removed("lock.front_door"), Context::new());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data.action, RegistryAction::Remove);
        assert_eq!(received.data.entity_id, "lock.front_door");
    }

    #[tokio::test]
    async fn test_typed_subscription_skips_foreign_payloads() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<EntityRegistryUpdatedData>();

        bus.fire(Event::new(
            "entity_registry_updated",
            json!({"unexpected": true}),
            Context::new(),
        ));
        bus.fire_typed(EntityRegistryUpdatedData::created("lock.back_door"), Context::new());

        let received = rx.try_recv().unwrap();
        assert_eq!(received.data.entity_id, "lock.back_door");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_cross_event_pollution() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe("event_a");
        let mut rx_b = bus.subscribe("event_b");

        bus.fire(Event::new("event_a", json!({"type": "a"}), Context::new()));

        assert_eq!(rx_a.recv().await.unwrap().data["type"], "a");
        assert!(rx_b.try_recv().is_err());
        assert_eq!(bus.listener_count(), 2);
    }

    #[test]
    fn test_fire_without_listeners() {
        let bus = EventBus::new();
        bus.fire(Event::new("nobody_listens", json!(null), Context::new()));
    }
}
