//! Operation sensor
//!
//! One sensor per tracked lock shows the lock's most recent operation. Each
//! sensor runs as its own task: the lock's activity callback only forwards
//! activity into the task's channel, and the task applies the debounce
//! transitions, fires the activity event, hands superseded activity to the
//! recorder and writes the displayed state once the write delay passes
//! quietly.

use std::sync::Arc;
use std::time::Duration;

use hass_core::{slugify, Attributes, Context, EntityId, EntityIdError, STATE_UNKNOWN};
use hass_event_bus::EventBus;
use hass_host::{ConfigEntry, HomeAssistant, Recorder, RestoreStateStore, StateStore};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};
use yalexs_ble::{ActivityEvent, ActivityRegistration, ConnectionInfo, LockData, LockInfo};

use crate::config::{ActivityConfig, SensorSettings};
use crate::consts::{
    DOMAIN, EVENT_ACTIVITY, OPERATION_SENSOR_ICON, OPERATION_SENSOR_KEY, SENSOR_DOMAIN,
};
use crate::debounce::{history_record, ActivityDebouncer};
use crate::observation::RestoredSnapshot;

/// Entity id for a lock's operation sensor, e.g. `sensor.front_door_operation`
pub fn operation_entity_id(lock_title: &str) -> Result<EntityId, EntityIdError> {
    EntityId::new(
        SENSOR_DOMAIN,
        format!("{}_{}", slugify(lock_title), OPERATION_SENSOR_KEY),
    )
}

pub fn operation_unique_id(address: &str) -> String {
    format!("{address}{OPERATION_SENSOR_KEY}")
}

/// Handle to a running operation sensor
pub struct OperationSensor {
    entity_id: EntityId,
    unique_id: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl OperationSensor {
    /// Attach a sensor to a lock and start it
    ///
    /// The activity callback is registered first, asking the lock to replay
    /// its current activity. The restored snapshot, if any, becomes the
    /// initial state before the task starts handling activity.
    pub fn attach(
        hass: &HomeAssistant,
        entity_id: EntityId,
        lock: &LockData,
        settings: SensorSettings,
    ) -> Self {
        let unique_id = operation_unique_id(lock.lock.address());
        let (activity_tx, activity_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let callback_entity = entity_id.clone();
        let registration = lock.lock.register_activity_callback(
            move |activity: &ActivityEvent, _: &LockInfo, _: &ConnectionInfo| {
                if activity_tx.send(activity.clone()).is_err() {
                    trace!(entity_id = %callback_entity, "Sensor stopped, dropping activity");
                }
            },
            true,
        );

        let mut task = SensorTask {
            entity_id: entity_id.clone(),
            friendly_name: format!("{} Operation", lock.title),
            bus: Arc::clone(&hass.bus),
            states: Arc::clone(&hass.states),
            recorder: hass.recorder.clone(),
            restore_state: Arc::clone(&hass.restore_state),
            write_delay: settings.write_delay,
            debouncer: ActivityDebouncer::new(),
            native_value: None,
            extra_attributes: None,
        };
        task.restore_last_state();
        task.write_state();

        info!(entity_id = %entity_id, lock = %lock.title, "Attached operation sensor");
        let handle = tokio::spawn(task.run(activity_rx, shutdown_rx, registration));

        Self {
            entity_id,
            unique_id,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Detach the sensor and wait for its task to finish
    ///
    /// A pending activity is dropped, not displayed.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            // the task may already be gone
            let _ = tx.send(());
        }
        if let Err(err) = self.handle.await {
            warn!(entity_id = %self.entity_id, %err, "Operation sensor task failed");
        }
    }
}

struct SensorTask {
    entity_id: EntityId,
    friendly_name: String,
    bus: Arc<EventBus>,
    states: Arc<StateStore>,
    recorder: Arc<dyn Recorder>,
    restore_state: Arc<RestoreStateStore>,
    write_delay: Duration,
    debouncer: ActivityDebouncer,
    native_value: Option<String>,
    extra_attributes: Option<Attributes>,
}

impl SensorTask {
    async fn run(
        mut self,
        mut activity_rx: mpsc::UnboundedReceiver<ActivityEvent>,
        mut shutdown_rx: oneshot::Receiver<()>,
        registration: ActivityRegistration,
    ) {
        let write_timer = time::sleep(self.write_delay);
        tokio::pin!(write_timer);
        let mut armed = false;

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => break,

                () = &mut write_timer, if armed => {
                    armed = false;
                    self.flush_pending_update();
                }

                activity = activity_rx.recv() => {
                    let Some(activity) = activity else {
                        debug!(entity_id = %self.entity_id, "Lock went away");
                        break;
                    };
                    self.handle_activity(activity);
                    // restarts on every activity, even with one pending
                    write_timer.as_mut().reset(Instant::now() + self.write_delay);
                    armed = true;
                }
            }
        }

        registration.cancel();
        self.detach();
    }

    fn handle_activity(&mut self, activity: ActivityEvent) {
        trace!(entity_id = %self.entity_id, ?activity, "Activity update");
        let received = self.debouncer.on_activity(activity);

        debug!(
            entity_id = %self.entity_id,
            state = ?received.observation.value,
            "Creating event for activity update"
        );
        self.bus.fire(hass_core::Event::new(
            EVENT_ACTIVITY,
            json!({
                "entity_id": self.entity_id.to_string(),
                "state": received.observation.value,
                "attributes": received.observation.attributes,
            }),
            Context::new(),
        ));

        if let Some(superseded) = received.superseded {
            debug!(
                entity_id = %self.entity_id,
                timestamp = %superseded.timestamp(),
                "Writing superseded activity to history"
            );
            self.recorder
                .queue_event(history_record(&self.entity_id, &superseded));
        }
    }

    fn flush_pending_update(&mut self) {
        let Some(observation) = self.debouncer.flush() else {
            return;
        };
        debug!(entity_id = %self.entity_id, state = ?observation.value, "Writing activity state");

        self.native_value = observation.value;
        self.extra_attributes = Some(observation.attributes);
        self.write_state();
    }

    fn restore_last_state(&mut self) {
        let Some(stored) = self.restore_state.last_state(&self.entity_id.to_string()) else {
            return;
        };
        if stored.state.is_unknown() || stored.state.is_unavailable() {
            return;
        }
        let Some(extra_data) = stored.extra_data else {
            return;
        };

        match serde_json::from_value::<RestoredSnapshot>(extra_data) {
            Ok(snapshot) => {
                debug!(entity_id = %self.entity_id, value = ?snapshot.value, "Restored state");
                self.native_value = snapshot.value;
                self.extra_attributes = snapshot.attributes;
            }
            Err(err) => {
                warn!(entity_id = %self.entity_id, %err, "Ignoring unreadable restore data");
            }
        }
    }

    fn write_state(&self) {
        let mut attributes = self.extra_attributes.clone().unwrap_or_default();
        attributes.insert("friendly_name".to_string(), Value::from(self.friendly_name.as_str()));
        attributes.insert("icon".to_string(), Value::from(OPERATION_SENSOR_ICON));

        let state = self.states.set(
            self.entity_id.clone(),
            self.native_value.as_deref().unwrap_or(STATE_UNKNOWN),
            attributes,
            Context::new(),
        );
        self.restore_state.remember(state, self.restore_data());
    }

    fn restore_data(&self) -> Option<Value> {
        let snapshot = RestoredSnapshot {
            value: self.native_value.clone(),
            attributes: self.extra_attributes.clone(),
        };
        match serde_json::to_value(snapshot) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(entity_id = %self.entity_id, %err, "Cannot serialize restore data");
                None
            }
        }
    }

    fn detach(&mut self) {
        if let Some(dropped) = self.debouncer.discard() {
            debug!(
                entity_id = %self.entity_id,
                timestamp = %dropped.timestamp(),
                "Dropping pending activity on detach"
            );
        }
        let entity_id = self.entity_id.to_string();
        self.states.remove(&entity_id, Context::new());
        self.restore_state.entity_removed(&entity_id);
        info!(entity_id = %self.entity_id, "Detached operation sensor");
    }
}

/// Start an operation sensor for every configured lock that can be found
///
/// A lock is found by following its entity registry entry to the lock's
/// config entry and that entry's [`LockData`]. Locks that cannot be followed
/// all the way are skipped.
pub fn setup_sensors(
    hass: &HomeAssistant,
    entry: &ConfigEntry,
    config: &ActivityConfig,
    settings: SensorSettings,
) -> Vec<OperationSensor> {
    let mut sensors = Vec::new();

    for lock_entity_id in &config.lock_entities {
        let Some(lock_entry) = hass.entities.get(lock_entity_id) else {
            debug!(%lock_entity_id, "Lock entity not registered, skipping");
            continue;
        };
        let Some(lock) = lock_entry
            .config_entry_id
            .as_deref()
            .and_then(|id| hass.config_entries.runtime_data::<LockData>(id))
        else {
            debug!(%lock_entity_id, "Lock entity has no loaded lock, skipping");
            continue;
        };

        let suggested = match operation_entity_id(&lock.title) {
            Ok(entity_id) => entity_id,
            Err(err) => {
                warn!(%lock_entity_id, %err, "Cannot name operation sensor");
                continue;
            }
        };
        let unique_id = operation_unique_id(lock.lock.address());
        let registered = hass.entities.get_or_create(
            DOMAIN,
            &suggested,
            Some(&unique_id),
            Some(&entry.entry_id),
            lock_entry.device_id.as_deref(),
        );
        if let Some(device_id) = &lock_entry.device_id {
            hass.devices.add_config_entry(device_id, &entry.entry_id);
        }

        let entity_id = registered.entity_id.parse().unwrap_or(suggested);
        sensors.push(OperationSensor::attach(hass, entity_id, &lock, settings));
    }

    sensors
}
