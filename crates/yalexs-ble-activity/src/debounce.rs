//! Debounce and backfill transitions
//!
//! The sensor holds at most one pending activity. A new activity replaces
//! the pending one, and the replaced activity is handed back so it can be
//! written to history under its own timestamp. When the write delay passes
//! without another activity, the pending one is flushed to become the
//! displayed state.
//!
//! Timing lives with the caller: every [`ActivityDebouncer::on_activity`]
//! (re)arms the write delay, and [`ActivityDebouncer::flush`] runs when it
//! expires.

use hass_core::events::StateChangedData;
use hass_core::{Context, EntityId, Event, State, STATE_UNAVAILABLE};
use yalexs_ble::ActivityEvent;

use crate::observation::Observation;

/// Outcome of receiving one activity
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    /// Observation of the new activity, for listeners
    pub observation: Observation,
    /// The pending activity this one replaced
    pub superseded: Option<ActivityEvent>,
}

#[derive(Debug, Default)]
pub struct ActivityDebouncer {
    pending: Option<ActivityEvent>,
}

impl ActivityDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_activity(&mut self, activity: ActivityEvent) -> Received {
        let observation = Observation::from_activity(&activity);
        let superseded = self.pending.replace(activity);
        Received {
            observation,
            superseded,
        }
    }

    /// Take the pending activity's observation, if any
    pub fn flush(&mut self) -> Option<Observation> {
        self.pending.take().map(|activity| Observation::from_activity(&activity))
    }

    /// Drop the pending activity without displaying it
    pub fn discard(&mut self) -> Option<ActivityEvent> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// History record for an activity that never became the displayed state
///
/// Every timestamp of the recorded state is the activity's own, so history
/// places it where it happened rather than when it was written.
pub fn history_record(entity_id: &EntityId, activity: &ActivityEvent) -> Event<StateChangedData> {
    let observation = Observation::from_activity(activity);
    let at = activity.timestamp();
    let context = Context::new();

    let new_state = State::recorded_at(
        entity_id.clone(),
        observation
            .value
            .unwrap_or_else(|| STATE_UNAVAILABLE.to_string()),
        observation.attributes,
        at,
        context.clone(),
    );

    Event::typed(
        StateChangedData {
            entity_id: entity_id.clone(),
            old_state: None,
            new_state: Some(new_state),
        },
        context,
    )
    .fired_at(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use yalexs_ble::{
        DoorActivity, DoorStatus, LockActivity, LockOperationSource, LockStatus,
        UnrecognizedActivity,
    };

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 10, 51, 32).unwrap() + Duration::seconds(seconds)
    }

    fn lock(status: LockStatus, seconds: i64) -> ActivityEvent {
        ActivityEvent::Lock(LockActivity {
            timestamp: at(seconds),
            status,
            source: LockOperationSource::Manual,
            remote_type: None,
            slot: None,
        })
    }

    fn sensor() -> EntityId {
        EntityId::new("sensor", "front_door_operation").unwrap()
    }

    #[test]
    fn test_first_activity_supersedes_nothing() {
        let mut debouncer = ActivityDebouncer::new();
        let received = debouncer.on_activity(lock(LockStatus::Unlocked, 0));

        assert_eq!(received.observation.value.as_deref(), Some("lock_unlocked"));
        assert!(received.superseded.is_none());
        assert!(debouncer.is_pending());
    }

    #[test]
    fn test_burst_backfills_all_but_last() {
        let mut debouncer = ActivityDebouncer::new();
        let burst = [
            lock(LockStatus::Unlocking, 0),
            lock(LockStatus::Unlocked, 1),
            lock(LockStatus::Locking, 2),
            lock(LockStatus::Locked, 3),
        ];

        let superseded: Vec<_> = burst
            .iter()
            .cloned()
            .filter_map(|activity| debouncer.on_activity(activity).superseded)
            .collect();
        assert_eq!(superseded, burst[..3].to_vec());

        let flushed = debouncer.flush().unwrap();
        assert_eq!(flushed.value.as_deref(), Some("lock_locked"));
        assert!(!debouncer.is_pending());
        assert!(debouncer.flush().is_none());
    }

    #[test]
    fn test_discard() {
        let mut debouncer = ActivityDebouncer::new();
        debouncer.on_activity(lock(LockStatus::Locked, 0));

        assert_eq!(debouncer.discard(), Some(lock(LockStatus::Locked, 0)));
        assert!(debouncer.flush().is_none());
    }

    #[test]
    fn test_history_record_uses_activity_time() {
        let activity = ActivityEvent::Door(DoorActivity {
            timestamp: at(-30),
            status: DoorStatus::Opened,
        });
        let record = history_record(&sensor(), &activity);

        assert_eq!(record.event_type.as_str(), "state_changed");
        assert_eq!(record.time_fired, at(-30));
        assert!(record.data.old_state.is_none());

        let state = record.data.new_state.unwrap();
        assert_eq!(state.state, "door_opened");
        assert_eq!(state.last_changed, at(-30));
        assert_eq!(state.last_updated, at(-30));
        assert_eq!(state.last_reported, Some(at(-30)));
        assert!(state.attributes.contains_key("timestamp"));
    }

    #[test]
    fn test_history_record_for_unrecognized_activity() {
        let activity = ActivityEvent::Unrecognized(UnrecognizedActivity {
            timestamp: at(0),
            kind: "battery".to_string(),
        });
        let state = history_record(&sensor(), &activity).data.new_state.unwrap();

        assert_eq!(state.state, "unavailable");
        assert!(state.attributes.is_empty());
    }
}
