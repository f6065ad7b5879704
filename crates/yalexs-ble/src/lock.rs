//! Push-mode lock handle

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::activity::ActivityEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub rssi: i16,
}

/// Called with every activity the lock reports
pub type ActivityCallback = Arc<dyn Fn(&ActivityEvent, &LockInfo, &ConnectionInfo) + Send + Sync>;

type CallbackMap = DashMap<u64, ActivityCallback>;

/// A lock that pushes its activity to registered callbacks
pub struct PushLock {
    address: String,
    lock_info: RwLock<LockInfo>,
    connection_info: RwLock<ConnectionInfo>,
    callbacks: Arc<CallbackMap>,
    next_callback_id: AtomicU64,
    last_activity: RwLock<Option<ActivityEvent>>,
}

impl PushLock {
    pub fn new(address: impl Into<String>, lock_info: LockInfo) -> Self {
        Self {
            address: address.into(),
            lock_info: RwLock::new(lock_info),
            connection_info: RwLock::new(ConnectionInfo::default()),
            callbacks: Arc::new(DashMap::new()),
            next_callback_id: AtomicU64::new(1),
            last_activity: RwLock::new(None),
        }
    }

    /// Bluetooth address, e.g. `AA:BB:CC:DD:EE:FF`
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn lock_info(&self) -> LockInfo {
        self.lock_info
            .read()
            .map(|info| info.clone())
            .unwrap_or_default()
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        self.connection_info
            .read()
            .map(|info| *info)
            .unwrap_or_default()
    }

    pub fn set_connection_info(&self, connection_info: ConnectionInfo) {
        if let Ok(mut current) = self.connection_info.write() {
            *current = connection_info;
        }
    }

    /// Register a callback for activity reports
    ///
    /// With `request_update`, the most recent activity (if any) is replayed
    /// to this callback alone before returning.
    pub fn register_activity_callback<F>(&self, callback: F, request_update: bool) -> ActivityRegistration
    where
        F: Fn(&ActivityEvent, &LockInfo, &ConnectionInfo) + Send + Sync + 'static,
    {
        let id = self.next_callback_id.fetch_add(1, Ordering::Relaxed);
        let callback: ActivityCallback = Arc::new(callback);
        self.callbacks.insert(id, Arc::clone(&callback));
        debug!(address = %self.address, id, "Registered activity callback");

        if request_update {
            let last = self
                .last_activity
                .read()
                .ok()
                .and_then(|last| last.clone());
            if let Some(activity) = last {
                callback(&activity, &self.lock_info(), &self.connection_info());
            }
        }

        ActivityRegistration {
            id,
            callbacks: Arc::downgrade(&self.callbacks),
        }
    }

    /// Deliver an activity to every registered callback
    pub fn dispatch_activity(&self, activity: ActivityEvent) {
        if let Ok(mut last) = self.last_activity.write() {
            *last = Some(activity.clone());
        }

        // callbacks may register or cancel, so none run under the map lock
        let callbacks: Vec<ActivityCallback> = self
            .callbacks
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();
        trace!(address = %self.address, count = callbacks.len(), "Dispatching activity");

        let lock_info = self.lock_info();
        let connection_info = self.connection_info();
        for callback in callbacks {
            callback(&activity, &lock_info, &connection_info);
        }
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }
}

/// Keeps a callback registered until cancelled or dropped
#[must_use = "dropping the registration cancels the callback"]
pub struct ActivityRegistration {
    id: u64,
    callbacks: Weak<CallbackMap>,
}

impl ActivityRegistration {
    /// Stop receiving activity; calling it again does nothing
    pub fn cancel(&self) {
        if let Some(callbacks) = self.callbacks.upgrade() {
            if callbacks.remove(&self.id).is_some() {
                debug!(id = self.id, "Cancelled activity callback");
            }
        }
    }
}

impl Drop for ActivityRegistration {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runtime data the lock integration publishes on its config entry
#[derive(Clone)]
pub struct LockData {
    pub title: String,
    pub lock: Arc<PushLock>,
}

impl LockData {
    pub fn new(title: impl Into<String>, lock: Arc<PushLock>) -> Self {
        Self {
            title: title.into(),
            lock,
        }
    }
}
