//! Yale Access Bluetooth lock model
//!
//! Locks push activity reports (door position changes and lock operations)
//! to callbacks registered on a [`PushLock`].

mod activity;
mod lock;

pub use activity::{
    ActivityEvent, DoorActivity, DoorStatus, LockActivity, LockOperationRemoteType,
    LockOperationSource, LockStatus, UnrecognizedActivity,
};
pub use lock::{ActivityCallback, ActivityRegistration, ConnectionInfo, LockData, LockInfo, PushLock};

/// Release of the upstream library this crate tracks
pub const LIBRARY_VERSION: &str = "3.0.0";

/// Whether [`PushLock::register_activity_callback`] is available
pub const SUPPORTS_ACTIVITY_CALLBACK: bool = true;
