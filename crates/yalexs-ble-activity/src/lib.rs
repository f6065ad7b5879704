//! Yale Access Bluetooth activity
//!
//! Shows each tracked lock's most recent operation as a sensor. Activity
//! reported in quick succession is debounced so only the last one becomes
//! the displayed state; the ones it replaced still reach history under
//! their own timestamps.

pub mod compat;
pub mod config;
pub mod config_flow;
pub mod consts;
pub mod debounce;
pub mod diagnostics;
pub mod error;
pub mod integration;
pub mod observation;
pub mod sensor;
pub mod tracking;

use std::sync::Arc;

use hass_host::HomeAssistant;

pub use compat::{BundledLibrary, LibraryCompat};
pub use config::{ActivityConfig, SensorSettings};
pub use config_flow::{ActivityConfigFlow, ActivityOptionsFlow};
pub use consts::DOMAIN;
pub use debounce::ActivityDebouncer;
pub use error::{ActivityConfigError, SetupError};
pub use integration::YaleXSBLEActivity;
pub use observation::{Observation, RestoredSnapshot};
pub use sensor::OperationSensor;
pub use tracking::EntryListener;

/// Register the integration with the host under [`DOMAIN`]
pub fn register(hass: &HomeAssistant, integration: Arc<YaleXSBLEActivity>) {
    hass.register_integration(DOMAIN, integration);
}
