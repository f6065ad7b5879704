use std::collections::BTreeMap;

use hass_host::ConfigEntryError;
use thiserror::Error;

use crate::consts::DOMAIN;

#[derive(Debug, Error)]
pub enum ActivityConfigError {
    #[error("missing `{0}` in entry data")]
    Missing(&'static str),

    #[error("invalid entry data: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Setup failures shown to the user
#[derive(Debug, Error)]
pub enum SetupError {
    /// A compatible library was installed; it takes effect after a restart
    #[error("Restart required to use newly patched `yalexs_ble` package")]
    LibraryPatched { version: String },

    /// No compatible build exists for the installed library
    #[error("No patches for `yalexs_ble=={version}`; one must be created")]
    NoPatchAvailable { version: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ActivityConfigError),
}

impl SetupError {
    pub fn translation_key(&self) -> &'static str {
        match self {
            SetupError::LibraryPatched { .. } => "yalexs_ble_patched",
            SetupError::NoPatchAvailable { .. } => "yalexs_ble_no_patch_available",
            SetupError::InvalidConfig(_) => "invalid_config",
        }
    }

    fn placeholders(&self) -> BTreeMap<String, String> {
        match self {
            SetupError::LibraryPatched { version } | SetupError::NoPatchAvailable { version } => {
                BTreeMap::from([("yalexs_ble_version".to_string(), version.clone())])
            }
            SetupError::InvalidConfig(reason) => {
                BTreeMap::from([("reason".to_string(), reason.to_string())])
            }
        }
    }
}

impl From<SetupError> for ConfigEntryError {
    fn from(err: SetupError) -> Self {
        ConfigEntryError::translated(DOMAIN, err.translation_key(), err.placeholders(), err.to_string())
    }
}
