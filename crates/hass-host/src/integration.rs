//! Integration seam
//!
//! An integration registers one handler per domain. The host calls it to
//! set up and unload that domain's config entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config_entries::ConfigEntry;
use crate::HomeAssistant;

/// A setup failure the user should see, with a translatable message
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ConfigEntryError {
    pub translation_domain: String,
    pub translation_key: String,
    pub translation_placeholders: BTreeMap<String, String>,
    /// The rendered message
    pub message: String,
}

impl ConfigEntryError {
    pub fn translated(
        translation_domain: impl Into<String>,
        translation_key: impl Into<String>,
        translation_placeholders: BTreeMap<String, String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            translation_domain: translation_domain.into(),
            translation_key: translation_key.into(),
            translation_placeholders,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    async fn setup_entry(
        &self,
        hass: Arc<HomeAssistant>,
        entry: ConfigEntry,
    ) -> Result<(), ConfigEntryError>;

    /// Tear down everything `setup_entry` created, returning whether it
    /// succeeded
    async fn unload_entry(&self, hass: Arc<HomeAssistant>, entry: ConfigEntry) -> bool;
}
