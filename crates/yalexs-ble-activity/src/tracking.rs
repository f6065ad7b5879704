//! Keeps the tracked lock list in step with the entity registry
//!
//! One listener task runs per loaded config entry. It watches registry
//! updates for the tracked lock entities and updates of the entry itself:
//!
//! - a tracked lock that is removed raises a repair issue
//! - a tracked lock that is renamed is renamed in the entry's data
//! - any update of the entry reloads it

use std::sync::Arc;

use hass_core::events::{EntityRegistryUpdatedData, RegistryAction};
use hass_event_bus::TypedEventReceiver;
use hass_host::{ConfigEntryUpdate, HomeAssistant, Issue, IssueSeverity};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ActivityConfig;
use crate::consts::{CONF_LOCK_ENTITIES, DOMAIN};

pub const ISSUE_LOCK_ENTITY_REMOVED: &str = "lock_entity_removed";

pub fn lock_entity_removed_issue_id(entity_id: &str) -> String {
    format!("{ISSUE_LOCK_ENTITY_REMOVED}_{entity_id}")
}

pub struct EntryListener {
    entry_id: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl EntryListener {
    /// Subscribe and start listening
    ///
    /// Subscriptions are taken before this returns, so nothing fired after
    /// `start` is missed.
    pub fn start(hass: Arc<HomeAssistant>, entry_id: &str, config: &ActivityConfig) -> Self {
        let registry_rx = hass.bus.subscribe_typed::<EntityRegistryUpdatedData>();
        let entry_rx = hass.config_entries.subscribe_updates();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = ListenerTask {
            hass,
            entry_id: entry_id.to_string(),
            tracked: config.lock_entities.clone(),
        };
        debug!(entry_id, tracked = ?task.tracked, "Tracking lock entities");
        let handle = tokio::spawn(task.run(registry_rx, entry_rx, shutdown_rx));

        Self {
            entry_id: entry_id.to_string(),
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(err) = self.handle.await {
            warn!(entry_id = %self.entry_id, %err, "Entry listener failed");
        }
    }
}

struct ListenerTask {
    hass: Arc<HomeAssistant>,
    entry_id: String,
    tracked: Vec<String>,
}

impl ListenerTask {
    async fn run(
        mut self,
        mut registry_rx: TypedEventReceiver<EntityRegistryUpdatedData>,
        mut entry_rx: broadcast::Receiver<String>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => break,

                event = registry_rx.recv() => match event {
                    Ok(event) => self.handle_registry_update(event.data).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(entry_id = %self.entry_id, skipped, "Missed entity registry updates");
                    }
                    Err(RecvError::Closed) => break,
                },

                updated = entry_rx.recv() => match updated {
                    Ok(entry_id) if entry_id == self.entry_id => self.schedule_reload(),
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => self.schedule_reload(),
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!(entry_id = %self.entry_id, "Stopped tracking lock entities");
    }

    async fn handle_registry_update(&mut self, update: EntityRegistryUpdatedData) {
        match update.action {
            RegistryAction::Remove if self.is_tracked(&update.entity_id) => {
                self.raise_removed_issue(&update.entity_id);
            }
            RegistryAction::Update if update.is_rename() => {
                let Some(old_entity_id) = update.old_entity_id.as_deref() else {
                    return;
                };
                if self.is_tracked(old_entity_id) {
                    self.rename(old_entity_id, &update.entity_id).await;
                }
            }
            _ => {}
        }
    }

    fn is_tracked(&self, entity_id: &str) -> bool {
        self.tracked.iter().any(|tracked| tracked == entity_id)
    }

    fn raise_removed_issue(&self, entity_id: &str) {
        warn!(entity_id, "Tracked lock entity was removed");
        self.hass.issues.create(
            Issue::new(
                DOMAIN,
                lock_entity_removed_issue_id(entity_id),
                IssueSeverity::Warning,
                ISSUE_LOCK_ENTITY_REMOVED,
            )
            .fixable()
            .persistent()
            .with_placeholder("entity_id", entity_id),
        );
    }

    async fn rename(&mut self, old_entity_id: &str, new_entity_id: &str) {
        let Some(entry) = self.hass.config_entries.get(&self.entry_id) else {
            return;
        };
        let mut config = match ActivityConfig::from_entry_data(&entry.data) {
            Ok(config) => config,
            Err(err) => {
                warn!(entry_id = %self.entry_id, %err, "Cannot rename tracked lock");
                return;
            }
        };
        config.rename_lock_entity(old_entity_id, new_entity_id);
        info!(old_entity_id, new_entity_id, "Tracked lock entity renamed");

        let mut data = entry.data.clone();
        data.insert(
            CONF_LOCK_ENTITIES.to_string(),
            serde_json::Value::from(config.lock_entities.clone()),
        );
        if let Err(err) = self
            .hass
            .config_entries
            .update(&self.entry_id, ConfigEntryUpdate::new().data(data))
            .await
        {
            warn!(entry_id = %self.entry_id, %err, "Cannot save renamed lock entity");
            return;
        }
        self.tracked = config.lock_entities;
    }

    /// Reload on a separate task; the reload stops this listener
    fn schedule_reload(&self) {
        debug!(entry_id = %self.entry_id, "Entry updated, reloading");
        let hass = Arc::clone(&self.hass);
        let entry_id = self.entry_id.clone();
        tokio::spawn(async move {
            if let Err(err) = hass.reload_entry(&entry_id).await {
                warn!(%entry_id, %err, "Reload after update failed");
            }
        });
    }
}
