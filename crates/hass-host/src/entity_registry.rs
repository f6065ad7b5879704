//! Entity Registry
//!
//! Tracks registered entities by entity id and by `(platform, unique_id)`,
//! and announces every create, rename and removal with an
//! `entity_registry_updated` event.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hass_core::events::{EntityRegistryUpdatedData, RegistryAction};
use hass_core::{Context, EntityId, EntityIdError};
use hass_event_bus::EventBus;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EntityRegistryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity is already registered: {0}")]
    AlreadyExists(String),

    #[error("Invalid entity id: {0}")]
    InvalidEntityId(#[from] EntityIdError),
}

/// A registered entity entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEntry {
    pub id: String,
    pub entity_id: String,
    /// Integration that provides the entity
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_entry_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl EntityEntry {
    fn new(entity_id: &str, platform: &str, unique_id: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            entity_id: entity_id.to_string(),
            platform: platform.to_string(),
            unique_id: unique_id.map(String::from),
            config_entry_id: None,
            device_id: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn domain(&self) -> &str {
        self.entity_id.split('.').next().unwrap_or("")
    }
}

pub struct EntityRegistry {
    by_entity_id: RwLock<IndexMap<String, Arc<EntityEntry>>>,
    /// `(platform, unique_id)` -> entity_id
    by_unique_id: DashMap<(String, String), String>,
    event_bus: Arc<EventBus>,
}

impl EntityRegistry {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            by_entity_id: RwLock::new(IndexMap::new()),
            by_unique_id: DashMap::new(),
            event_bus,
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .ok()
            .and_then(|idx| idx.get(entity_id).cloned())
    }

    pub fn get_by_unique_id(&self, platform: &str, unique_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_unique_id
            .get(&(platform.to_string(), unique_id.to_string()))
            .and_then(|entity_id| self.get(&entity_id))
    }

    pub fn get_by_config_entry_id(&self, config_entry_id: &str) -> Vec<Arc<EntityEntry>> {
        self.iter()
            .into_iter()
            .filter(|e| e.config_entry_id.as_deref() == Some(config_entry_id))
            .collect()
    }

    /// Register an entity, or return the existing entry for its unique id
    pub fn get_or_create(
        &self,
        platform: &str,
        entity_id: &EntityId,
        unique_id: Option<&str>,
        config_entry_id: Option<&str>,
        device_id: Option<&str>,
    ) -> Arc<EntityEntry> {
        if let Some(uid) = unique_id {
            if let Some(existing) = self.get_by_unique_id(platform, uid) {
                debug!("Found existing entity by unique_id: {}", existing.entity_id);
                return existing;
            }
        }

        let entity_id = entity_id.to_string();
        if let Some(existing) = self.get(&entity_id) {
            return existing;
        }

        let mut entry = EntityEntry::new(&entity_id, platform, unique_id);
        entry.config_entry_id = config_entry_id.map(String::from);
        entry.device_id = device_id.map(String::from);

        let entry = Arc::new(entry);
        self.index_entry(Arc::clone(&entry));

        info!("Registered new entity: {}", entity_id);
        self.event_bus
            .fire_typed(EntityRegistryUpdatedData::created(&entity_id), Context::new());
        entry
    }

    /// Give an entity a new entity id
    pub fn update_entity_id(
        &self,
        entity_id: &str,
        new_entity_id: &str,
    ) -> Result<Arc<EntityEntry>, EntityRegistryError> {
        let new_entity_id: EntityId = new_entity_id.parse()?;
        let new_entity_id = new_entity_id.to_string();

        let updated = {
            let mut idx = self
                .by_entity_id
                .write()
                .map_err(|_| EntityRegistryError::NotFound(entity_id.to_string()))?;

            if idx.contains_key(&new_entity_id) {
                return Err(EntityRegistryError::AlreadyExists(new_entity_id));
            }
            let Some(position) = idx.get_index_of(entity_id) else {
                return Err(EntityRegistryError::NotFound(entity_id.to_string()));
            };

            let mut entry = (*idx[position]).clone();
            entry.entity_id = new_entity_id.clone();
            entry.modified_at = Utc::now();
            let entry = Arc::new(entry);

            idx.shift_remove_index(position);
            idx.shift_insert(position, new_entity_id.clone(), Arc::clone(&entry));
            entry
        };

        if let Some(uid) = &updated.unique_id {
            self.by_unique_id
                .insert((updated.platform.clone(), uid.clone()), new_entity_id.clone());
        }

        info!("Renamed entity {} to {}", entity_id, new_entity_id);
        self.event_bus.fire_typed(
            EntityRegistryUpdatedData {
                action: RegistryAction::Update,
                entity_id: new_entity_id,
                old_entity_id: Some(entity_id.to_string()),
                changes: BTreeMap::from([(
                    "entity_id".to_string(),
                    serde_json::Value::String(entity_id.to_string()),
                )]),
            },
            Context::new(),
        );
        Ok(updated)
    }

    pub fn remove(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        let entry = self
            .by_entity_id
            .write()
            .ok()
            .and_then(|mut idx| idx.shift_remove(entity_id))?;

        if let Some(uid) = &entry.unique_id {
            self.by_unique_id
                .remove(&(entry.platform.clone(), uid.clone()));
        }

        info!("Removed entity: {}", entity_id);
        self.event_bus
            .fire_typed(EntityRegistryUpdatedData::removed(entity_id), Context::new());
        Some(entry)
    }

    pub fn iter(&self) -> Vec<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .map(|idx| idx.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_entity_id.read().map(|idx| idx.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index_entry(&self, entry: Arc<EntityEntry>) {
        if let Some(uid) = &entry.unique_id {
            self.by_unique_id
                .insert((entry.platform.clone(), uid.clone()), entry.entity_id.clone());
        }
        if let Ok(mut idx) = self.by_entity_id.write() {
            idx.insert(entry.entity_id.clone(), entry);
        }
    }
}
