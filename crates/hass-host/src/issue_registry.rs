//! Repair issues
//!
//! Advisory issues raised by integrations for the user to look at. Issues
//! are keyed by `(domain, issue_id)`; raising the same issue again replaces
//! it. Every change fires `repairs_issue_registry_updated`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hass_core::{Context, Event};
use hass_event_bus::EventBus;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

pub const EVENT_REPAIRS_ISSUE_REGISTRY_UPDATED: &str = "repairs_issue_registry_updated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Critical,
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Create,
    Update,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub domain: String,
    pub issue_id: String,
    /// A repair flow exists for it
    pub is_fixable: bool,
    /// Survives restarts
    pub is_persistent: bool,
    pub severity: IssueSeverity,
    pub translation_key: String,
    #[serde(default)]
    pub translation_placeholders: BTreeMap<String, String>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub dismissed: bool,
}

impl Issue {
    pub fn new(
        domain: impl Into<String>,
        issue_id: impl Into<String>,
        severity: IssueSeverity,
        translation_key: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            issue_id: issue_id.into(),
            is_fixable: false,
            is_persistent: false,
            severity,
            translation_key: translation_key.into(),
            translation_placeholders: BTreeMap::new(),
            created: Utc::now(),
            dismissed: false,
        }
    }

    pub fn fixable(mut self) -> Self {
        self.is_fixable = true;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.is_persistent = true;
        self
    }

    pub fn with_placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.translation_placeholders.insert(key.into(), value.into());
        self
    }
}

pub struct IssueRegistry {
    issues: DashMap<(String, String), Issue>,
    event_bus: Arc<EventBus>,
}

impl IssueRegistry {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            issues: DashMap::new(),
            event_bus,
        }
    }

    /// Raise an issue, replacing any issue with the same id
    pub fn create(&self, issue: Issue) -> UpdateType {
        let key = (issue.domain.clone(), issue.issue_id.clone());
        let update_type = match self.issues.insert(key, issue.clone()) {
            Some(_) => {
                debug!("Updated issue: {}.{}", issue.domain, issue.issue_id);
                UpdateType::Update
            }
            None => {
                info!("Created issue: {}.{}", issue.domain, issue.issue_id);
                UpdateType::Create
            }
        };

        self.announce(update_type, &issue.domain, &issue.issue_id);
        update_type
    }

    pub fn get(&self, domain: &str, issue_id: &str) -> Option<Issue> {
        self.issues
            .get(&(domain.to_string(), issue_id.to_string()))
            .map(|r| r.clone())
    }

    /// Mark an issue as dismissed by the user
    pub fn dismiss(&self, domain: &str, issue_id: &str) -> Option<Issue> {
        let dismissed = {
            let mut issue = self
                .issues
                .get_mut(&(domain.to_string(), issue_id.to_string()))?;
            issue.dismissed = true;
            issue.clone()
        };
        self.announce(UpdateType::Update, domain, issue_id);
        Some(dismissed)
    }

    pub fn delete(&self, domain: &str, issue_id: &str) -> Option<Issue> {
        let (_, issue) = self
            .issues
            .remove(&(domain.to_string(), issue_id.to_string()))?;
        info!("Deleted issue: {}.{}", domain, issue_id);
        self.announce(UpdateType::Remove, domain, issue_id);
        Some(issue)
    }

    pub fn issues_for_domain(&self, domain: &str) -> Vec<Issue> {
        self.issues
            .iter()
            .filter(|r| r.key().0 == domain)
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn announce(&self, action: UpdateType, domain: &str, issue_id: &str) {
        self.event_bus.fire(Event::new(
            EVENT_REPAIRS_ISSUE_REGISTRY_UPDATED,
            json!({"action": action, "domain": domain, "issue_id": issue_id}),
            Context::new(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removed_lock_issue() -> Issue {
        Issue::new(
            "yalexs_ble_activity",
            "lock_entity_removed_lock.front_door",
            IssueSeverity::Warning,
            "lock_entity_removed",
        )
        .fixable()
        .persistent()
        .with_placeholder("entity_id", "lock.front_door")
    }

    #[tokio::test]
    async fn test_create_and_replace() {
        let bus = Arc::new(EventBus::new());
        let registry = IssueRegistry::new(bus.clone());
        let mut rx = bus.subscribe(EVENT_REPAIRS_ISSUE_REGISTRY_UPDATED);

        assert_eq!(registry.create(removed_lock_issue()), UpdateType::Create);
        assert_eq!(registry.create(removed_lock_issue()), UpdateType::Update);
        assert_eq!(registry.len(), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.data["action"], "create");
        assert_eq!(event.data["issue_id"], "lock_entity_removed_lock.front_door");

        let issue = registry
            .get("yalexs_ble_activity", "lock_entity_removed_lock.front_door")
            .unwrap();
        assert!(issue.is_fixable);
        assert!(issue.is_persistent);
        assert_eq!(issue.severity, IssueSeverity::Warning);
        assert_eq!(issue.translation_placeholders["entity_id"], "lock.front_door");
    }

    #[test]
    fn test_dismiss_and_delete() {
        let registry = IssueRegistry::new(Arc::new(EventBus::new()));
        registry.create(removed_lock_issue());

        let dismissed = registry
            .dismiss("yalexs_ble_activity", "lock_entity_removed_lock.front_door")
            .unwrap();
        assert!(dismissed.dismissed);
        assert_eq!(registry.issues_for_domain("yalexs_ble_activity").len(), 1);

        assert!(registry
            .delete("yalexs_ble_activity", "lock_entity_removed_lock.front_door")
            .is_some());
        assert!(registry.is_empty());
        assert!(registry.dismiss("yalexs_ble_activity", "missing").is_none());
    }
}
