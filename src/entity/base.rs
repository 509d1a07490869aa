use chrono::{DateTime, Utc};

use crate::proto::{self, EntityState};
use crate::watcher::Watcher;

/// Identity, change watcher and server detail stamps of a record.
#[derive(Debug, Clone, Default)]
pub struct BaseEntity {
    entity_id: String,
    watcher: Option<Watcher>,
    state: EntityState,
    created: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
    state_change: Option<DateTime<Utc>>,
}

impl BaseEntity {
    pub fn with_id(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ..Self::default()
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn set_entity_id(&mut self, entity_id: impl Into<String>) {
        self.entity_id = entity_id.into();
    }

    pub fn watcher(&self) -> Option<&Watcher> {
        self.watcher.as_ref()
    }

    pub fn watcher_mut(&mut self) -> Option<&mut Watcher> {
        self.watcher.as_mut()
    }

    pub fn set_watcher(&mut self, watcher: Watcher) {
        self.watcher = Some(watcher);
    }

    pub fn take_watcher(&mut self) -> Option<Watcher> {
        self.watcher.take()
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn state_change(&self) -> Option<DateTime<Utc>> {
        self.state_change
    }

    pub(crate) fn set_state(&mut self, state: EntityState) {
        self.state = state;
    }

    pub(crate) fn apply_details(&mut self, entity: &proto::Entity) {
        if !entity.entity_id.is_empty() {
            self.entity_id = entity.entity_id.clone();
        }
        self.state = entity.state;
        self.created = entity.created;
        self.last_update = entity.last_update;
        self.state_change = entity.state_change;
    }
}
