use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{PropertyMap, Result};
use crate::mapper;
use crate::proto::{
    ChildEntity, ChildRemoval, Document, EntityEvent, EntityLog, Label, LockInfo, LogLevel,
    Mutation, ObjectInfo, Relationship, SensorMeasurement,
};

/// Labels attached to an entity plus pending additions and removals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityLabels {
    labels: BTreeMap<String, String>,
    to_add: Vec<Label>,
    to_remove: Vec<String>,
}

impl EntityLabels {
    pub fn add_label(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let label = Label::new(name, value);
        self.to_remove.retain(|removed| removed != &label.name);
        self.to_add.retain(|added| added.name != label.name);
        self.to_add.push(label);
        self
    }

    pub fn remove_label(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.to_add.retain(|added| added.name != name);
        if !self.to_remove.contains(&name) {
            self.to_remove.push(name);
        }
        self
    }

    /// Current value of `name`, pending changes included.
    pub fn label(&self, name: &str) -> Option<&str> {
        if let Some(added) = self.to_add.iter().find(|label| label.name == name) {
            return Some(&added.value);
        }
        if self.to_remove.iter().any(|removed| removed == name) {
            return None;
        }
        self.labels.get(name).map(String::as_str)
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn has_pending(&self) -> bool {
        !self.to_add.is_empty() || !self.to_remove.is_empty()
    }

    pub(crate) fn collect(&self, mutation: &mut Mutation) {
        mutation.labels.extend(self.to_add.iter().cloned());
        mutation.remove_labels.extend(self.to_remove.iter().cloned());
    }

    /// Folds pending changes into the current labels.
    pub(crate) fn clear(&mut self) {
        for name in self.to_remove.drain(..) {
            self.labels.remove(&name);
        }
        for label in self.to_add.drain(..) {
            self.labels.insert(label.name, label.value);
        }
    }

    pub(crate) fn hydrate(&mut self, labels: &[Label]) {
        self.labels = labels
            .iter()
            .map(|label| (label.name.clone(), label.value.clone()))
            .collect();
    }
}

/// Events queued for the next mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityEvents {
    pending: Vec<EntityEvent>,
}

impl EntityEvents {
    pub fn add_event(&mut self, event_type: impl Into<String>) -> &mut Self {
        self.pending.push(EntityEvent {
            event_type: event_type.into(),
            properties: Vec::new(),
            time: Some(Utc::now()),
        });
        self
    }

    /// Queues an event carrying the marshalled `properties`.
    pub fn add_event_with(&mut self, event_type: impl Into<String>, properties: &PropertyMap) -> &mut Self {
        self.pending.push(EntityEvent {
            event_type: event_type.into(),
            properties: mapper::to_entity_properties(properties),
            time: Some(Utc::now()),
        });
        self
    }

    pub fn pending(&self) -> &[EntityEvent] {
        &self.pending
    }

    pub(crate) fn collect(&self, mutation: &mut Mutation) {
        mutation.events.extend(self.pending.iter().cloned());
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Entity-scoped log lines queued for the next mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityLogs {
    pending: Vec<EntityLog>,
}

impl EntityLogs {
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) -> &mut Self {
        self.pending.push(EntityLog {
            level,
            message: message.into(),
            time: Some(Utc::now()),
            ..EntityLog::default()
        });
        self
    }

    pub fn log_entry(&mut self, entry: EntityLog) -> &mut Self {
        self.pending.push(entry);
        self
    }

    pub fn debug(&mut self, message: impl Into<String>) -> &mut Self {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&mut self, message: impl Into<String>) -> &mut Self {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&mut self, message: impl Into<String>) -> &mut Self {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> &mut Self {
        self.log(LogLevel::Error, message)
    }

    pub fn pending(&self) -> &[EntityLog] {
        &self.pending
    }

    pub(crate) fn collect(&self, mutation: &mut Mutation) {
        mutation.logs.extend(self.pending.iter().cloned());
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Relationships of an entity plus pending additions and removals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRelationships {
    relationships: Vec<Relationship>,
    to_add: Vec<Relationship>,
    to_remove: Vec<Relationship>,
}

impl EntityRelationships {
    pub fn add_relationship(
        &mut self,
        relationship_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> &mut Self {
        self.add_relationship_with_meta(relationship_type, target_id, BTreeMap::new())
    }

    pub fn add_relationship_with_meta(
        &mut self,
        relationship_type: impl Into<String>,
        target_id: impl Into<String>,
        meta: BTreeMap<String, String>,
    ) -> &mut Self {
        self.to_add.push(Relationship {
            relationship_type: relationship_type.into(),
            target_id: target_id.into(),
            meta,
            ..Relationship::default()
        });
        self
    }

    pub fn remove_relationship(
        &mut self,
        relationship_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> &mut Self {
        self.to_remove.push(Relationship {
            relationship_type: relationship_type.into(),
            target_id: target_id.into(),
            ..Relationship::default()
        });
        self
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Hydrated relationships of `relationship_type`.
    pub fn of_type<'a>(&'a self, relationship_type: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships
            .iter()
            .filter(move |relationship| relationship.relationship_type == relationship_type)
    }

    pub(crate) fn collect(&self, mutation: &mut Mutation) {
        mutation.relationships.extend(self.to_add.iter().cloned());
        mutation.remove_relationships.extend(self.to_remove.iter().cloned());
    }

    pub(crate) fn clear(&mut self) {
        for removed in self.to_remove.drain(..) {
            self.relationships.retain(|relationship| {
                relationship.relationship_type != removed.relationship_type
                    || relationship.target_id != removed.target_id
            });
        }
        self.relationships.append(&mut self.to_add);
    }

    pub(crate) fn hydrate(&mut self, relationships: &[Relationship]) {
        self.relationships = relationships.to_vec();
    }
}

static WRITE_REF_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Reference sent with a new child so the server can report its assigned id.
fn next_write_ref() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let sequence = WRITE_REF_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}{:04x}", nanos, sequence & 0xffff)
}

/// Child entities to add, remove or truncate with the next mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityChildren {
    to_add: Vec<ChildEntity>,
    to_remove: Vec<ChildRemoval>,
    truncate: Vec<String>,
    assigned: BTreeMap<String, String>,
}

impl EntityChildren {
    /// Queues a child and returns its write reference.
    pub fn add_child(&mut self, child_type: impl Into<String>, data: Vec<u8>) -> String {
        let write_ref = next_write_ref();
        self.to_add.push(ChildEntity {
            child_type: child_type.into(),
            write_ref: write_ref.clone(),
            data,
            ..ChildEntity::default()
        });
        write_ref
    }

    /// Queues a child whose payload is the JSON encoding of `data`.
    pub fn add_child_json<T: Serialize>(&mut self, child_type: impl Into<String>, data: &T) -> Result<String> {
        let payload = serde_json::to_vec(data)?;
        Ok(self.add_child(child_type, payload))
    }

    /// Replaces the payload of an existing child.
    pub fn update_child(&mut self, child_type: impl Into<String>, id: impl Into<String>, data: Vec<u8>) -> &mut Self {
        self.to_add.push(ChildEntity {
            child_type: child_type.into(),
            id: id.into(),
            data,
            ..ChildEntity::default()
        });
        self
    }

    pub fn remove_child(&mut self, child_type: impl Into<String>, id: impl Into<String>) -> &mut Self {
        self.to_remove.push(ChildRemoval {
            child_type: child_type.into(),
            id: id.into(),
        });
        self
    }

    /// Removes every child of `child_type`.
    pub fn truncate(&mut self, child_type: impl Into<String>) -> &mut Self {
        let child_type = child_type.into();
        if !self.truncate.contains(&child_type) {
            self.truncate.push(child_type);
        }
        self
    }

    /// Server-assigned id of the child queued under `write_ref`.
    pub fn child_id(&self, write_ref: &str) -> Option<&str> {
        self.assigned.get(write_ref).map(String::as_str)
    }

    pub fn has_pending(&self) -> bool {
        !self.to_add.is_empty() || !self.to_remove.is_empty() || !self.truncate.is_empty()
    }

    pub(crate) fn collect(&self, mutation: &mut Mutation) {
        mutation.children.extend(self.to_add.iter().cloned());
        mutation.remove_children.extend(self.to_remove.iter().cloned());
        mutation.truncate_children.extend(self.truncate.iter().cloned());
    }

    pub(crate) fn backfill(&mut self, child_ids: &BTreeMap<String, String>) {
        for child in &self.to_add {
            if child.write_ref.is_empty() {
                continue;
            }
            if let Some(id) = child_ids.get(&child.write_ref) {
                self.assigned.insert(child.write_ref.clone(), id.clone());
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.to_add.clear();
        self.to_remove.clear();
        self.truncate.clear();
    }
}

/// Lock state reported by a locking read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityLock {
    lock: Option<LockInfo>,
}

impl EntityLock {
    pub fn lock_info(&self) -> Option<&LockInfo> {
        self.lock.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.as_ref().is_some_and(|lock| lock.locked)
    }

    pub fn lock_id(&self) -> Option<&str> {
        self.lock.as_ref().map(|lock| lock.lock_id.as_str())
    }

    pub(crate) fn set(&mut self, lock: LockInfo) {
        self.lock = Some(lock);
    }
}

/// Documents returned by a read that asked for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDocuments {
    documents: Vec<Document>,
}

impl EntityDocuments {
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Latest loaded revision of `name`.
    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents
            .iter()
            .filter(|document| document.name == name)
            .max_by_key(|document| document.created)
    }

    pub(crate) fn hydrate(&mut self, documents: &[Document]) {
        self.documents = documents.to_vec();
    }
}

/// Sensor readings: the latest known values and measurements to record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySensors {
    readings: Vec<SensorMeasurement>,
    pending: Vec<SensorMeasurement>,
}

impl EntitySensors {
    pub fn add_reading(&mut self, property: impl Into<String>, value: f64) -> &mut Self {
        self.add_reading_at(property, value, Utc::now())
    }

    pub fn add_reading_at(&mut self, property: impl Into<String>, value: f64, time: DateTime<Utc>) -> &mut Self {
        self.pending.push(SensorMeasurement {
            property: property.into(),
            value,
            data: String::new(),
            time: Some(time),
        });
        self
    }

    pub fn readings(&self) -> &[SensorMeasurement] {
        &self.readings
    }

    pub fn pending(&self) -> &[SensorMeasurement] {
        &self.pending
    }

    pub(crate) fn collect(&self, mutation: &mut Mutation) {
        mutation.measurements.extend(self.pending.iter().cloned());
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn hydrate(&mut self, readings: &[SensorMeasurement]) {
        self.readings = readings.to_vec();
    }
}

/// Stored objects listed by a read that asked for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityObjects {
    objects: Vec<ObjectInfo>,
}

impl EntityObjects {
    pub fn objects(&self) -> &[ObjectInfo] {
        &self.objects
    }

    pub fn object(&self, path: &str) -> Option<&ObjectInfo> {
        self.objects.iter().find(|object| object.path == path)
    }

    pub(crate) fn hydrate(&mut self, objects: &[ObjectInfo]) {
        self.objects = objects.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_changes_shadow_current_labels() {
        let mut labels = EntityLabels::default();
        labels.hydrate(&[Label::new("tier", "silver"), Label::new("region", "eu")]);
        labels.add_label("tier", "gold").remove_label("region");
        assert_eq!(labels.label("tier"), Some("gold"));
        assert_eq!(labels.label("region"), None);

        labels.clear();
        assert_eq!(labels.labels().len(), 1);
        assert_eq!(labels.label("tier"), Some("gold"));
    }

    #[test]
    fn write_refs_are_unique() {
        let mut children = EntityChildren::default();
        let first = children.add_child("line", Vec::new());
        let second = children.add_child("line", Vec::new());
        assert_ne!(first, second);
    }

    #[test]
    fn json_children_and_truncation() {
        let mut children = EntityChildren::default();
        children
            .add_child_json("line", &serde_json::json!({"sku": "A-1", "qty": 2}))
            .unwrap();
        children.truncate("note").truncate("note").remove_child("line", "old");
        let mut mutation = Mutation::default();
        children.collect(&mut mutation);
        assert_eq!(mutation.truncate_children, vec!["note"]);
        assert_eq!(mutation.remove_children[0].id, "old");
        let payload: serde_json::Value = serde_json::from_slice(&mutation.children[0].data).unwrap();
        assert_eq!(payload["sku"], "A-1");
    }

    #[test]
    fn relationship_clear_applies_pending() {
        let mut relationships = EntityRelationships::default();
        relationships.hydrate(&[Relationship {
            relationship_type: "owner".to_string(),
            target_id: "u1".to_string(),
            ..Relationship::default()
        }]);
        relationships
            .add_relationship("owner", "u2")
            .remove_relationship("owner", "u1");
        relationships.clear();
        let targets: Vec<&str> = relationships.of_type("owner").map(|r| r.target_id.as_str()).collect();
        assert_eq!(targets, vec!["u2"]);
    }
}
