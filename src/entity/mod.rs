//! Top-level records and the mix-in components they may embed.
//!
//! A record marks its components with `#[keystone(embed)]`; the derive wires
//! them into [`Entity::traits`], which the actor uses to collect pending
//! labels, events, logs, relationships, children and sensor readings for a
//! mutation and to hydrate them after a read.

mod base;
mod mixins;

pub use base::BaseEntity;
pub use mixins::{
    EntityChildren, EntityDocuments, EntityEvents, EntityLabels, EntityLock, EntityLogs,
    EntityObjects, EntityRelationships, EntitySensors,
};

use crate::mapper::Properties;
use crate::proto::{self, EntityResponse, LockInfo, MutateResponse, Mutation};
use crate::schema::EntityDefinition;

/// A record stored as a Keystone entity.
///
/// Usually derived with `#[derive(Entity)]`, which also derives
/// [`Properties`]. Generic records cannot be derived; implement this trait by
/// hand and give them an explicit schema key.
pub trait Entity: Properties + Send + 'static {
    /// Schema definition registered for this type.
    fn definition() -> EntityDefinition;

    /// Embedded mix-in components.
    fn traits(&mut self) -> EntityTraits<'_> {
        EntityTraits::default()
    }

    /// Called with every retrieve response before the record is hydrated.
    fn observe_retrieve(&mut self, _response: &EntityResponse) {}
}

/// Borrowed view of a record's mix-in components; absent components are `None`.
#[derive(Default)]
pub struct EntityTraits<'a> {
    pub base: Option<&'a mut BaseEntity>,
    pub labels: Option<&'a mut EntityLabels>,
    pub events: Option<&'a mut EntityEvents>,
    pub logs: Option<&'a mut EntityLogs>,
    pub relationships: Option<&'a mut EntityRelationships>,
    pub children: Option<&'a mut EntityChildren>,
    pub lock: Option<&'a mut EntityLock>,
    pub documents: Option<&'a mut EntityDocuments>,
    pub sensors: Option<&'a mut EntitySensors>,
    pub objects: Option<&'a mut EntityObjects>,
}

impl<'a> EntityTraits<'a> {
    pub fn with<M: Mixin + ?Sized>(mut self, component: &'a mut M) -> Self {
        component.attach(&mut self);
        self
    }

    /// Copies pending component data into `mutation`.
    pub fn collect(&self, mutation: &mut Mutation) {
        if let Some(labels) = &self.labels {
            labels.collect(mutation);
        }
        if let Some(events) = &self.events {
            events.collect(mutation);
        }
        if let Some(logs) = &self.logs {
            logs.collect(mutation);
        }
        if let Some(relationships) = &self.relationships {
            relationships.collect(mutation);
        }
        if let Some(children) = &self.children {
            children.collect(mutation);
        }
        if let Some(sensors) = &self.sensors {
            sensors.collect(mutation);
        }
    }

    /// Gives children queued in the last mutation their server-assigned ids.
    pub fn backfill_children(&mut self, response: &MutateResponse) {
        if let Some(children) = self.children.as_deref_mut() {
            children.backfill(&response.child_ids);
        }
    }

    /// Folds pending labels and relationships into their current sets and
    /// drops everything queued. Runs last after a successful mutation.
    pub fn clear_pending(&mut self) {
        if let Some(children) = self.children.as_deref_mut() {
            children.clear();
        }
        if let Some(labels) = self.labels.as_deref_mut() {
            labels.clear();
        }
        if let Some(events) = self.events.as_deref_mut() {
            events.clear();
        }
        if let Some(logs) = self.logs.as_deref_mut() {
            logs.clear();
        }
        if let Some(relationships) = self.relationships.as_deref_mut() {
            relationships.clear();
        }
        if let Some(sensors) = self.sensors.as_deref_mut() {
            sensors.clear();
        }
    }

    /// Copies read-side data of a retrieved entity into the components.
    pub fn hydrate(&mut self, entity: &proto::Entity) {
        if let Some(base) = self.base.as_deref_mut() {
            base.apply_details(entity);
        }
        if let Some(labels) = self.labels.as_deref_mut() {
            labels.hydrate(&entity.labels);
        }
        if let Some(relationships) = self.relationships.as_deref_mut() {
            relationships.hydrate(&entity.relationships);
        }
        if let Some(documents) = self.documents.as_deref_mut() {
            documents.hydrate(&entity.documents);
        }
        if let Some(objects) = self.objects.as_deref_mut() {
            objects.hydrate(&entity.objects);
        }
        if let Some(sensors) = self.sensors.as_deref_mut() {
            sensors.hydrate(&entity.sensors);
        }
    }

    pub fn set_lock(&mut self, lock: Option<&LockInfo>) {
        if let (Some(holder), Some(lock)) = (self.lock.as_deref_mut(), lock) {
            holder.set(lock.clone());
        }
    }
}

/// A component that plugs itself into [`EntityTraits`].
pub trait Mixin {
    fn attach<'a>(&'a mut self, traits: &mut EntityTraits<'a>);
}

macro_rules! mixin {
    ($($component:ty => $slot:ident),+ $(,)?) => {
        $(
            impl Mixin for $component {
                fn attach<'a>(&'a mut self, traits: &mut EntityTraits<'a>) {
                    traits.$slot = Some(self);
                }
            }
        )+
    };
}

mixin!(
    BaseEntity => base,
    EntityLabels => labels,
    EntityEvents => events,
    EntityLogs => logs,
    EntityRelationships => relationships,
    EntityChildren => children,
    EntityLock => lock,
    EntityDocuments => documents,
    EntitySensors => sensors,
    EntityObjects => objects,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Label;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Parts {
        base: BaseEntity,
        labels: EntityLabels,
        children: EntityChildren,
    }

    impl Parts {
        fn traits(&mut self) -> EntityTraits<'_> {
            EntityTraits::default()
                .with(&mut self.base)
                .with(&mut self.labels)
                .with(&mut self.children)
        }
    }

    #[test]
    fn collect_and_clear_round() {
        let mut parts = Parts::default();
        parts.labels.add_label("tier", "gold");
        let write_ref = parts.children.add_child("line", b"{}".to_vec());

        let mut mutation = Mutation::default();
        parts.traits().collect(&mut mutation);
        assert_eq!(mutation.labels, vec![Label::new("tier", "gold")]);
        assert_eq!(mutation.children.len(), 1);
        assert_eq!(mutation.children[0].write_ref, write_ref);

        let response = MutateResponse {
            success: true,
            child_ids: BTreeMap::from([(write_ref.clone(), "child-1".to_string())]),
            ..MutateResponse::default()
        };
        parts.traits().backfill_children(&response);
        assert_eq!(parts.children.child_id(&write_ref), Some("child-1"));
        assert!(parts.labels.has_pending());

        parts.traits().clear_pending();
        assert_eq!(parts.children.child_id(&write_ref), Some("child-1"));
        assert!(!parts.labels.has_pending());
        assert_eq!(parts.labels.label("tier"), Some("gold"));

        let mut again = Mutation::default();
        parts.traits().collect(&mut again);
        assert!(again.labels.is_empty() && again.children.is_empty());
    }

    #[test]
    fn absent_components_are_none() {
        let traits = EntityTraits::default();
        assert!(traits.base.is_none() && traits.lock.is_none());
    }
}
