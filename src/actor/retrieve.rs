use tracing::{Instrument, Level, event};

use super::{Actor, check_status};
use crate::core::{PropertyMap, Result, Value, type_key};
use crate::entity::Entity;
use crate::mapper;
use crate::proto::{self, EntityRequest, EntityResponse, IdLookup, Key};
use crate::retrieve::{RetrieveOption, build_view};
use crate::types::HashId;
use crate::watcher::Watcher;

/// Identifies the single entity a retrieval targets.
#[derive(Debug, Clone, PartialEq)]
pub enum Retriever {
    EntityId(String),
    HashId(HashId),
    Unique { property: String, value: Value },
}

impl Retriever {
    pub fn by_id(entity_id: impl Into<String>) -> Self {
        Self::EntityId(entity_id.into())
    }

    /// Rejects raw keys containing `#`.
    pub fn by_hash_id(raw: impl Into<String>) -> Result<Self> {
        Ok(Self::HashId(HashId::new(raw)?))
    }

    pub fn by_unique(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Unique {
            property: property.into(),
            value: value.into(),
        }
    }

    fn apply(&self, request: &mut EntityRequest) {
        match self {
            Self::EntityId(entity_id) => request.entity_id = entity_id.clone(),
            Self::HashId(hash_id) => request.entity_id = hash_id.to_string(),
            Self::Unique { property, value } => {
                request.unique = Some(IdLookup {
                    property: property.clone(),
                    value: value.clone(),
                })
            }
        }
    }
}

impl Actor {
    /// Reads one entity into `destination`.
    ///
    /// Registers the destination's schema first, then hydrates lock info,
    /// the watcher, mix-in components and finally the fields themselves.
    pub async fn get<T: Entity>(
        &self,
        retriever: Retriever,
        destination: &mut T,
        options: &[Box<dyn RetrieveOption>],
    ) -> Result<EntityResponse> {
        let connection = self.connection()?;
        let mut request = self.entity_request(&retriever, options)?;
        let registered = self.register::<T>(connection).await?;
        stamp_schema(&mut request, registered.key(&connection.vendor_app()));

        let response = self.dispatch_retrieve(request).await?;
        apply_retrieve(destination, &response, options)?;
        Ok(response)
    }

    pub async fn get_by_id<T: Entity>(
        &self,
        entity_id: impl Into<String>,
        destination: &mut T,
        options: &[Box<dyn RetrieveOption>],
    ) -> Result<EntityResponse> {
        self.get(Retriever::by_id(entity_id), destination, options).await
    }

    pub async fn get_by_unique<T: Entity>(
        &self,
        property: impl Into<String>,
        value: impl Into<Value>,
        destination: &mut T,
        options: &[Box<dyn RetrieveOption>],
    ) -> Result<EntityResponse> {
        self.get(Retriever::by_unique(property, value), destination, options)
            .await
    }

    /// Reads the entity whose id the server derives from `raw`.
    pub async fn get_by_hash_id<T: Entity>(
        &self,
        raw: impl Into<String>,
        destination: &mut T,
        options: &[Box<dyn RetrieveOption>],
    ) -> Result<EntityResponse> {
        self.get(Retriever::by_hash_id(raw)?, destination, options).await
    }

    /// Reads an entity of `schema_type` as a plain property map.
    pub async fn get_properties(
        &self,
        schema_type: &str,
        retriever: Retriever,
        options: &[Box<dyn RetrieveOption>],
    ) -> Result<PropertyMap> {
        let connection = self.connection()?;
        let mut request = self.entity_request(&retriever, options)?;
        stamp_schema(&mut request, Key::new(connection.vendor_app(), type_key(schema_type)));

        let response = self.dispatch_retrieve(request).await?;
        for option in options {
            option.observe_retrieve(&response);
        }
        Ok(response
            .entity
            .as_ref()
            .map(|entity| mapper::from_entity_properties(&entity.properties))
            .unwrap_or_default())
    }

    /// Reads an entity shared by another application. The record type is not
    /// registered: the entity lives under its owner's schema.
    pub async fn get_shared_by_id<T: Entity>(
        &self,
        entity_id: impl Into<String>,
        destination: &mut T,
        options: &[Box<dyn RetrieveOption>],
    ) -> Result<EntityResponse> {
        let mut request = self.entity_request(&Retriever::by_id(entity_id), options)?;
        request.shared = true;

        let response = self.dispatch_retrieve(request).await?;
        apply_retrieve(destination, &response, options)?;
        Ok(response)
    }

    fn entity_request(
        &self,
        retriever: &Retriever,
        options: &[Box<dyn RetrieveOption>],
    ) -> Result<EntityRequest> {
        let mut request = EntityRequest {
            authorization: self.authorization()?,
            view: build_view(options),
            ..EntityRequest::default()
        };
        retriever.apply(&mut request);
        for option in options {
            option.apply_request(&mut request);
        }
        Ok(request)
    }

    async fn dispatch_retrieve(&self, request: EntityRequest) -> Result<EntityResponse> {
        let connection = self.connection()?;
        let span = self.span("retrieve");
        let response = connection
            .request("retrieve", connection.transport().retrieve(request).instrument(span))
            .await?;
        check_status(&response.status)?;
        Ok(response)
    }
}

fn stamp_schema(request: &mut EntityRequest, key: Key) {
    for properties in &mut request.view.properties {
        properties.schema = Some(key.clone());
    }
    request.schema = Some(key);
}

fn apply_retrieve<T: Entity>(
    destination: &mut T,
    response: &EntityResponse,
    options: &[Box<dyn RetrieveOption>],
) -> Result<()> {
    destination.traits().set_lock(response.lock.as_ref());
    for option in options {
        option.observe_retrieve(response);
    }
    destination.observe_retrieve(response);
    match &response.entity {
        Some(entity) => hydrate_record(destination, entity),
        None => Ok(()),
    }
}

/// Copies a retrieved entity into `record`: mix-in components, the
/// marshalled fields, then the watcher snapshot.
///
/// A record without a watcher gets one seeded from its whole hydrated form,
/// so fields outside a partial view do not count as changed on the next
/// mutation.
pub(super) fn hydrate_record<T: Entity>(record: &mut T, entity: &proto::Entity) -> Result<()> {
    let properties = mapper::from_entity_properties(&entity.properties);
    let needs_watcher = {
        let mut traits = record.traits();
        let needs_watcher = match traits.base.as_deref_mut() {
            Some(base) => match base.watcher_mut() {
                Some(watcher) => {
                    watcher.hydrate(&properties);
                    false
                }
                None => true,
            },
            None => false,
        };
        traits.hydrate(entity);
        needs_watcher
    };
    mapper::unmarshal(&properties, record)?;
    if needs_watcher {
        let watcher = Watcher::new(&*record)?;
        if let Some(base) = record.traits().base {
            base.set_watcher(watcher);
        }
    }
    event!(
        Level::DEBUG,
        entity_id = %entity.entity_id,
        properties = properties.len(),
        "entity hydrated"
    );
    Ok(())
}
