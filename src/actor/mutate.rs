use tracing::{Instrument, Level, event};

use super::{Actor, check_status};
use crate::core::{KeystoneError, PropertyMap, Result};
use crate::entity::Entity;
use crate::mapper;
use crate::mutate::{self as options, MutateOption};
use crate::proto::{
    DestroyRequest, DestroyResponse, EntityState, MutateRequest, MutateResponse, Mutation,
};
use crate::watcher::Watcher;

impl Actor {
    /// Writes the changes of `record`.
    ///
    /// Records embedding [`BaseEntity`](crate::entity::BaseEntity) send only
    /// what differs from their watcher snapshot (or from the type's defaults
    /// when they have none yet); other records are marshalled in full. On
    /// success the child ids, observers, entity id, queued component data and
    /// watcher are updated in that order. A failed call leaves the watcher as
    /// it was.
    pub async fn mutate<T: Entity>(
        &self,
        record: &mut T,
        options: &[Box<dyn MutateOption>],
    ) -> Result<MutateResponse> {
        let connection = self.connection()?;
        let registered = self.register::<T>(connection).await?;

        let properties = changed_properties(record, options)?;
        let mut mutation = Mutation {
            properties: mapper::to_entity_properties(&properties),
            ..Mutation::default()
        };
        let entity_id = {
            let traits = record.traits();
            traits.collect(&mut mutation);
            traits
                .base
                .map(|base| base.entity_id().to_string())
                .unwrap_or_default()
        };

        let mut request = MutateRequest {
            authorization: self.authorization()?,
            entity_id,
            schema: Some(registered.key(&connection.vendor_app())),
            mutation,
            ..MutateRequest::default()
        };
        for option in options {
            option.apply(&mut request);
        }
        if registered.requires_comment() && request.mutation.comment.is_empty() {
            return Err(KeystoneError::CommentRequired(registered.type_name()));
        }

        let span = self.span("mutate");
        let response = connection
            .request("mutate", connection.transport().mutate(request).instrument(span.clone()))
            .await?;
        check_status(&response.status)?;

        if response.success {
            span.in_scope(|| mutation_succeeded(record, &response, options));
        } else {
            mapper::observe_mutation(record, false);
        }
        Ok(response)
    }

    /// Moves `record` to `state` through a mutation carrying its pending changes.
    pub async fn set_state<T: Entity>(&self, record: &mut T, state: EntityState) -> Result<MutateResponse> {
        let response = self.mutate(record, &[options::with_state(state)?]).await?;
        if response.success {
            if let Some(base) = record.traits().base {
                base.set_state(state);
            }
        }
        Ok(response)
    }

    /// Destroys an entity.
    pub async fn remove(&self, entity_id: impl Into<String>, reason: impl Into<String>) -> Result<DestroyResponse> {
        let connection = self.connection()?;
        let request = DestroyRequest {
            authorization: self.authorization()?,
            entity_id: entity_id.into(),
            reason: reason.into(),
        };
        let response = connection
            .request(
                "destroy",
                connection.transport().destroy(request).instrument(self.span("destroy")),
            )
            .await?;
        check_status(&response.status)?;
        Ok(response)
    }
}

/// Properties to send: a watcher diff for watched records, everything otherwise.
///
/// Option hooks prune a copy of the watcher; the record keeps its own
/// snapshot until the mutation succeeds.
fn changed_properties<T: Entity>(record: &mut T, options: &[Box<dyn MutateOption>]) -> Result<PropertyMap> {
    let watched = {
        let traits = record.traits();
        traits.base.map(|base| base.watcher().cloned())
    };
    let mut watcher = match watched {
        None => return mapper::marshal(&*record),
        Some(Some(watcher)) => watcher,
        Some(None) => Watcher::defaults::<T>()?,
    };
    for option in options {
        option.prepare_watcher(&mut watcher);
    }
    watcher.changes(&*record, false)
}

/// Post-success order: child ids, option and value observers, entity id,
/// pending component data, then a fresh watcher snapshot.
fn mutation_succeeded<T: Entity>(
    record: &mut T,
    response: &MutateResponse,
    options: &[Box<dyn MutateOption>],
) {
    record.traits().backfill_children(response);
    for option in options {
        option.observe_mutation(response);
    }
    mapper::observe_mutation(record, true);

    let watched = {
        let mut traits = record.traits();
        let watched = traits.base.as_deref_mut().map(|base| {
            if !response.entity_id.is_empty() && base.entity_id() != response.entity_id {
                base.set_entity_id(response.entity_id.clone());
            }
            base.take_watcher()
        });
        traits.clear_pending();
        watched
    };
    if let Some(previous) = watched {
        match Watcher::new(&*record) {
            Ok(watcher) => {
                if let Some(base) = record.traits().base {
                    base.set_watcher(watcher);
                }
            }
            Err(err) => {
                if let (Some(previous), Some(base)) = (previous, record.traits().base) {
                    base.set_watcher(previous);
                }
                event!(Level::WARN, error = %err, "watcher left uncommitted");
            }
        }
    }
    event!(
        Level::DEBUG,
        entity_id = %response.entity_id,
        created = response.created,
        children = response.child_ids.len(),
        "mutation applied"
    );
}
