use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::Instrument;

use super::retrieve::hydrate_record;
use super::{Actor, check_status};
use crate::core::{KeystoneError, Result, type_key};
use crate::entity::Entity;
use crate::filter::{FilterRequest, FindOption};
use crate::proto::{
    EntityRequest, Event, EventSubscription, EventsRequest, FindResponse, GroupCount, Key,
    Pagination,
};
use crate::retrieve::{RetrieveOption, build_view};
use crate::stream::{EventStream, LogStream, TaskStream, receiver_stream};

impl Actor {
    /// Finds entities of `schema_type`, returned as raw wire entities.
    ///
    /// Locks and property verification apply to single-entity reads only;
    /// passing [`with_lock`](crate::retrieve::with_lock) or
    /// [`verify_property`](crate::retrieve::verify_property) here fails with
    /// [`KeystoneError::InvalidValue`].
    pub async fn find<I, O>(
        &self,
        schema_type: &str,
        view: &[Box<dyn RetrieveOption>],
        options: I,
    ) -> Result<FindResponse>
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<FindOption>>,
    {
        let connection = self.connection()?;
        let key = Key::new(connection.vendor_app(), type_key(schema_type));
        self.dispatch_find(key, view, FilterRequest::new(options)).await
    }

    /// Finds entities of `T` and hydrates one record per result.
    pub async fn find_as<T, I, O>(&self, view: &[Box<dyn RetrieveOption>], options: I) -> Result<Vec<T>>
    where
        T: Entity,
        I: IntoIterator<Item = O>,
        O: Into<Option<FindOption>>,
    {
        let connection = self.connection()?;
        let registered = self.register::<T>(connection).await?;
        let key = registered.key(&connection.vendor_app());
        let response = self.dispatch_find(key, view, FilterRequest::new(options)).await?;

        response
            .entities
            .iter()
            .map(|entity| {
                let mut record = T::default();
                hydrate_record(&mut record, entity)?;
                Ok(record)
            })
            .collect()
    }

    /// Counts entities of `schema_type` grouped by the values of `properties`.
    pub async fn group_count<I, O, S>(
        &self,
        schema_type: &str,
        properties: impl IntoIterator<Item = S>,
        options: I,
    ) -> Result<Vec<GroupCount>>
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<FindOption>>,
        S: Into<String>,
    {
        let connection = self.connection()?;
        let mut request = FilterRequest::new(options)
            .into_group_count_request(properties.into_iter().map(Into::into).collect());
        request.authorization = self.authorization()?;
        request.schema = Some(Key::new(connection.vendor_app(), type_key(schema_type)));

        let response = connection
            .request(
                "group_count",
                connection.transport().group_count(request).instrument(self.span("group_count")),
            )
            .await?;
        check_status(&response.status)?;
        Ok(response.groups)
    }

    /// Recorded events of one entity, optionally restricted by type and age.
    pub async fn events<S: Into<String>>(
        &self,
        entity_id: impl Into<String>,
        event_types: impl IntoIterator<Item = S>,
        since: Option<DateTime<Utc>>,
        page: Option<Pagination>,
    ) -> Result<Vec<Event>> {
        let connection = self.connection()?;
        let request = EventsRequest {
            authorization: self.authorization()?,
            entity_id: entity_id.into(),
            event_types: event_types.into_iter().map(Into::into).collect(),
            since,
            page,
        };
        let response = connection
            .request(
                "list_events",
                connection.transport().list_events(request).instrument(self.span("list_events")),
            )
            .await?;
        check_status(&response.status)?;
        Ok(response.events)
    }

    /// Opens a server stream of events for `schema_types`.
    pub async fn subscribe_events<S: AsRef<str>, E: Into<String>>(
        &self,
        schema_types: impl IntoIterator<Item = S>,
        event_types: impl IntoIterator<Item = E>,
    ) -> Result<EventStream> {
        let connection = self.connection()?;
        let source = connection.vendor_app();
        let subscription = EventSubscription {
            authorization: self.authorization()?,
            schemas: schema_types
                .into_iter()
                .map(|schema_type| Key::new(source.clone(), type_key(schema_type.as_ref())))
                .collect(),
            event_types: event_types.into_iter().map(Into::into).collect(),
            entity_ids: Vec::new(),
        };
        let subscribe = connection
            .transport()
            .subscribe_events(self.metadata()?, subscription)
            .instrument(self.span("subscribe_events"));
        let inner = connection.open_stream("subscribe_events", subscribe).await?;
        Ok(EventStream::new(inner))
    }

    /// Opens the bidirectional task stream.
    pub async fn task_stream(&self) -> Result<TaskStream> {
        let connection = self.connection()?;
        let (sender, receiver) = mpsc::channel(connection.config().log_stream_capacity.max(1));
        let open = connection
            .transport()
            .task_stream(self.metadata()?, receiver_stream(receiver))
            .instrument(self.span("task_stream"));
        let tasks = connection.open_stream("task_stream", open).await?;
        Ok(TaskStream::new(tasks, sender))
    }

    /// Starts a log stream; call [`LogStream::stop`] to flush it.
    pub fn log_stream(&self) -> Result<LogStream> {
        let connection = self.connection()?;
        Ok(LogStream::start(
            connection.clone(),
            self.metadata()?,
            self.trace_id.clone(),
        ))
    }

    async fn dispatch_find(
        &self,
        key: Key,
        view: &[Box<dyn RetrieveOption>],
        filter: FilterRequest,
    ) -> Result<FindResponse> {
        let connection = self.connection()?;
        reject_request_options(view)?;
        let mut request = filter.into_find_request(build_view(view));
        for properties in &mut request.view.properties {
            properties.schema = Some(key.clone());
        }
        request.authorization = self.authorization()?;
        request.schema = Some(key);

        let response = connection
            .request("find", connection.transport().find(request).instrument(self.span("find")))
            .await?;
        check_status(&response.status)?;
        Ok(response)
    }
}

/// Fails when a view option would change the request of a single-entity read.
fn reject_request_options(view: &[Box<dyn RetrieveOption>]) -> Result<()> {
    let mut scratch = EntityRequest::default();
    for option in view {
        option.apply_request(&mut scratch);
    }
    if scratch.lock.is_some() || !scratch.verify.is_empty() {
        return Err(KeystoneError::invalid_value(
            "view",
            "locks and property verification apply to get only",
        ));
    }
    Ok(())
}
