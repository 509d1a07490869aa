#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use keystone::proto::{
    self, DestroyRequest, DestroyResponse, EntityRequest, EntityResponse, Event, EventSubscription,
    EventsRequest, EventsResponse, FindRequest, FindResponse, GroupCountRequest,
    GroupCountResponse, LogBatch, LogStreamAck, Metadata, MutateRequest, MutateResponse,
    ResponseStream, SchemaRequest, SchemaResponse, Task, TaskUpdate, Transport, TransportCode,
    TransportError, TransportResult,
};
use keystone::{Connection, ConnectionConfig};

pub const VENDOR: &str = "ven";
pub const APP: &str = "app";
pub const TOKEN: &str = "token-1";

/// In-memory transport that records every request and answers from canned
/// responses.
#[derive(Default)]
pub struct RecordingTransport {
    define_delay: Option<Duration>,
    failing_defines: AtomicUsize,
    retrieve_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<String>>,
    defines: Mutex<Vec<SchemaRequest>>,
    retrieves: Mutex<Vec<EntityRequest>>,
    mutates: Mutex<Vec<MutateRequest>>,
    finds: Mutex<Vec<FindRequest>>,
    group_counts: Mutex<Vec<GroupCountRequest>>,
    destroys: Mutex<Vec<DestroyRequest>>,
    subscriptions: Mutex<Vec<(Metadata, EventSubscription)>>,
    log_batches: Mutex<Vec<LogBatch>>,
    task_updates: Arc<Mutex<Vec<TaskUpdate>>>,
    entity: Mutex<Option<proto::Entity>>,
    found: Mutex<Vec<proto::Entity>>,
    mutate_response: Mutex<Option<MutateResponse>>,
    events: Mutex<Vec<Event>>,
    tasks: Mutex<Vec<Task>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delays every `define` so concurrent callers overlap with it.
    pub fn with_define_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            define_delay: Some(delay),
            ..Self::default()
        })
    }

    /// Makes the next `count` defines fail with `Unavailable`.
    pub fn fail_next_defines(&self, count: usize) {
        self.failing_defines.store(count, Ordering::SeqCst);
    }

    pub fn set_retrieve_delay(&self, delay: Duration) {
        *lock(&self.retrieve_delay) = Some(delay);
    }

    pub fn set_entity(&self, entity: proto::Entity) {
        *lock(&self.entity) = Some(entity);
    }

    pub fn set_found(&self, entities: Vec<proto::Entity>) {
        *lock(&self.found) = entities;
    }

    pub fn set_mutate_response(&self, response: MutateResponse) {
        *lock(&self.mutate_response) = Some(response);
    }

    pub fn set_events(&self, events: Vec<Event>) {
        *lock(&self.events) = events;
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        *lock(&self.tasks) = tasks;
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn defines(&self) -> Vec<SchemaRequest> {
        lock(&self.defines).clone()
    }

    pub fn retrieves(&self) -> Vec<EntityRequest> {
        lock(&self.retrieves).clone()
    }

    pub fn mutates(&self) -> Vec<MutateRequest> {
        lock(&self.mutates).clone()
    }

    pub fn finds(&self) -> Vec<FindRequest> {
        lock(&self.finds).clone()
    }

    pub fn group_counts(&self) -> Vec<GroupCountRequest> {
        lock(&self.group_counts).clone()
    }

    pub fn destroys(&self) -> Vec<DestroyRequest> {
        lock(&self.destroys).clone()
    }

    pub fn subscriptions(&self) -> Vec<(Metadata, EventSubscription)> {
        lock(&self.subscriptions).clone()
    }

    pub fn log_batches(&self) -> Vec<LogBatch> {
        lock(&self.log_batches).clone()
    }

    pub fn task_updates(&self) -> Vec<TaskUpdate> {
        lock(&self.task_updates).clone()
    }

    fn record(&self, call: &str) {
        lock(&self.calls).push(call.to_string());
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn define(&self, request: SchemaRequest) -> TransportResult<SchemaResponse> {
        self.record("define");
        if let Some(delay) = self.define_delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failing_defines
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if failing.is_ok() {
            self.record("define failed");
            return Err(TransportError::new(TransportCode::Unavailable, "schema service down"));
        }
        let id = format!("sch-{}", request.schema.type_name);
        lock(&self.defines).push(request);
        self.record("define done");
        Ok(SchemaResponse {
            id,
            ..SchemaResponse::default()
        })
    }

    async fn mutate(&self, request: MutateRequest) -> TransportResult<MutateResponse> {
        self.record("mutate");
        let entity_id = if request.entity_id.is_empty() {
            "ent-1".to_string()
        } else {
            request.entity_id.clone()
        };
        lock(&self.mutates).push(request);
        Ok(lock(&self.mutate_response).clone().unwrap_or(MutateResponse {
            entity_id,
            success: true,
            ..MutateResponse::default()
        }))
    }

    async fn retrieve(&self, request: EntityRequest) -> TransportResult<EntityResponse> {
        self.record("retrieve");
        let delay = *lock(&self.retrieve_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.retrieves).push(request);
        Ok(EntityResponse {
            entity: lock(&self.entity).clone(),
            ..EntityResponse::default()
        })
    }

    async fn find(&self, request: FindRequest) -> TransportResult<FindResponse> {
        self.record("find");
        lock(&self.finds).push(request);
        let entities = lock(&self.found).clone();
        Ok(FindResponse {
            total: entities.len() as i64,
            entities,
            ..FindResponse::default()
        })
    }

    async fn group_count(&self, request: GroupCountRequest) -> TransportResult<GroupCountResponse> {
        self.record("group_count");
        lock(&self.group_counts).push(request);
        Ok(GroupCountResponse::default())
    }

    async fn destroy(&self, request: DestroyRequest) -> TransportResult<DestroyResponse> {
        self.record("destroy");
        lock(&self.destroys).push(request);
        Ok(DestroyResponse {
            success: true,
            ..DestroyResponse::default()
        })
    }

    async fn list_events(&self, _request: EventsRequest) -> TransportResult<EventsResponse> {
        self.record("list_events");
        Ok(EventsResponse {
            events: lock(&self.events).clone(),
            ..EventsResponse::default()
        })
    }

    async fn subscribe_events(
        &self,
        metadata: Metadata,
        request: EventSubscription,
    ) -> TransportResult<ResponseStream<Event>> {
        self.record("subscribe_events");
        lock(&self.subscriptions).push((metadata, request));
        let events: Vec<TransportResult<Event>> = lock(&self.events).iter().cloned().map(Ok).collect();
        Ok(stream::iter(events)
            .chain(stream::once(async { Err(TransportError::end_of_stream()) }))
            .boxed())
    }

    async fn task_stream(
        &self,
        _metadata: Metadata,
        updates: BoxStream<'static, TaskUpdate>,
    ) -> TransportResult<ResponseStream<Task>> {
        self.record("task_stream");
        let sink = Arc::clone(&self.task_updates);
        tokio::spawn(async move {
            let mut updates = updates;
            while let Some(update) = updates.next().await {
                lock(&sink).push(update);
            }
        });
        let tasks: Vec<TransportResult<Task>> = lock(&self.tasks).iter().cloned().map(Ok).collect();
        Ok(stream::iter(tasks).boxed())
    }

    async fn log_stream(
        &self,
        _metadata: Metadata,
        batches: BoxStream<'static, LogBatch>,
    ) -> TransportResult<LogStreamAck> {
        self.record("log_stream");
        let received: Vec<LogBatch> = batches.collect().await;
        let ack = LogStreamAck {
            batches: received.len() as u64,
            entries: received.iter().map(|batch| batch.entries.len() as u64).sum(),
        };
        lock(&self.log_batches).extend(received);
        Ok(ack)
    }
}

pub fn config() -> ConnectionConfig {
    ConnectionConfig::new(VENDOR, APP, TOKEN)
}

pub fn connect(transport: &Arc<RecordingTransport>) -> Arc<Connection> {
    connect_with(transport, config())
}

pub fn connect_with(transport: &Arc<RecordingTransport>, config: ConnectionConfig) -> Arc<Connection> {
    let transport: Arc<dyn Transport> = transport.clone();
    Connection::new(transport, config).unwrap()
}

/// A wire entity carrying `properties`.
pub fn entity(entity_id: &str, properties: Vec<(&str, keystone::Value)>) -> proto::Entity {
    proto::Entity {
        entity_id: entity_id.to_string(),
        state: proto::EntityState::Active,
        properties: properties
            .into_iter()
            .map(|(property, value)| proto::EntityProperty::new(property, value))
            .collect(),
        ..proto::Entity::default()
    }
}
