use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::value::Value;
use crate::schema::EntityDefinition;

/// Vendor / application pair identifying the calling app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorApp {
    pub vendor_id: String,
    pub app_id: String,
}

impl VendorApp {
    pub fn new(vendor_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            app_id: app_id.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vendor_id.is_empty() && self.app_id.is_empty()
    }
}

/// End user on whose behalf an actor calls the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub user_agent: String,
    pub remote_ip: String,
    pub client: String,
}

/// Authorization block carried by every RPC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub source: VendorApp,
    pub token: String,
    pub trace_id: String,
    pub workspace_id: String,
    pub user: Option<User>,
}

/// Schema key: owning app plus the kebab-cased type name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub source: VendorApp,
    pub key: String,
}

impl Key {
    pub fn new(source: VendorApp, key: impl Into<String>) -> Self {
        Self {
            source,
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityProperty {
    pub property: String,
    pub value: Value,
}

impl EntityProperty {
    pub fn new(property: impl Into<String>, value: Value) -> Self {
        Self {
            property: property.into(),
            value,
        }
    }
}

/// Lifecycle state of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    #[default]
    Invalid = 0,
    Active = 1,
    Offline = 2,
    Corrupt = 3,
    Archived = 4,
    Removed = 5,
}

impl EntityState {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => Self::Active,
            2 => Self::Offline,
            3 => Self::Corrupt,
            4 => Self::Archived,
            5 => Self::Removed,
            _ => Self::Invalid,
        }
    }

    /// Only these states may be requested by a client mutation or filter.
    pub fn is_client_settable(self) -> bool {
        matches!(
            self,
            Self::Active | Self::Offline | Self::Corrupt | Self::Archived
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Notice,
    Warn,
    Error,
    Critical,
    Alert,
    Fatal,
}

/// Structured error fields on a response. A zero code with an empty message
/// means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub error_code: i32,
    pub error_message: String,
    pub extended: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ResponseStatus {
    pub fn is_error(&self) -> bool {
        self.error_code != 0 || !self.error_message.is_empty()
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            error_code: code,
            error_message: message.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Schema definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaRequest {
    pub authorization: Authorization,
    pub schema: EntityDefinition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaResponse {
    pub id: String,
    pub name: String,
    pub singular: String,
    pub plural: String,
    pub options: Vec<crate::schema::SchemaOption>,
    pub status: ResponseStatus,
}

// ---------------------------------------------------------------------------
// Retrieve
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRequest {
    pub properties: Vec<String>,
    pub decrypt: bool,
    pub schema: Option<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRequest {
    pub relationship_type: String,
    pub source: Option<VendorApp>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub name: String,
    pub latest: bool,
    pub revision: String,
    pub list_revisions: bool,
}

/// Read-side shape of a retrieval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    pub properties: Vec<PropertyRequest>,
    pub relationships: Vec<RelationshipRequest>,
    pub labels: bool,
    pub summary: bool,
    pub child_summary: bool,
    pub descendant_count: bool,
    pub relationship_count: bool,
    pub relationship_count_types: Vec<String>,
    pub documents: Vec<DocumentRequest>,
    pub objects: bool,
    pub object_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub duration_seconds: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub property: String,
    pub value: String,
}

/// Lookup of a single entity by one of its unique properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdLookup {
    pub property: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRequest {
    pub authorization: Authorization,
    pub entity_id: String,
    pub unique: Option<IdLookup>,
    pub schema: Option<Key>,
    pub view: EntityView,
    pub lock: Option<LockRequest>,
    pub verify: Vec<VerifyRequest>,
    pub shared: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub locked: bool,
    pub lock_id: String,
    pub locked_until: Option<DateTime<Utc>>,
    pub locked_by: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub property: String,
    pub matched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub relationship_type: String,
    pub target_id: String,
    pub source: Option<VendorApp>,
    pub meta: BTreeMap<String, String>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSummary {
    pub child_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub revision: String,
    pub content: Vec<u8>,
    pub content_type: String,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub path: String,
    pub size: i64,
    pub content_type: String,
    pub url: String,
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorMeasurement {
    pub property: String,
    pub value: f64,
    pub data: String,
    pub time: Option<DateTime<Utc>>,
}

/// An entity as returned by retrieve and find.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub schema: Option<Key>,
    pub state: EntityState,
    pub created: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    pub state_change: Option<DateTime<Utc>>,
    pub properties: Vec<EntityProperty>,
    pub labels: Vec<Label>,
    pub relationships: Vec<Relationship>,
    pub summary: String,
    pub child_summary: Vec<ChildSummary>,
    pub descendant_count: i64,
    pub relationship_counts: BTreeMap<String, i64>,
    pub documents: Vec<Document>,
    pub objects: Vec<ObjectInfo>,
    pub sensors: Vec<SensorMeasurement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityResponse {
    pub entity: Option<Entity>,
    pub lock: Option<LockInfo>,
    pub verified: Vec<VerifyResult>,
    pub status: ResponseStatus,
}

// ---------------------------------------------------------------------------
// Mutate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub event_type: String,
    pub properties: Vec<EntityProperty>,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLog {
    pub level: LogLevel,
    pub message: String,
    pub reference: String,
    pub trace_id: String,
    pub actor: String,
    pub data: BTreeMap<String, String>,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntity {
    pub child_type: String,
    pub id: String,
    pub write_ref: String,
    pub data: Vec<u8>,
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRemoval {
    pub child_type: String,
    pub id: String,
}

/// Flags that change how the server applies a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutateFlag {
    BackgroundIndex,
    OnConflictIgnore,
    OnConflictUpdate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub properties: Vec<EntityProperty>,
    pub labels: Vec<Label>,
    pub remove_labels: Vec<String>,
    pub measurements: Vec<SensorMeasurement>,
    pub relationships: Vec<Relationship>,
    pub remove_relationships: Vec<Relationship>,
    pub events: Vec<EntityEvent>,
    pub logs: Vec<EntityLog>,
    pub children: Vec<ChildEntity>,
    pub remove_children: Vec<ChildRemoval>,
    pub truncate_children: Vec<String>,
    pub pii_token: String,
    pub comment: String,
    pub state: EntityState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutateRequest {
    pub authorization: Authorization,
    pub entity_id: String,
    pub schema: Option<Key>,
    pub mutation: Mutation,
    pub flags: Vec<MutateFlag>,
    pub match_unique: Option<IdLookup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutateResponse {
    pub entity_id: String,
    pub success: bool,
    pub created: bool,
    /// Server-assigned child ids keyed by the write reference sent with the child.
    pub child_ids: BTreeMap<String, String>,
    pub status: ResponseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyRequest {
    pub authorization: Authorization,
    pub entity_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyResponse {
    pub success: bool,
    pub status: ResponseStatus,
}

// ---------------------------------------------------------------------------
// Find
// ---------------------------------------------------------------------------

/// Comparison applied by a [`PropertyFilter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    Between,
    IsNull,
    IsNotNull,
}

/// Leaf predicate, or an AND/OR group when `nested` is populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: String,
    pub operator: Operator,
    pub values: Vec<Value>,
    pub nested: Vec<PropertyFilter>,
    pub or: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub property: String,
    pub descending: bool,
    pub nulls_first: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationDirection {
    /// Entities that are the source of a relationship to `entity_id`.
    #[default]
    Of,
    /// Entities that `entity_id` points to.
    To,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationFilter {
    pub entity_id: String,
    pub relationship_type: String,
    pub source: VendorApp,
    pub direction: RelationDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub per_page: i32,
    pub page: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindRequest {
    pub authorization: Authorization,
    pub schema: Option<Key>,
    pub filters: Vec<PropertyFilter>,
    pub sort: Vec<SortKey>,
    pub labels: Vec<Label>,
    pub entity_ids: Vec<String>,
    pub relations: Vec<RelationFilter>,
    pub parent_id: String,
    pub page: Option<Pagination>,
    pub object_paths: Vec<String>,
    pub view: EntityView,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindResponse {
    pub entities: Vec<Entity>,
    pub total: i64,
    pub status: ResponseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupCountRequest {
    pub authorization: Authorization,
    pub schema: Option<Key>,
    pub filters: Vec<PropertyFilter>,
    pub labels: Vec<Label>,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupCount {
    pub values: Vec<EntityProperty>,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupCountResponse {
    pub groups: Vec<GroupCount>,
    pub status: ResponseStatus,
}

// ---------------------------------------------------------------------------
// Events, tasks and logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub entity_id: String,
    pub schema: Option<Key>,
    pub event_type: String,
    pub properties: Vec<EntityProperty>,
    pub actor: String,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsRequest {
    pub authorization: Authorization,
    pub entity_id: String,
    pub event_types: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub page: Option<Pagination>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
    pub status: ResponseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub authorization: Authorization,
    pub schemas: Vec<Key>,
    pub event_types: Vec<String>,
    pub entity_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    pub entity_id: String,
    pub payload: BTreeMap<String, String>,
    pub attempt: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Accepted,
    Completed,
    Failed,
    Retry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub reference: String,
    pub entity_id: String,
    pub trace_id: String,
    pub data: BTreeMap<String, String>,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBatch {
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStreamAck {
    pub batches: u64,
    pub entries: u64,
}
