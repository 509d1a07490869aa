use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use super::messages::*;

/// Request metadata attached to streaming calls.
pub type Metadata = BTreeMap<String, String>;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Server-pushed sequence of messages.
pub type ResponseStream<T> = BoxStream<'static, TransportResult<T>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    PermissionDenied,
    Unauthenticated,
    Unavailable,
    Internal,
    EndOfStream,
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid argument",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::Unauthenticated => "unauthenticated",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
            Self::EndOfStream => "end of stream",
        };
        f.write_str(label)
    }
}

/// Failure raised by the transport itself, before any response was decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub code: TransportCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(TransportCode::Cancelled, "context canceled")
    }

    pub fn end_of_stream() -> Self {
        Self::new(TransportCode::EndOfStream, "EOF")
    }

    pub fn deadline_exceeded(rpc: &str, after: Duration) -> Self {
        Self::new(
            TransportCode::DeadlineExceeded,
            format!("{} timed out after {:?}", rpc, after),
        )
    }

    /// Cancellation and EOF end a stream without being failures.
    pub fn is_graceful(&self) -> bool {
        matches!(self.code, TransportCode::Cancelled | TransportCode::EndOfStream)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for TransportError {}

/// Awaits `call`, failing with `DeadlineExceeded` once `limit` has elapsed.
pub async fn with_deadline<T>(
    limit: Option<Duration>,
    rpc: &str,
    call: impl Future<Output = TransportResult<T>>,
) -> TransportResult<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| TransportError::deadline_exceeded(rpc, limit))?,
        None => call.await,
    }
}

/// One method per Keystone RPC. Implemented by the generated client adapter
/// (and by in-memory fakes in tests); shared by every actor of a connection.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn define(&self, request: SchemaRequest) -> TransportResult<SchemaResponse>;

    async fn mutate(&self, request: MutateRequest) -> TransportResult<MutateResponse>;

    async fn retrieve(&self, request: EntityRequest) -> TransportResult<EntityResponse>;

    async fn find(&self, request: FindRequest) -> TransportResult<FindResponse>;

    async fn group_count(&self, request: GroupCountRequest) -> TransportResult<GroupCountResponse>;

    async fn destroy(&self, request: DestroyRequest) -> TransportResult<DestroyResponse>;

    async fn list_events(&self, request: EventsRequest) -> TransportResult<EventsResponse>;

    async fn subscribe_events(
        &self,
        metadata: Metadata,
        request: EventSubscription,
    ) -> TransportResult<ResponseStream<Event>>;

    /// Bidirectional task stream: `updates` flows to the server, tasks flow back.
    async fn task_stream(
        &self,
        metadata: Metadata,
        updates: BoxStream<'static, TaskUpdate>,
    ) -> TransportResult<ResponseStream<Task>>;

    /// Client stream of log batches; resolves once `batches` ends.
    async fn log_stream(
        &self,
        metadata: Metadata,
        batches: BoxStream<'static, LogBatch>,
    ) -> TransportResult<LogStreamAck>;
}
