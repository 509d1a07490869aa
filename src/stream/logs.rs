use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::receiver_stream;
use crate::connection::Connection;
use crate::core::{KeystoneError, Result};
use crate::proto::{LogBatch, LogEntry, LogLevel, LogStreamAck, Metadata, TransportResult};

/// Client stream of log batches backed by a bounded queue.
///
/// Batches are queued by [`log_batch`](LogStream::log_batch) and forwarded by
/// a background worker. [`stop`](LogStream::stop) refuses new batches, waits
/// until every queued batch has been handed to the transport and closes the
/// send half.
pub struct LogStream {
    sender: Mutex<Option<mpsc::Sender<LogBatch>>>,
    worker: Mutex<Option<JoinHandle<TransportResult<LogStreamAck>>>>,
    trace_id: String,
}

impl LogStream {
    pub(crate) fn start(connection: Arc<Connection>, metadata: Metadata, trace_id: String) -> Self {
        let capacity = connection.config().log_stream_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let worker = tokio::spawn(async move {
            let ack = connection
                .transport()
                .log_stream(metadata, receiver_stream(receiver))
                .await;
            match &ack {
                Ok(ack) => info!("Log stream closed: {} batches, {} entries", ack.batches, ack.entries),
                Err(err) => error!("Log stream failed: {}", err),
            }
            ack
        });
        debug!("Log stream started with capacity {}", capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            trace_id,
        }
    }

    /// Queues `batch`; waits for room when the queue is full.
    pub async fn log_batch(&self, batch: LogBatch) -> Result<()> {
        if batch.entries.is_empty() {
            return Ok(());
        }
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(closed)?;
        sender.send(batch).await.map_err(|_| closed())
    }

    /// Queues a single entry stamped with the actor's trace id.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<()> {
        self.log_batch(LogBatch {
            entries: vec![LogEntry {
                level,
                message: message.into(),
                trace_id: self.trace_id.clone(),
                time: Some(Utc::now()),
                ..LogEntry::default()
            }],
        })
        .await
    }

    pub fn is_stopped(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stops accepting batches, drains the queue and returns the server's ack.
    pub async fn stop(&self) -> Result<LogStreamAck> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(closed)?;
        let ack = worker
            .await
            .map_err(|err| KeystoneError::StreamClosed(format!("log stream worker: {}", err)))??;
        Ok(ack)
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.abort();
        }
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("stopped", &self.is_stopped())
            .field("trace_id", &self.trace_id)
            .finish()
    }
}

fn closed() -> KeystoneError {
    KeystoneError::StreamClosed("log stream stopped".to_string())
}
