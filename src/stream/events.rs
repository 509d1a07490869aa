use std::future::Future;

use futures::StreamExt;
use log::{debug, error, info};

use crate::core::Result;
use crate::proto::{Event, ResponseStream};

/// Server-pushed entity events.
pub struct EventStream {
    inner: ResponseStream<Event>,
}

impl EventStream {
    pub(crate) fn new(inner: ResponseStream<Event>) -> Self {
        Self { inner }
    }

    /// Next event; `None` once the server ends the stream or cancels it.
    pub async fn next(&mut self) -> Option<Result<Event>> {
        match self.inner.next().await? {
            Ok(event) => Some(Ok(event)),
            Err(err) if err.is_graceful() => None,
            Err(err) => Some(Err(err.into())),
        }
    }

    /// Hands every event to `handler` until the stream ends, `shutdown`
    /// resolves or the handler fails. Events arrive in server order.
    pub async fn run<H, F>(mut self, mut handler: H, shutdown: impl Future<Output = ()>) -> Result<()>
    where
        H: FnMut(Event) -> F,
        F: Future<Output = Result<()>>,
    {
        tokio::pin!(shutdown);
        let mut delivered = 0u64;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Event stream stopped by caller after {} events", delivered);
                    return Ok(());
                }
                next = self.next() => match next {
                    None => {
                        info!("Event stream ended after {} events", delivered);
                        return Ok(());
                    }
                    Some(Ok(event)) => {
                        debug!("Event {} ({}) for {}", event.id, event.event_type, event.entity_id);
                        handler(event).await?;
                        delivered += 1;
                    }
                    Some(Err(err)) => {
                        error!("Event stream failed: {}", err);
                        return Err(err);
                    }
                },
            }
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}
