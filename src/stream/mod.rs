//! Long-lived streams: pushed events, the bidirectional task stream and the
//! batched log stream.

mod events;
mod logs;
mod tasks;

pub use events::EventStream;
pub use logs::LogStream;
pub use tasks::{TaskHandlerResult, TaskStream};

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;

/// Adapts a channel receiver into the stream a transport consumes.
pub(crate) fn receiver_stream<T: Send + 'static>(receiver: mpsc::Receiver<T>) -> BoxStream<'static, T> {
    futures::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|item| (item, receiver))
    })
    .boxed()
}
