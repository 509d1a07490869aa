/// Event, task and log stream tests against a recording in-memory transport.
/// Run with: cargo test --test stream_tests
mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use common::{RecordingTransport, connect};
use keystone::actor::{META_TOKEN, META_WORKSPACE};
use keystone::prelude::*;
use keystone::proto::{Event, LogBatch, LogEntry, Task, TaskStatus};
use tokio_test::{assert_err, assert_ok};

fn event(id: &str, event_type: &str) -> Event {
    Event {
        id: id.to_string(),
        entity_id: "e-1".to_string(),
        event_type: event_type.to_string(),
        ..Event::default()
    }
}

#[tokio::test]
async fn test_subscribe_events_delivers_until_eof() {
    let transport = RecordingTransport::new();
    transport.set_events(vec![event("ev-1", "created"), event("ev-2", "updated")]);
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let stream = actor
        .subscribe_events(["Order"], ["created", "updated"])
        .await
        .unwrap();

    let mut seen = Vec::new();
    stream
        .run(
            |event| {
                seen.push(event.id);
                async { Ok::<(), KeystoneError>(()) }
            },
            std::future::pending(),
        )
        .await
        .unwrap();
    assert_eq!(seen, vec!["ev-1", "ev-2"]);

    let (metadata, subscription) = transport.subscriptions().remove(0);
    assert_eq!(metadata[META_WORKSPACE], "ws1");
    assert_eq!(metadata[META_TOKEN], common::TOKEN);
    assert_eq!(subscription.schemas[0].key, "order");
    assert_eq!(subscription.event_types, vec!["created", "updated"]);
}

#[tokio::test]
async fn test_event_stream_next_ends_with_none() {
    let transport = RecordingTransport::new();
    transport.set_events(vec![event("ev-1", "created")]);
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut stream = actor
        .subscribe_events(["Order"], Vec::<String>::new())
        .await
        .unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap().id, "ev-1");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_list_events() {
    let transport = RecordingTransport::new();
    transport.set_events(vec![event("ev-1", "created")]);
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let events = actor
        .events("e-1", ["created"], None, None)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "created");
}

#[tokio::test]
async fn test_task_results_flow_back() {
    let transport = RecordingTransport::new();
    transport.set_tasks(vec![
        Task {
            id: "t-1".to_string(),
            task_type: "resize".to_string(),
            ..Task::default()
        },
        Task {
            id: "t-2".to_string(),
            task_type: "unknown".to_string(),
            ..Task::default()
        },
    ]);
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let tasks = actor.task_stream().await.unwrap();
    tasks
        .run(
            |task| async move {
                if task.task_type != "resize" {
                    anyhow::bail!("no handler for {}", task.task_type);
                }
                Ok(BTreeMap::from([("width".to_string(), "640".to_string())]))
            },
            std::future::pending(),
        )
        .await
        .unwrap();

    let mut updates = transport.task_updates();
    for _ in 0..50 {
        if updates.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        updates = transport.task_updates();
    }
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].task_id, "t-1");
    assert_eq!(updates[0].status, TaskStatus::Completed);
    assert_eq!(updates[0].data["width"], "640");
    assert_eq!(updates[1].status, TaskStatus::Failed);
    assert_eq!(updates[1].message, "no handler for unknown");
}

#[tokio::test]
async fn test_log_stream_drains_on_stop() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let logs = actor.log_stream().unwrap();
    assert_ok!(logs.log(LogLevel::Info, "starting").await);
    logs.log_batch(LogBatch {
        entries: vec![
            LogEntry {
                message: "one".to_string(),
                ..LogEntry::default()
            },
            LogEntry {
                message: "two".to_string(),
                ..LogEntry::default()
            },
        ],
    })
    .await
    .unwrap();
    // Empty batches are dropped without reaching the server.
    logs.log_batch(LogBatch::default()).await.unwrap();

    let ack = logs.stop().await.unwrap();
    assert_eq!(ack.batches, 2);
    assert_eq!(ack.entries, 3);
    assert!(logs.is_stopped());

    let batches = transport.log_batches();
    assert_eq!(batches[0].entries[0].message, "starting");
    assert_eq!(batches[0].entries[0].trace_id, actor.trace_id());

    let err = assert_err!(logs.log(LogLevel::Warn, "late").await);
    assert!(matches!(err, KeystoneError::StreamClosed(_)));
}
