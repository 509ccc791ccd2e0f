use super::dispatch::{self, OverflowPolicy};
use super::handler::{self, HandlerArgs, HandlerError, HandlerFault};
use super::reconnect::{Backoff, ReconnectPolicy};
use super::state::{self, ConnectionState};
use super::{Publisher, Subscriber};
use crate::config::ClientSettings;
use crate::transport::Endpoint;
use crate::utils::RelayError;
use futures_util::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[test]
fn test_backoff_grows_and_caps() {
    let policy = ReconnectPolicy {
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(1000),
        multiplier: 2.0,
        max_retries: None,
        connect_timeout: Duration::from_secs(1),
    };
    assert_eq!(policy.delay_for(0), Some(Duration::from_millis(100)));
    assert_eq!(policy.delay_for(1), Some(Duration::from_millis(200)));
    assert_eq!(policy.delay_for(3), Some(Duration::from_millis(800)));
    assert_eq!(policy.delay_for(4), Some(Duration::from_millis(1000)));
    assert_eq!(policy.delay_for(u32::MAX), Some(Duration::from_millis(1000)));
}

#[test]
fn test_backoff_gives_up_after_max_retries() {
    let policy = ReconnectPolicy {
        max_retries: Some(2),
        ..ReconnectPolicy::default()
    };
    let mut backoff = Backoff::new(policy);
    assert!(backoff.next_delay().is_some());
    assert!(backoff.next_delay().is_some());
    assert!(backoff.next_delay().is_none());

    backoff.reset();
    assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
}

#[tokio::test]
async fn test_queue_is_fifo() {
    let (tx, mut rx) = dispatch::channel(4, OverflowPolicy::DropNewest);
    tx.push("a".to_string()).await;
    tx.push("b".to_string()).await;
    assert_eq!(rx.pop().await.as_deref(), Some("a"));
    assert_eq!(rx.pop().await.as_deref(), Some("b"));
    assert_eq!(tx.dropped(), 0);
}

#[tokio::test]
async fn test_queue_drop_newest() {
    let (tx, mut rx) = dispatch::channel(2, OverflowPolicy::DropNewest);
    for frame in ["1", "2", "3"] {
        tx.push(frame.to_string()).await;
    }
    assert_eq!(tx.dropped(), 1);
    assert_eq!(rx.pop().await.as_deref(), Some("1"));
    assert_eq!(rx.pop().await.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_queue_drop_oldest() {
    let (tx, mut rx) = dispatch::channel(2, OverflowPolicy::DropOldest);
    let counter = tx.drop_counter();
    for frame in ["1", "2", "3"] {
        tx.push(frame.to_string()).await;
    }
    assert_eq!(counter.get(), 1);
    assert_eq!(rx.pop().await.as_deref(), Some("2"));
    assert_eq!(rx.pop().await.as_deref(), Some("3"));
}

#[tokio::test]
async fn test_queue_block_waits_for_space() {
    let (tx, mut rx) = dispatch::channel(1, OverflowPolicy::Block);
    let counter = tx.drop_counter();

    let producer = tokio::spawn(async move {
        tx.push("first".to_string()).await;
        tx.push("second".to_string()).await;
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!producer.is_finished());

    assert_eq!(rx.pop().await.as_deref(), Some("first"));
    tokio::time::timeout(Duration::from_secs(1), producer)
        .await
        .expect("producer unblocked")
        .unwrap();
    assert_eq!(rx.pop().await.as_deref(), Some("second"));
    assert_eq!(counter.get(), 0);
}

#[tokio::test]
async fn test_pop_waits_for_push() {
    for policy in [OverflowPolicy::DropNewest, OverflowPolicy::DropOldest] {
        let (tx, mut rx) = dispatch::channel(8, policy);
        let consumer = tokio::spawn(async move { rx.pop().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.push("late".to_string()).await;
        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer woke")
            .unwrap();
        assert_eq!(got.as_deref(), Some("late"), "{policy:?}");
    }
}

#[tokio::test]
async fn test_queue_ends_after_sender_drops() {
    for policy in [
        OverflowPolicy::DropNewest,
        OverflowPolicy::DropOldest,
        OverflowPolicy::Block,
    ] {
        let (tx, mut rx) = dispatch::channel(4, policy);
        tx.push("last".to_string()).await;
        drop(tx);
        assert_eq!(rx.pop().await.as_deref(), Some("last"), "{policy:?}");
        assert_eq!(rx.pop().await, None, "{policy:?}");
    }
}

#[test]
fn test_invoke_passes_args() {
    let mut args = HandlerArgs::new();
    args.insert("unit".to_string(), json!("C"));
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler = move |payload: &str, args: &HandlerArgs| -> Result<(), HandlerError> {
        let unit = args["unit"].as_str().unwrap_or_default();
        sink.lock().unwrap().push(format!("{payload}{unit}"));
        Ok(())
    };

    handler::invoke(&handler, "22", &args).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["22C".to_string()]);
}

#[test]
fn test_invoke_reports_errors_and_panics() {
    let args = HandlerArgs::new();
    let failing = |_: &str, _: &HandlerArgs| -> Result<(), HandlerError> { Err("boom".into()) };
    match handler::invoke(&failing, "x", &args) {
        Err(HandlerFault::Failed(e)) => assert_eq!(e.to_string(), "boom"),
        other => panic!("expected Failed, got {other:?}"),
    }

    let panicking = |_: &str, _: &HandlerArgs| -> Result<(), HandlerError> {
        panic!("handler exploded");
    };
    match handler::invoke(&panicking, "x", &args) {
        Err(HandlerFault::Panicked(msg)) => assert_eq!(msg, "handler exploded"),
        other => panic!("expected Panicked, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wait_connected_outcomes() {
    let (tx, rx) = watch::channel(ConnectionState::Connecting);
    let res = state::wait_connected(&rx, Duration::from_millis(20)).await;
    assert!(matches!(res, Err(RelayError::Timeout(_))));

    tx.send_replace(ConnectionState::Connected);
    state::wait_connected(&rx, Duration::from_millis(20))
        .await
        .expect("connected");

    tx.send_replace(ConnectionState::Stopped);
    let res = state::wait_connected(&rx, Duration::from_millis(20)).await;
    assert!(matches!(res, Err(RelayError::Stopped)));
}

#[tokio::test]
async fn test_constructors_reject_separator_in_topic() {
    assert!(matches!(
        Publisher::new("127.0.0.1", 1, "bad!topic"),
        Err(RelayError::InvalidTopic { .. })
    ));
    let sub = Subscriber::new("127.0.0.1", 1, "bad!topic", |_, _| Ok(()), HandlerArgs::new());
    assert!(matches!(sub, Err(RelayError::InvalidTopic { .. })));
}

#[tokio::test]
async fn test_subscriber_records_msg_start() {
    let sub = Subscriber::new("127.0.0.1", 1, "weather", |_, _| Ok(()), HandlerArgs::new())
        .expect("valid topic");
    assert_eq!(sub.msg_start(), "weather".len() + 1);
    assert_eq!(sub.filter().prefix(), "weather");
}

#[tokio::test]
async fn test_publisher_without_broker_keeps_trying() {
    // Port 1 is never a broker; the publisher must not error, only retry.
    let publisher = Publisher::new("127.0.0.1", 1, "weather").expect("valid topic");
    publisher.send("lost");
    let res = publisher.wait_connected(Duration::from_millis(150)).await;
    assert!(matches!(res, Err(RelayError::Timeout(_))));
    assert_ne!(publisher.state(), ConnectionState::Stopped);

    publisher.stop();
    tokio::time::timeout(Duration::from_secs(2), async {
        while publisher.state() != ConnectionState::Stopped {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("publisher stopped");
}

#[tokio::test]
async fn test_frames_sent_while_connecting_are_dropped() {
    // The kernel completes the TCP handshake; nobody answers the upgrade yet.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = Endpoint::from(listener.local_addr().unwrap());
    let publisher = Publisher::with_settings(endpoint, "weather", &ClientSettings::default())
        .expect("valid topic");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(publisher.state(), ConnectionState::Connecting);
    for i in 0..3 {
        publisher.send(&format!("stale-{i}"));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    publisher
        .wait_connected(Duration::from_secs(2))
        .await
        .expect("connected");
    publisher.send("fresh");

    let first = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("a frame arrives")
        .expect("stream open")
        .unwrap();
    assert_eq!(first.to_text().unwrap(), "weather!fresh");
    publisher.stop();
}

#[tokio::test]
async fn test_stalled_handshake_is_retried() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = Endpoint::from(listener.local_addr().unwrap());
    let settings = ClientSettings {
        connect_timeout_ms: 100,
        reconnect_initial_ms: 20,
        reconnect_max_ms: 50,
        ..ClientSettings::default()
    };
    let publisher = Publisher::with_settings(endpoint, "weather", &settings).expect("valid topic");

    // Every attempt opens a new TCP connection, so a second accept means the
    // first attempt was abandoned and retried.
    let _attempts = tokio::time::timeout(Duration::from_secs(2), async {
        let first = listener.accept().await.unwrap().0;
        let second = listener.accept().await.unwrap().0;
        (first, second)
    })
    .await
    .expect("publisher retried a stalled handshake");
    assert_ne!(publisher.state(), ConnectionState::Connected);
    publisher.stop();
}
