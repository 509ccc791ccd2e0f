use super::error::RelayError;
use super::shutdown;
use std::time::Duration;

#[test]
fn invalid_topic_error_names_the_separator() {
    let err = RelayError::InvalidTopic {
        topic: "a!b".to_string(),
        separator: '!',
    };
    assert_eq!(err.to_string(), "invalid topic 'a!b': must not contain '!'");
}

#[test]
fn bind_error_keeps_io_source() {
    let err = RelayError::Bind {
        endpoint: "0.0.0.0:5559".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
    };
    assert!(err.to_string().starts_with("failed to bind 0.0.0.0:5559"));
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn shutdown_signal_reaches_every_subscriber() {
    let (trigger, mut first) = shutdown::channel();
    let mut second = trigger.signal();
    assert!(!first.is_triggered());

    trigger.trigger();

    tokio::time::timeout(Duration::from_secs(1), first.recv())
        .await
        .expect("first signal");
    tokio::time::timeout(Duration::from_secs(1), second.recv())
        .await
        .expect("second signal");
    assert!(trigger.is_triggered());
}

#[tokio::test]
async fn signal_created_after_trigger_resolves_immediately() {
    let (trigger, _signal) = shutdown::channel();
    trigger.trigger();
    let mut late = trigger.signal();
    tokio::time::timeout(Duration::from_millis(100), late.recv())
        .await
        .expect("late signal");
}

#[tokio::test]
async fn dropping_trigger_does_not_fire() {
    let (trigger, mut signal) = shutdown::channel();
    drop(trigger);
    let res = tokio::time::timeout(Duration::from_millis(50), signal.recv()).await;
    assert!(res.is_err());
}
