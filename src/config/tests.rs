use super::settings::Settings;
use super::{load_config, load_config_from};
use crate::client::{HandlerFaultPolicy, OverflowPolicy};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.host, "0.0.0.0");
    assert_eq!(settings.broker.ingress_port, 5559);
    assert_eq!(settings.broker.egress_port, 5560);
    assert_eq!(settings.client.broker_host, "127.0.0.1");
    assert_eq!(settings.client.overflow_policy, OverflowPolicy::DropNewest);
    assert_eq!(
        settings.client.handler_fault_policy,
        HandlerFaultPolicy::Isolate
    );
    assert!(!settings.client.exact_topic_match);
    assert_eq!(settings.client.reconnect_max_retries, None);
    assert_eq!(settings.client.connect_timeout_ms, 5000);
    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.logging.filter, None);
}

#[test]
#[serial]
fn test_partial_file_keeps_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("relay.toml");
    let toml = r#"
        [broker]
        ingress_port = 7001

        [client]
        overflow_policy = "drop_oldest"
        handler_fault_policy = "terminate"
        exact_topic_match = true
        reconnect_max_retries = 3
        connect_timeout_ms = 250

        [logging]
        filter = "tungstenite=warn"
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = load_config_from(&path).expect("load_config_from failed");
    assert_eq!(cfg.broker.ingress_port, 7001);
    assert_eq!(cfg.broker.egress_port, 5560);
    assert_eq!(cfg.client.overflow_policy, OverflowPolicy::DropOldest);
    assert_eq!(
        cfg.client.handler_fault_policy,
        HandlerFaultPolicy::Terminate
    );
    assert!(cfg.client.exact_topic_match);
    assert_eq!(cfg.client.reconnect_max_retries, Some(3));
    assert_eq!(cfg.client.connect_timeout_ms, 250);
    assert_eq!(cfg.client.dispatch_capacity, 1024);
    assert_eq!(cfg.logging.level, "info");
    assert_eq!(cfg.logging.filter.as_deref(), Some("tungstenite=warn"));
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let tmp = TempDir::new().expect("create tempdir");
    assert!(load_config_from(tmp.path().join("nope.toml")).is_err());
}

#[test]
#[serial]
fn test_load_config_from_cwd_and_env() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = std::env::current_dir().expect("current_dir");
    std::env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [broker]
        host = "127.0.0.1"
        egress_port = 9100

        [logging]
        level = "debug"
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = temp_env::with_var("POPRELAY__BROKER__EGRESS_PORT", Some("9200"), || {
        load_config().expect("load_config failed")
    });

    std::env::set_current_dir(orig).expect("restore cwd");

    assert_eq!(cfg.broker.host, "127.0.0.1");
    assert_eq!(cfg.broker.egress_port, 9200);
    assert_eq!(cfg.broker.ingress_port, 5559);
    assert_eq!(cfg.logging.level, "debug");
}
