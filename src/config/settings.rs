use serde::Deserialize;

use crate::client::{HandlerFaultPolicy, OverflowPolicy};

/// Top-level configuration settings for the application.
///
/// Includes settings for the broker, the publisher/subscriber clients and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub client: ClientSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the broker.
///
/// `host` is the interface both endpoints bind on; the default binds all of them.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub ingress_port: u16,
    pub egress_port: u16,
    /// Frames buffered per subscriber connection before copies are dropped.
    pub client_buffer: usize,
}

/// Configuration shared by publishers and subscribers.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub broker_host: String,
    pub send_buffer: usize,
    pub dispatch_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub handler_fault_policy: HandlerFaultPolicy,
    pub exact_topic_match: bool,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_max_retries: Option<u32>,
    /// A connect attempt (TCP plus WebSocket handshake) that takes longer
    /// than this counts as failed.
    pub connect_timeout_ms: u64,
}

/// `level` is the default for every target; `filter` appends extra
/// `EnvFilter` directives such as `"tungstenite=warn"`. `RUST_LOG` overrides both.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub filter: Option<String>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub client: Option<PartialClientSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub host: Option<String>,
    pub ingress_port: Option<u16>,
    pub egress_port: Option<u16>,
    pub client_buffer: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialClientSettings {
    pub broker_host: Option<String>,
    pub send_buffer: Option<usize>,
    pub dispatch_capacity: Option<usize>,
    pub overflow_policy: Option<OverflowPolicy>,
    pub handler_fault_policy: Option<HandlerFaultPolicy>,
    pub exact_topic_match: Option<bool>,
    pub reconnect_initial_ms: Option<u64>,
    pub reconnect_max_ms: Option<u64>,
    pub reconnect_max_retries: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
    pub filter: Option<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            ingress_port: 5559,
            egress_port: 5560,
            client_buffer: 1024,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            broker_host: "127.0.0.1".to_string(),
            send_buffer: 1024,
            dispatch_capacity: 1024,
            overflow_policy: OverflowPolicy::default(),
            handler_fault_policy: HandlerFaultPolicy::default(),
            exact_topic_match: false,
            reconnect_initial_ms: 100,
            reconnect_max_ms: 5000,
            reconnect_max_retries: None,
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            filter: None,
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings::default(),
            client: ClientSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();

        let broker = match self.broker {
            Some(b) => BrokerSettings {
                host: b.host.unwrap_or(default.broker.host),
                ingress_port: b.ingress_port.unwrap_or(default.broker.ingress_port),
                egress_port: b.egress_port.unwrap_or(default.broker.egress_port),
                client_buffer: b.client_buffer.unwrap_or(default.broker.client_buffer),
            },
            None => default.broker,
        };

        let client = match self.client {
            Some(c) => ClientSettings {
                broker_host: c.broker_host.unwrap_or(default.client.broker_host),
                send_buffer: c.send_buffer.unwrap_or(default.client.send_buffer),
                dispatch_capacity: c
                    .dispatch_capacity
                    .unwrap_or(default.client.dispatch_capacity),
                overflow_policy: c.overflow_policy.unwrap_or(default.client.overflow_policy),
                handler_fault_policy: c
                    .handler_fault_policy
                    .unwrap_or(default.client.handler_fault_policy),
                exact_topic_match: c
                    .exact_topic_match
                    .unwrap_or(default.client.exact_topic_match),
                reconnect_initial_ms: c
                    .reconnect_initial_ms
                    .unwrap_or(default.client.reconnect_initial_ms),
                reconnect_max_ms: c
                    .reconnect_max_ms
                    .unwrap_or(default.client.reconnect_max_ms),
                reconnect_max_retries: c
                    .reconnect_max_retries
                    .or(default.client.reconnect_max_retries),
                connect_timeout_ms: c
                    .connect_timeout_ms
                    .unwrap_or(default.client.connect_timeout_ms),
            },
            None => default.client,
        };

        let logging = match self.logging {
            Some(l) => LoggingSettings {
                level: l.level.unwrap_or(default.logging.level),
                filter: l.filter.or(default.logging.filter),
            },
            None => default.logging,
        };

        Settings {
            broker,
            client,
            logging,
        }
    }
}
