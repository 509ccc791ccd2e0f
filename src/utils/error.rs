//! The `error` module defines the error type used across `poprelay`.
//!
//! Only failures a caller can act on are surfaced: invalid topics at
//! construction, bind failures at broker startup and readiness timeouts.
//! Transport faults after startup are logged and recovered by the
//! reconnect loops instead.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The topic contains the reserved frame separator.
    #[error("invalid topic '{topic}': must not contain '{separator}'")]
    InvalidTopic { topic: String, separator: char },

    /// The broker could not acquire one of its endpoints.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// An outbound connection attempt failed.
    #[error("failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A readiness wait elapsed before the connection came up.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The component was stopped while the caller was waiting on it.
    #[error("stopped")]
    Stopped,
}

impl RelayError {
    pub fn connect<E: std::fmt::Display>(endpoint: impl Into<String>, err: E) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
