//! Subscriber connection record
//!
//! `Client` holds the sending side of the per-connection channel the egress
//! session drains into its socket.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::Sender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

pub type ClientId = String;

#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub sender: Sender<WsMessage>,
    pub peer: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

impl Client {
    /// Create a new client with a sender channel. The `id` is a UUID used
    /// to identify the client across broker operations.
    pub fn new(sender: Sender<WsMessage>, peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            peer,
            connected_at: Utc::now(),
        }
    }
}
