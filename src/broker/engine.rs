//! Broker engine
//!
//! In-memory registry of connected subscribers and the relay that copies one
//! inbound frame to each of them.
//!
//! The API is synchronous and meant to sit behind `Arc<Mutex<Broker>>`.
//! Nothing here awaits, so the lock is never held across network I/O; each
//! client has its own bounded channel and a full channel drops that copy
//! instead of stalling the publisher.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::client::{Client, ClientId};

#[derive(Debug, Default)]
pub struct Broker {
    pub clients: HashMap<ClientId, Client>,
}

impl Broker {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    pub fn register_client(&mut self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    pub fn remove_client(&mut self, client_id: &ClientId) -> Option<Client> {
        self.clients.remove(client_id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Copies `msg` to every connected subscriber, unmodified.
    ///
    /// Returns how many clients accepted the copy. Zero subscribers means the
    /// frame is simply gone.
    pub fn relay(&self, msg: WsMessage) -> usize {
        let mut delivered = 0;
        for (id, client) in &self.clients {
            match client.sender.try_send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Subscriber {id} is lagging, frame dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscriber {id} is closing, frame dropped");
                }
            }
        }
        delivered
    }

    /// Removes a client after its connection ended.
    pub fn cleanup_client(&mut self, client_id: &ClientId) {
        if let Some(client) = self.remove_client(client_id) {
            let lasted = Utc::now() - client.connected_at;
            info!(
                "Subscriber {client_id} ({}) disconnected after {}s",
                client.peer,
                lasted.num_seconds()
            );
        }
    }

    /// Drops every client, closing their channels.
    pub fn clear(&mut self) {
        self.clients.clear();
    }
}
