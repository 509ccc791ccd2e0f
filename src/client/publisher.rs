//! Publisher
//!
//! A `Publisher` owns one background connection task. `send` only encodes
//! the frame and hands it to that task through a bounded channel, so it
//! never blocks and never reports delivery. Frames handed over while the
//! task has no open connection, including during a connect attempt, are
//! dropped, not queued.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::client::reconnect::{Backoff, ReconnectPolicy};
use crate::client::state::{self, ConnectionState};
use crate::config::ClientSettings;
use crate::frame::{Topic, encode};
use crate::transport::Endpoint;
use crate::transport::websocket;
use crate::utils::Result;
use crate::utils::shutdown::{self, ShutdownSignal, ShutdownTrigger};

#[derive(Debug)]
pub struct Publisher {
    topic: Topic,
    endpoint: Endpoint,
    frames: mpsc::Sender<WsMessage>,
    state: watch::Receiver<ConnectionState>,
    shutdown: ShutdownTrigger,
}

impl Publisher {
    /// Connects to the broker ingress at `address:port` with default client
    /// settings. Must be called from within a tokio runtime.
    pub fn new(address: &str, port: u16, topic: &str) -> Result<Self> {
        Self::with_settings(
            Endpoint::new(address, port),
            topic,
            &ClientSettings::default(),
        )
    }

    pub fn with_settings(endpoint: Endpoint, topic: &str, settings: &ClientSettings) -> Result<Self> {
        let topic = Topic::new(topic)?;
        let (frames_tx, frames_rx) = mpsc::channel(settings.send_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Created);
        let (trigger, signal) = shutdown::channel();

        tokio::spawn(connection_loop(
            endpoint.clone(),
            frames_rx,
            ReconnectPolicy::from_settings(settings),
            state_tx,
            signal,
        ));

        Ok(Self {
            topic,
            endpoint,
            frames: frames_tx,
            state: state_rx,
            shutdown: trigger,
        })
    }

    /// Sends `message` under this publisher's topic. Fire-and-forget: there
    /// is no error for a missing broker or missing subscribers.
    pub fn send(&self, message: &str) {
        let frame = encode(&self.topic, message);
        match self.frames.try_send(WsMessage::text(frame)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("Publisher '{}' send buffer full, frame dropped", self.topic);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Publisher '{}' is stopped, frame dropped", self.topic);
            }
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Waits until the connection to the broker is up. Frames sent before
    /// that point may be lost.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<()> {
        state::wait_connected(&self.state, timeout).await
    }

    /// Closes the connection and ends the background task.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

async fn connection_loop(
    endpoint: Endpoint,
    mut frames: mpsc::Receiver<WsMessage>,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    mut shutdown: ShutdownSignal,
) {
    let mut backoff = Backoff::new(policy);

    'reconnect: loop {
        state.send_replace(ConnectionState::Connecting);

        let attempt = websocket::connect_within(&endpoint, backoff.connect_timeout());
        tokio::pin!(attempt);
        let connected = loop {
            tokio::select! {
                res = &mut attempt => break res,
                frame = frames.recv() => match frame {
                    Some(_) => debug!("Publisher still connecting to {endpoint}, frame dropped"),
                    None => break 'reconnect,
                },
                _ = shutdown.recv() => break 'reconnect,
            }
        };

        match connected {
            Ok(ws) => {
                backoff.reset();
                state.send_replace(ConnectionState::Connected);
                info!("Publisher connected to {endpoint}");

                let (mut ws_sender, mut ws_receiver) = ws.split();
                loop {
                    tokio::select! {
                        frame = frames.recv() => match frame {
                            Some(frame) => {
                                if let Err(e) = ws_sender.send(frame).await {
                                    warn!("Publisher lost {endpoint}: {e}");
                                    break;
                                }
                            }
                            None => {
                                let _ = ws_sender.close().await;
                                break 'reconnect;
                            }
                        },
                        // The broker never sends data here; this only
                        // notices the connection going away.
                        incoming = ws_receiver.next() => match incoming {
                            Some(Ok(msg)) if msg.is_close() => {
                                info!("Broker {endpoint} closed the publisher connection");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("Publisher lost {endpoint}: {e}");
                                break;
                            }
                            None => {
                                info!("Broker {endpoint} went away");
                                break;
                            }
                        },
                        _ = shutdown.recv() => {
                            let _ = ws_sender.close().await;
                            break 'reconnect;
                        }
                    }
                }
            }
            Err(e) => debug!("Publisher connect failed: {e}"),
        }

        let Some(delay) = backoff.next_delay() else {
            error!("Publisher giving up on {endpoint}");
            break 'reconnect;
        };
        state.send_replace(ConnectionState::Connecting);

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                frame = frames.recv() => match frame {
                    Some(_) => debug!("Publisher disconnected from {endpoint}, frame dropped"),
                    None => break 'reconnect,
                },
                _ = shutdown.recv() => break 'reconnect,
            }
        }
    }

    state.send_replace(ConnectionState::Stopped);
    debug!("Publisher task for {endpoint} stopped");
}
