//! WebSocket transport
//!
//! Broker side:
//! - `run_ingress` accepts publisher connections and hands every data frame
//!   to `Broker::relay` untouched.
//! - `run_egress` accepts subscriber connections, registers a `Client` for
//!   each and pumps that client's channel into the socket.
//!
//! Client side: `connect` dials a broker endpoint; `connect_within` does the
//! same under a deadline.
//!
//! Every loop here watches a `ShutdownSignal`; once it fires the sockets are
//! dropped, which closes the TCP connections so peers notice.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::client::Client;
use crate::broker::engine::Broker;
use crate::transport::Endpoint;
use crate::utils::shutdown::ShutdownSignal;
use crate::utils::{RelayError, Result};

pub type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frames carry data; everything else is WebSocket control traffic.
pub fn is_data(msg: &WsMessage) -> bool {
    msg.is_text() || msg.is_binary()
}

pub async fn bind(endpoint: &Endpoint) -> Result<TcpListener> {
    let addr = endpoint.bind_addr();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind {
            endpoint: addr,
            source,
        })
}

pub async fn connect(endpoint: &Endpoint) -> Result<ClientStream> {
    let (ws, _response) = connect_async(endpoint.url())
        .await
        .map_err(|e| RelayError::connect(endpoint.to_string(), e))?;
    Ok(ws)
}

/// `connect` bounded by `limit`, covering the TCP connect and the WebSocket
/// handshake. A peer that accepts TCP but never answers the upgrade yields
/// `RelayError::Timeout`.
pub async fn connect_within(endpoint: &Endpoint, limit: Duration) -> Result<ClientStream> {
    tokio::time::timeout(limit, connect(endpoint))
        .await
        .map_err(|_| RelayError::Timeout(limit))?
}

pub(crate) fn lock(broker: &Mutex<Broker>) -> MutexGuard<'_, Broker> {
    broker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub async fn run_ingress(
    listener: TcpListener,
    broker: Arc<Mutex<Broker>>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Ingress accept error: {e}");
                    continue;
                }
            },
            _ = shutdown.recv() => break,
        };

        let broker = broker.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(handle_ingress(stream, peer, broker, shutdown));
    }
    debug!("Ingress accept loop stopped");
}

async fn handle_ingress(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Mutex<Broker>>,
    mut shutdown: ShutdownSignal,
) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("Ingress handshake error from {peer}: {e}");
            return;
        }
    };
    info!("Publisher connected from {peer}");

    loop {
        tokio::select! {
            incoming = ws.next() => match incoming {
                Some(Ok(msg)) if is_data(&msg) => {
                    let delivered = lock(&broker).relay(msg);
                    if delivered == 0 {
                        debug!("Frame from {peer} dropped: no subscribers");
                    }
                }
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Ingress read error from {peer}: {e}");
                    break;
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }

    info!("Publisher {peer} disconnected");
}

pub async fn run_egress(
    listener: TcpListener,
    broker: Arc<Mutex<Broker>>,
    client_buffer: usize,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Egress accept error: {e}");
                    continue;
                }
            },
            _ = shutdown.recv() => break,
        };

        let broker = broker.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(handle_egress(stream, peer, broker, client_buffer, shutdown));
    }
    debug!("Egress accept loop stopped");
}

async fn handle_egress(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Mutex<Broker>>,
    client_buffer: usize,
    mut shutdown: ShutdownSignal,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("Egress handshake error from {peer}: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws.split();
    let (tx, mut rx) = mpsc::channel::<WsMessage>(client_buffer.max(1));
    let client = Client::new(tx, peer);
    let client_id = client.id.clone();
    lock(&broker).register_client(client);
    info!("Subscriber {client_id} connected from {peer}");

    // broker -> subscriber
    let mut send_shutdown = shutdown.clone();
    let send_id = client_id.clone();
    let mut send_loop = tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => {
                        if let Err(e) = ws_sender.send(msg).await {
                            debug!("Failed to send frame to {send_id}: {e}");
                            break;
                        }
                    }
                    None => break,
                },
                _ = send_shutdown.recv() => break,
            }
        }
        let _ = ws_sender.close().await;
    });

    // Subscribers never send data; reading keeps control frames flowing and
    // tells us when the peer goes away.
    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Egress read error from {client_id}: {e}");
                    break;
                }
                None => break,
            },
            _ = &mut send_loop => break,
            _ = shutdown.recv() => break,
        }
    }

    lock(&broker).cleanup_client(&client_id);
    send_loop.abort();
}
