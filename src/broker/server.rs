//! Broker lifecycle
//!
//! `start` binds both endpoints up front so bind failures reach the caller,
//! then runs the ingress and egress accept loops as background tasks. The
//! returned `BrokerHandle` can be ignored (the broker then lives as long as
//! the runtime) or used to stop it.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::info;

use crate::broker::engine::Broker;
use crate::config::BrokerSettings;
use crate::transport::Endpoint;
use crate::transport::websocket::{self, lock};
use crate::utils::Result;
use crate::utils::shutdown::{self, ShutdownTrigger};

#[derive(Debug)]
pub struct BrokerHandle {
    ingress_addr: SocketAddr,
    egress_addr: SocketAddr,
    broker: Arc<Mutex<Broker>>,
    shutdown: ShutdownTrigger,
    tasks: Vec<JoinHandle<()>>,
}

/// Binds `ingress` and `egress` and starts relaying between them.
pub async fn start(
    ingress: &Endpoint,
    egress: &Endpoint,
    settings: &BrokerSettings,
) -> Result<BrokerHandle> {
    let ingress_listener = websocket::bind(ingress).await?;
    let egress_listener = websocket::bind(egress).await?;
    let ingress_addr = ingress_listener.local_addr()?;
    let egress_addr = egress_listener.local_addr()?;

    let broker = Arc::new(Mutex::new(Broker::new()));
    let (trigger, signal) = shutdown::channel();

    let tasks = vec![
        tokio::spawn(websocket::run_ingress(
            ingress_listener,
            broker.clone(),
            signal.clone(),
        )),
        tokio::spawn(websocket::run_egress(
            egress_listener,
            broker.clone(),
            settings.client_buffer,
            signal,
        )),
    ];

    info!("Broker relaying ws://{ingress_addr} -> ws://{egress_addr}");

    Ok(BrokerHandle {
        ingress_addr,
        egress_addr,
        broker,
        shutdown: trigger,
        tasks,
    })
}

/// Starts a broker on the endpoints named in `settings`.
pub async fn start_with_settings(settings: &BrokerSettings) -> Result<BrokerHandle> {
    let ingress = Endpoint::new(settings.host.clone(), settings.ingress_port);
    let egress = Endpoint::new(settings.host.clone(), settings.egress_port);
    start(&ingress, &egress, settings).await
}

impl BrokerHandle {
    pub fn ingress_addr(&self) -> SocketAddr {
        self.ingress_addr
    }

    pub fn egress_addr(&self) -> SocketAddr {
        self.egress_addr
    }

    /// Number of subscribers currently attached to the egress endpoint.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.broker).client_count()
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Stops both accept loops and every open session. The endpoints are
    /// released once this returns.
    pub async fn stop(mut self) {
        self.shutdown.trigger();
        for task in self.tasks.drain(..) {
            if !task.is_finished() {
                let _ = task.await;
            }
        }
        lock(&self.broker).clear();
        info!("Broker on {} / {} stopped", self.ingress_addr, self.egress_addr);
    }

    /// Waits for the accept loops to finish, i.e. until someone stops the broker.
    pub async fn wait(&mut self) {
        for task in self.tasks.iter_mut() {
            if !task.is_finished() {
                let _ = task.await;
            }
        }
    }
}
