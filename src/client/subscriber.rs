//! Subscriber
//!
//! `Subscriber` is the configured-but-idle form; `run` turns it into two
//! background tasks and returns a `SubscriberHandle`:
//!
//! - the receive task keeps a connection to the broker egress endpoint,
//!   drops every frame the `TopicFilter` rejects and queues the rest;
//! - the dispatch task pops frames, strips the topic by length and calls the
//!   handler one frame at a time on tokio's blocking pool, so a slow handler
//!   never holds up receipt or anything else on the runtime.
//!
//! Handler faults are caught and handled per `HandlerFaultPolicy`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::dispatch::{self, DispatchReceiver, DispatchSender, DropCounter};
use crate::client::handler::{
    self, HandlerArgs, HandlerError, HandlerFaultPolicy, MessageHandler,
};
use crate::client::reconnect::{Backoff, ReconnectPolicy};
use crate::client::state::{self, ConnectionState};
use crate::config::ClientSettings;
use crate::frame::{MatchMode, Topic, TopicFilter, decode};
use crate::transport::Endpoint;
use crate::transport::websocket::{self, is_data};
use crate::utils::Result;
use crate::utils::shutdown::{self, ShutdownSignal, ShutdownTrigger};

pub struct Subscriber {
    endpoint: Endpoint,
    topic: Topic,
    filter: TopicFilter,
    /// Byte offset of the payload in frames under `topic`.
    msg_start: usize,
    handler: Arc<dyn MessageHandler>,
    args: Arc<HandlerArgs>,
    settings: ClientSettings,
}

impl Subscriber {
    /// Prepares a subscription to `topic` on the broker egress at
    /// `address:port`, with default client settings. Nothing is received
    /// until `run` is called.
    pub fn new<F>(
        address: &str,
        port: u16,
        topic: &str,
        handler: F,
        args: HandlerArgs,
    ) -> Result<Self>
    where
        F: Fn(&str, &HandlerArgs) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self::with_settings(
            Endpoint::new(address, port),
            topic,
            Arc::new(handler),
            args,
            &ClientSettings::default(),
        )
    }

    pub fn with_settings(
        endpoint: Endpoint,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
        args: HandlerArgs,
        settings: &ClientSettings,
    ) -> Result<Self> {
        let topic = Topic::new(topic)?;
        let mode = if settings.exact_topic_match {
            MatchMode::Exact
        } else {
            MatchMode::Prefix
        };
        Ok(Self {
            endpoint,
            filter: TopicFilter::new(&topic, mode),
            msg_start: topic.len() + 1,
            topic,
            handler,
            args: Arc::new(args),
            settings: settings.clone(),
        })
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    pub fn msg_start(&self) -> usize {
        self.msg_start
    }

    /// Starts receiving. Must be called from within a tokio runtime.
    pub fn run(self) -> SubscriberHandle {
        let (queue_tx, queue_rx) = dispatch::channel(
            self.settings.dispatch_capacity,
            self.settings.overflow_policy,
        );
        let dropped = queue_tx.drop_counter();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Created);
        let (trigger, signal) = shutdown::channel();

        let receiver = tokio::spawn(receive_loop(
            self.endpoint,
            self.filter,
            queue_tx,
            ReconnectPolicy::from_settings(&self.settings),
            state_tx,
            signal.clone(),
        ));

        let dispatcher = tokio::spawn(dispatch_loop(
            self.topic.clone(),
            queue_rx,
            self.handler,
            self.args,
            self.settings.handler_fault_policy,
            trigger.clone(),
            signal,
        ));

        SubscriberHandle {
            topic: self.topic,
            state: state_rx,
            dropped,
            shutdown: trigger,
            receiver,
            dispatcher,
        }
    }
}

/// Control surface of a running subscriber.
///
/// Dropping the handle leaves the subscriber running; call `stop` to end it.
#[derive(Debug)]
pub struct SubscriberHandle {
    topic: Topic,
    state: watch::Receiver<ConnectionState>,
    dropped: DropCounter,
    shutdown: ShutdownTrigger,
    receiver: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl SubscriberHandle {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub async fn wait_connected(&self, timeout: Duration) -> Result<()> {
        state::wait_connected(&self.state, timeout).await
    }

    /// Frames discarded because the dispatch queue was full.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.get()
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Stops both tasks and waits for them. Frames still queued are discarded.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.receiver.await;
        let _ = self.dispatcher.await;
    }

    /// Waits until the subscriber stops, either through `stop` elsewhere or a
    /// terminating handler fault.
    pub async fn wait(self) {
        let _ = self.receiver.await;
        let _ = self.dispatcher.await;
    }
}

async fn receive_loop(
    endpoint: Endpoint,
    filter: TopicFilter,
    queue: DispatchSender,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    mut shutdown: ShutdownSignal,
) {
    let mut backoff = Backoff::new(policy);

    'reconnect: loop {
        state.send_replace(ConnectionState::Connecting);

        let connected = tokio::select! {
            res = websocket::connect_within(&endpoint, backoff.connect_timeout()) => res,
            _ = shutdown.recv() => break 'reconnect,
        };

        match connected {
            Ok(mut ws) => {
                backoff.reset();
                state.send_replace(ConnectionState::Connected);
                info!("Subscriber '{}' connected to {endpoint}", filter.prefix());

                loop {
                    let msg = tokio::select! {
                        incoming = ws.next() => incoming,
                        _ = shutdown.recv() => {
                            let _ = ws.close(None).await;
                            break 'reconnect;
                        }
                    };
                    match msg {
                        Some(Ok(msg)) if is_data(&msg) => {
                            let Ok(text) = msg.to_text() else {
                                debug!("Subscriber skipped a non UTF-8 frame");
                                continue;
                            };
                            if !filter.matches(text.as_bytes()) {
                                continue;
                            }
                            tokio::select! {
                                _ = queue.push(text.to_owned()) => {}
                                _ = shutdown.recv() => break 'reconnect,
                            }
                        }
                        Some(Ok(msg)) if msg.is_close() => {
                            info!("Broker {endpoint} closed the subscriber connection");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Subscriber lost {endpoint}: {e}");
                            break;
                        }
                        None => {
                            info!("Broker {endpoint} went away");
                            break;
                        }
                    }
                }
            }
            Err(e) => debug!("Subscriber connect failed: {e}"),
        }

        let Some(delay) = backoff.next_delay() else {
            error!("Subscriber giving up on {endpoint}");
            break 'reconnect;
        };
        state.send_replace(ConnectionState::Connecting);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.recv() => break 'reconnect,
        }
    }

    state.send_replace(ConnectionState::Stopped);
    debug!("Subscriber receive task for {endpoint} stopped");
}

async fn dispatch_loop(
    topic: Topic,
    mut queue: DispatchReceiver,
    handler: Arc<dyn MessageHandler>,
    args: Arc<HandlerArgs>,
    policy: HandlerFaultPolicy,
    trigger: ShutdownTrigger,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let frame = tokio::select! {
            frame = queue.pop() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = shutdown.recv() => break,
        };

        let Some(payload) = decode(&frame, topic.len()).map(str::to_owned) else {
            warn!("Subscriber '{topic}' got a frame too short for its topic, skipped");
            continue;
        };

        let call = {
            let handler = handler.clone();
            let args = args.clone();
            tokio::task::spawn_blocking(move || handler::invoke(handler.as_ref(), &payload, &args))
        };
        // A handler still running at shutdown finishes on its own; its
        // outcome is discarded.
        let outcome = tokio::select! {
            outcome = call => outcome,
            _ = shutdown.recv() => break,
        };

        let fault = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(fault)) => fault,
            Err(e) => {
                error!("Subscriber '{topic}' lost its handler task: {e}");
                break;
            }
        };
        match policy {
            HandlerFaultPolicy::Isolate => {
                warn!("Subscriber '{topic}': {fault}");
            }
            HandlerFaultPolicy::Terminate => {
                error!("Subscriber '{topic}' stopping: {fault}");
                trigger.trigger();
                break;
            }
        }
    }
    debug!("Subscriber dispatch task for '{topic}' stopped");
}
