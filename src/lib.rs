//! # PopRelay
//!
//! `poprelay` is a topic-filtered publish/subscribe relay built on WebSockets.
//! Publishers and subscribers only need to know one address, the broker's,
//! and may come and go at any time, broker included. Delivery is best effort:
//! whatever is sent while a peer is missing is lost, and traffic resumes by
//! itself once the peer is back.
//!
//! ## Core Modules
//!
//! - `frame`: the `<topic>!<payload>` wire convention and topic filters.
//! - `broker`: binds the ingress and egress endpoints and relays frames between them.
//! - `client`: the `Publisher` and `Subscriber` peers, with reconnects and dispatch.
//! - `transport`: WebSocket listeners and dialers.
//! - `config`: layered configuration from file and environment.
//! - `utils`: errors, logging and the shutdown signal.

pub mod broker;
pub mod client;
pub mod config;
pub mod frame;
pub mod transport;
pub mod utils;

pub use broker::{BrokerHandle, start};
pub use client::{HandlerArgs, HandlerError, Publisher, Subscriber, SubscriberHandle};
pub use frame::{SEPARATOR, Topic, decode, encode};
pub use transport::Endpoint;
pub use utils::{RelayError, Result};
