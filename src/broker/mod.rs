//! Broker
//!
//! The broker binds an ingress endpoint for publishers and an egress endpoint
//! for subscribers and copies every frame from the first to the second. It
//! never parses frames; topic filtering happens on the subscriber side.
//!
//! - `engine`: registry of connected subscribers and the fan-out itself.
//! - `client`: one connected subscriber.
//! - `server`: binding, accept loops and the `BrokerHandle` lifecycle.

pub mod client;
pub mod engine;
pub mod server;

pub use engine::Broker;
pub use server::{BrokerHandle, start};
