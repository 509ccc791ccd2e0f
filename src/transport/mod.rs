//! The `transport` module is responsible for network communication between
//! the broker and its peers, via WebSockets over TCP.
//!
//! One WebSocket text message carries one frame. The broker side accepts
//! connections on its ingress and egress endpoints; the client side dials
//! out to one of them.

pub mod endpoint;
pub mod websocket;

pub use endpoint::Endpoint;
