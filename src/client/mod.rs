//! The `client` module holds the two peer roles of the relay.
//!
//! - `Publisher` dials the broker's ingress endpoint and sends frames under a
//!   fixed topic, fire-and-forget.
//! - `Subscriber` dials the egress endpoint, filters frames by topic prefix
//!   and hands payloads to a user handler on its own dispatch task.
//!
//! Both reconnect on their own with exponential backoff, so a broker that
//! goes away and comes back is picked up again without caller involvement.

pub mod dispatch;
pub mod handler;
pub mod publisher;
pub mod reconnect;
pub mod state;
pub mod subscriber;

pub use dispatch::{DispatchReceiver, DispatchSender, DropCounter, OverflowPolicy};
pub use handler::{HandlerArgs, HandlerError, HandlerFault, HandlerFaultPolicy, MessageHandler};
pub use publisher::Publisher;
pub use reconnect::ReconnectPolicy;
pub use state::ConnectionState;
pub use subscriber::{Subscriber, SubscriberHandle};

#[cfg(test)]
mod tests;
