//! Topic framing shared by publishers, subscribers and the broker.
//!
//! A frame is a single string `<topic>!<payload>`. The separator is reserved
//! and rejected inside topic names, so a receiver that knows its topic can
//! strip the prefix by length alone.

pub mod codec;
pub mod topic;

pub use codec::{SEPARATOR, decode, encode};
pub use topic::{MatchMode, Topic, TopicFilter};

#[cfg(test)]
mod tests;
