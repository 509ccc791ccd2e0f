use std::fmt;

use super::codec::SEPARATOR;
use crate::utils::RelayError;

/// A validated topic name.
///
/// Topics are opaque strings; the only rule is that they never contain the
/// frame separator. The empty topic is allowed and, used as a filter,
/// matches every frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Result<Self, RelayError> {
        let name = name.into();
        if name.contains(SEPARATOR) {
            return Err(RelayError::InvalidTopic {
                topic: name,
                separator: SEPARATOR,
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes, which is what `decode` expects.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Topic {
    type Error = RelayError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Topic::new(value)
    }
}

/// How a subscriber's filter is derived from its topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Raw byte prefix of the topic. `"T"` also matches `"Temperature!..."`.
    #[default]
    Prefix,
    /// Topic plus separator, so only frames under exactly this topic match.
    Exact,
}

/// The prefix installed on a subscriber socket.
///
/// Immutable for the lifetime of the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    prefix: String,
    mode: MatchMode,
}

impl TopicFilter {
    pub fn new(topic: &Topic, mode: MatchMode) -> Self {
        let prefix = match mode {
            MatchMode::Prefix => topic.as_str().to_string(),
            MatchMode::Exact => format!("{topic}{SEPARATOR}"),
        };
        Self { prefix, mode }
    }

    pub fn matches(&self, frame: &[u8]) -> bool {
        frame.starts_with(self.prefix.as_bytes())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }
}
