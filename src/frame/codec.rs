use super::topic::Topic;

/// Reserved byte that glues a topic to its payload on the wire.
pub const SEPARATOR: char = '!';

/// Builds the wire frame for `payload` under `topic`.
///
/// The payload is free to contain the separator; only the topic is
/// restricted.
pub fn encode(topic: &Topic, payload: &str) -> String {
    let mut frame = String::with_capacity(topic.len() + 1 + payload.len());
    frame.push_str(topic.as_str());
    frame.push(SEPARATOR);
    frame.push_str(payload);
    frame
}

/// Strips `topic_len + 1` bytes from the front of `frame`.
///
/// This is a length-based split and does not look for the separator, so it
/// is only meaningful for a receiver that already knows the topic it
/// subscribed with. Returns `None` when the frame is too short or the cut
/// falls inside a multi-byte character.
pub fn decode(frame: &str, topic_len: usize) -> Option<&str> {
    frame.get(topic_len + 1..)
}
