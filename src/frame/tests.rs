use super::*;
use crate::utils::RelayError;

fn topic(name: &str) -> Topic {
    Topic::new(name).unwrap()
}

#[test]
fn test_encode_joins_topic_and_payload() {
    assert_eq!(encode(&topic("weather"), "22C"), "weather!22C");
    assert_eq!(encode(&topic(""), "all"), "!all");
}

#[test]
fn test_round_trip_recovers_payload() {
    let cases = [
        ("weather", "22C"),
        ("", "empty topic"),
        ("t", ""),
        ("sensors/ü", "payload with ! inside!"),
        ("a b c", "∑ unicode ✓"),
    ];
    for (name, payload) in cases {
        let t = topic(name);
        let frame = encode(&t, payload);
        assert_eq!(decode(&frame, t.len()), Some(payload), "topic {name:?}");
    }
}

#[test]
fn test_decode_is_length_based() {
    // A frame under a longer topic is cut by the subscriber's topic length,
    // not at the separator.
    assert_eq!(decode("Temperature!5", 1), Some("mperature!5"));
    assert_eq!(decode("weather!", 7), Some(""));
}

#[test]
fn test_decode_short_or_split_frames() {
    assert_eq!(decode("weather", 7), None);
    assert_eq!(decode("", 0), None);
    // 'é' is two bytes; cutting at 2 lands inside it.
    assert_eq!(decode("aé!x", 1), None);
}

#[test]
fn test_topic_rejects_separator() {
    match Topic::new("bad!topic") {
        Err(RelayError::InvalidTopic { topic, separator }) => {
            assert_eq!(topic, "bad!topic");
            assert_eq!(separator, SEPARATOR);
        }
        other => panic!("expected InvalidTopic, got {other:?}"),
    }
    assert!(Topic::try_from("fine").is_ok());
}

#[test]
fn test_prefix_filter_over_matches() {
    let filter = TopicFilter::new(&topic("T"), MatchMode::Prefix);
    assert!(filter.matches(b"T!hello"));
    assert!(filter.matches(b"Temperature!21"));
    assert!(!filter.matches(b"traffic!jam"));
}

#[test]
fn test_exact_filter_requires_separator() {
    let filter = TopicFilter::new(&topic("T"), MatchMode::Exact);
    assert_eq!(filter.prefix(), "T!");
    assert!(filter.matches(b"T!hello"));
    assert!(!filter.matches(b"Temperature!21"));
    assert!(!filter.matches(b"T"));
}

#[test]
fn test_empty_filter_matches_everything() {
    let filter = TopicFilter::new(&topic(""), MatchMode::Prefix);
    assert!(filter.matches(b"weather!1"));
    assert!(filter.matches(b""));
}

#[test]
fn test_disjoint_topics_are_isolated() {
    let weather = TopicFilter::new(&topic("weather"), MatchMode::Prefix);
    let frame = encode(&topic("traffic"), "jam");
    assert!(!weather.matches(frame.as_bytes()));
}
