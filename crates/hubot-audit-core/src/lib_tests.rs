//! Tests for the hubot-audit-core library module.

use super::*;

#[test]
fn test_identity_tags_default_to_literals() {
    let tags = IdentityTags::default();

    assert_eq!(tags.instance_id, "DEFAULT_UUID");
    assert_eq!(tags.space_id, "DEFAULT_SPACE");
    assert_eq!(tags.group_id, "DEFAULT_GROUP");
}

#[test]
fn test_identity_tags_substitute_defaults_for_empty_values() {
    let tags = IdentityTags::new("", "space-1", "  ");

    assert_eq!(tags.instance_id, DEFAULT_INSTANCE_ID);
    assert_eq!(tags.space_id, "space-1");
    assert_eq!(tags.group_id, DEFAULT_GROUP_ID);
}

#[test]
fn test_timestamp_serializes_as_epoch_millis() {
    let timestamp = Timestamp::from_millis(1_500_000_000_123);

    let json = serde_json::to_string(&timestamp).unwrap();
    assert_eq!(json, "1500000000123");

    let parsed: Timestamp = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, timestamp);
}

#[test]
fn test_timestamp_now_is_monotonic_enough() {
    let first = Timestamp::now();
    let second = Timestamp::now();

    assert!(second >= first);
    assert!(first.as_datetime().is_some());
}
