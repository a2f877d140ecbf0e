use crate::error::CairnError;
use crate::keys::{
    decode_backup_name, decode_data_owner, decode_owner, decode_timestamp, index_entry_key,
    index_timestamp_key, latest_backup_pointer_key, meta_key, strip_extension, EntryKind,
    EventKind,
};

#[test]
fn entry_keys_carry_kind_extensions() {
    assert_eq!(
        index_entry_key("daily", EntryKind::Tokenmap, "node1"),
        "index/backup_index/daily/tokenmap_node1.json"
    );
    assert_eq!(
        index_entry_key("daily", EntryKind::Schema, "node1"),
        "index/backup_index/daily/schema_node1.cql"
    );
    assert_eq!(
        index_entry_key("daily", EntryKind::Manifest, "node1"),
        "index/backup_index/daily/manifest_node1.json"
    );
    assert_eq!(
        index_entry_key("daily", EntryKind::Differential, "node1"),
        "index/backup_index/daily/differential_node1"
    );
}

#[test]
fn timestamp_keys() {
    assert_eq!(
        index_timestamp_key("daily", EventKind::Started, "node1", 1700000000),
        "index/backup_index/daily/started_node1_1700000000.timestamp"
    );
    assert_eq!(
        index_timestamp_key("daily", EventKind::Finished, "node1", 1700000500),
        "index/backup_index/daily/finished_node1_1700000500.timestamp"
    );
}

#[test]
fn owner_round_trips_through_every_kind() {
    for kind in [
        EntryKind::Tokenmap,
        EntryKind::Schema,
        EntryKind::Manifest,
        EntryKind::Differential,
        EntryKind::Incremental,
    ] {
        let key = index_entry_key("daily", kind, "db-host-3.example.com");
        assert_eq!(decode_owner(&key).unwrap(), "db-host-3.example.com");
    }
    for event in [EventKind::Started, EventKind::Finished] {
        let key = index_timestamp_key("daily", event, "db-host-3.example.com", 1700000000);
        assert_eq!(decode_owner(&key).unwrap(), "db-host-3.example.com");
        assert_eq!(decode_timestamp(&key).unwrap(), 1700000000);
    }
}

#[test]
fn timestamp_pattern_wins_over_generic_pattern() {
    // A timestamped key must not have its event name parsed as the owner.
    let owner = decode_owner("index/backup_index/daily/started_nodeA_1700000000.timestamp");
    assert_eq!(owner.unwrap(), "nodeA");
}

#[test]
fn owner_may_contain_underscores() {
    let key = index_timestamp_key("daily", EventKind::Started, "node_a_1", 42);
    assert_eq!(decode_owner(&key).unwrap(), "node_a_1");
    assert_eq!(decode_timestamp(&key).unwrap(), 42);
}

#[test]
fn malformed_keys_are_fatal() {
    // No recognizable kind segment.
    assert!(matches!(
        decode_owner("index/backup_index/daily/bogus"),
        Err(CairnError::MalformedKey(_))
    ));
    // Timestamp decoding requires the timestamp grammar.
    assert!(matches!(
        decode_timestamp("index/backup_index/daily/tokenmap_node1.json"),
        Err(CairnError::MalformedKey(_))
    ));
    assert!(matches!(
        decode_timestamp("index/backup_index/daily/started_node1.timestamp"),
        Err(CairnError::MalformedKey(_))
    ));
}

#[test]
fn extensions_are_stripped_from_owners() {
    assert_eq!(
        decode_owner("index/backup_index/daily/tokenmap_node1.json").unwrap(),
        "node1"
    );
    assert_eq!(
        decode_owner("index/backup_index/daily/schema_node1.cql").unwrap(),
        "node1"
    );
    assert_eq!(strip_extension("node1.txt"), "node1");
    assert_eq!(strip_extension("node1"), "node1");
}

#[test]
fn backup_name_from_index_key() {
    assert_eq!(
        decode_backup_name("index/backup_index/daily/tokenmap_node1.json").unwrap(),
        "daily"
    );
    assert!(matches!(
        decode_backup_name("node1/daily/meta/schema"),
        Err(CairnError::MalformedKey(_))
    ));
    assert!(matches!(
        decode_backup_name("index/backup_index/daily"),
        Err(CairnError::MalformedKey(_))
    ));
}

#[test]
fn data_owner_from_data_key() {
    assert_eq!(
        decode_data_owner("node1/daily/meta/schema").unwrap(),
        ("node1".to_string(), "daily".to_string())
    );
    assert_eq!(
        decode_data_owner("node1/daily/data/ks/tbl/file-1.db").unwrap(),
        ("node1".to_string(), "daily".to_string())
    );
    assert!(matches!(
        decode_data_owner("node1/daily"),
        Err(CairnError::MalformedKey(_))
    ));
}

#[test]
fn pointer_and_meta_keys() {
    assert_eq!(
        latest_backup_pointer_key("node1"),
        "index/latest_backup/node1/backup_name.txt"
    );
    assert_eq!(
        meta_key("node1", "daily", EntryKind::Schema),
        "node1/daily/meta/schema"
    );
    assert_eq!(
        meta_key("node1", "daily", EntryKind::Differential),
        "node1/daily/meta/differential"
    );
}
