use cairn_storage::BlobStore;
use std::sync::Arc;

use crate::catalog::BackupCatalog;
use crate::keys::{self, EntryKind};
use crate::manifest::format_bytes;
use crate::testutil::{seed_data_backup, seed_index_entries, MemoryBlobStore};

#[test]
fn manifest_objects_parse_from_the_data_namespace() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_data_backup(&store, "nodeA", "daily", 1000, Some(2000));

    let catalog = BackupCatalog::with_store(store.clone());
    let nb = catalog.get_node_backup("nodeA", "daily");

    let objects = nb.manifest_objects().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].path, "nodeA/daily/data/ks/tbl/file-1.db");
    assert_eq!(objects[0].size, 2048);
    assert_eq!(nb.size().unwrap(), 2048);
    assert_eq!(format_bytes(nb.size().unwrap()), "2.00 KB");
}

#[test]
fn manifest_objects_prefer_the_resolved_index_blob() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_index_entries(&store, "nodeA", "daily", Some(1000), Some(2000));
    seed_data_backup(&store, "nodeA", "daily", 1000, Some(2000));
    // The index copy differs from the data namespace's manifest.
    store
        .put_object(
            &keys::index_entry_key("daily", EntryKind::Manifest, "nodeA"),
            br#"[{"path": "a", "size": 1, "MD5": "x"}, {"path": "b", "size": 2, "MD5": "y"}]"#,
        )
        .unwrap();

    let catalog = BackupCatalog::with_store(store.clone());
    let nb = catalog
        .list_node_backups(Some("nodeA"), None)
        .unwrap()
        .next()
        .unwrap();
    assert_eq!(nb.manifest_objects().unwrap().len(), 2);
    assert_eq!(nb.size().unwrap(), 3);
}

#[test]
fn missing_manifest_is_an_error() {
    let store = Arc::new(MemoryBlobStore::new());
    let catalog = BackupCatalog::with_store(store.clone());
    let nb = catalog.get_node_backup("nodeA", "daily");
    assert!(nb.manifest_objects().is_err());
}

#[test]
fn view_accessors() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_data_backup(&store, "nodeA", "daily", 1000, None);

    let catalog = BackupCatalog::with_store(store.clone());
    let nb = catalog.get_node_backup("nodeA", "daily");

    assert_eq!(nb.data_prefix(), "nodeA/daily/");
    assert_eq!(nb.schema_key(), "nodeA/daily/meta/schema");
    assert!(nb.exists().unwrap());
    assert!(!nb.is_differential());
    assert!(nb.started_at().is_none());
}

#[test]
fn timestamps_convert_to_datetimes() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_index_entries(&store, "nodeA", "daily", Some(1700000000), Some(1700000500));
    seed_data_backup(&store, "nodeA", "daily", 1700000000, Some(1700000500));

    let catalog = BackupCatalog::with_store(store.clone());
    let nb = catalog.list_node_backups(None, None).unwrap().next().unwrap();
    assert_eq!(nb.started_at().unwrap().timestamp(), 1700000000);
    assert_eq!(nb.finished_at().unwrap().timestamp(), 1700000500);
}
