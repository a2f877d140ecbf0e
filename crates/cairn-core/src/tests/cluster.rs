use std::sync::Arc;

use crate::catalog::BackupCatalog;
use crate::testutil::{seed_data_backup, seed_index_entries, MemoryBlobStore};

fn seed_node(store: &MemoryBlobStore, node: &str, name: &str, started: i64, finished: Option<i64>) {
    seed_index_entries(store, node, name, Some(started), finished);
    seed_data_backup(store, node, name, started, finished);
}

#[test]
fn cluster_backups_group_by_name_in_order() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_node(&store, "nodeA", "weekly", 3000, Some(3500));
    seed_node(&store, "nodeB", "weekly", 3100, Some(3600));
    seed_node(&store, "nodeA", "daily", 1000, Some(1500));
    seed_node(&store, "nodeB", "daily", 1100, Some(1600));

    let catalog = BackupCatalog::with_store(store.clone());
    let clusters: Vec<_> = catalog.list_cluster_backups(None).unwrap().collect();

    assert_eq!(clusters.len(), 2);
    // Non-decreasing (backup_name, started) order, every member sharing
    // the group's name.
    assert_eq!(clusters[0].name(), "daily");
    assert_eq!(clusters[1].name(), "weekly");
    for cluster in &clusters {
        assert_eq!(cluster.node_backups().len(), 2);
        assert!(cluster
            .node_backups()
            .iter()
            .all(|nb| nb.name() == cluster.name()));
        let starts: Vec<_> = cluster
            .node_backups()
            .iter()
            .map(|nb| nb.started().unwrap())
            .collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
    }
}

#[test]
fn cluster_start_is_earliest_and_finish_is_latest() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_node(&store, "nodeA", "daily", 1000, Some(2000));
    seed_node(&store, "nodeB", "daily", 1200, Some(1800));

    let catalog = BackupCatalog::with_store(store.clone());
    let cluster = catalog.get_cluster_backup("daily").unwrap();

    assert_eq!(cluster.started(), Some(1000));
    assert_eq!(cluster.finished(), Some(2000));
    assert!(cluster.is_complete());
    assert!(cluster.unfinished_nodes().is_empty());
}

#[test]
fn one_unfinished_member_makes_the_cluster_incomplete() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_node(&store, "nodeA", "daily", 1000, Some(2000));
    seed_node(&store, "nodeB", "daily", 1100, None);

    let catalog = BackupCatalog::with_store(store.clone());
    let cluster = catalog.get_cluster_backup("daily").unwrap();

    assert!(!cluster.is_complete());
    assert_eq!(cluster.finished(), None);
    assert_eq!(cluster.unfinished_nodes(), vec!["nodeB"]);

    // Incomplete backups still count for "latest attempted"...
    let latest = catalog.latest_cluster_backup(None).unwrap().unwrap();
    assert_eq!(latest.name(), "daily");
    // ...but not for "latest complete".
    assert!(catalog.latest_complete_cluster_backup(None).unwrap().is_none());
}

#[test]
fn latest_cluster_backup_picks_maximum_start() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_node(&store, "nodeA", "daily", 1000, Some(1500));
    seed_node(&store, "nodeA", "weekly", 3000, None);

    let catalog = BackupCatalog::with_store(store.clone());
    let latest = catalog.latest_cluster_backup(None).unwrap().unwrap();
    assert_eq!(latest.name(), "weekly");
}

#[test]
fn latest_complete_cluster_backup_picks_maximum_finish() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_node(&store, "nodeA", "daily", 1000, Some(4000));
    seed_node(&store, "nodeA", "weekly", 3000, Some(3500));
    seed_node(&store, "nodeA", "adhoc", 2000, None);

    let catalog = BackupCatalog::with_store(store.clone());
    let latest = catalog
        .latest_complete_cluster_backup(None)
        .unwrap()
        .unwrap();
    // "daily" started earlier but finished later; completeness ranks by
    // finish time.
    assert_eq!(latest.name(), "daily");
}

#[test]
fn no_backups_means_no_latest() {
    let store = Arc::new(MemoryBlobStore::new());
    let catalog = BackupCatalog::with_store(store.clone());
    assert!(catalog.latest_cluster_backup(None).unwrap().is_none());
    assert!(catalog.latest_complete_cluster_backup(None).unwrap().is_none());
}
