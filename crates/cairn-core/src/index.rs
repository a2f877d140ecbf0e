//! Writing and cleaning index entries.
//!
//! The index is a copy of each backup's small metadata blobs plus marker
//! objects, laid out so one cheap prefix listing can enumerate every
//! backup. Entries are published when a backup completes and removed either
//! by retention tooling or by the self-healing listing path.

use std::collections::BTreeMap;

use tracing::{debug, info};

use cairn_storage::BlobStore;

use crate::catalog::BackupCatalog;
use crate::error::Result;
use crate::keys::{self, EntryKind, EventKind};
use crate::node_backup::NodeBackup;

/// Content-bearing index entry kinds, copied from the data namespace.
const COPIED_KINDS: [EntryKind; 3] = [EntryKind::Tokenmap, EntryKind::Schema, EntryKind::Manifest];

/// Publish the index entries for one node backup.
///
/// Copies the tokenmap, schema, and manifest metadata blobs under the index
/// prefix, and writes the differential marker and the started/finished
/// timestamp markers when the backup has them. The latest-backup pointer is
/// deliberately not touched here — see [`set_latest_backup`] — so that
/// republishing an old backup cannot move the pointer backwards.
pub fn add_backup_to_index(store: &dyn BlobStore, node_backup: &NodeBackup) -> Result<()> {
    let node_id = node_backup.node_id();
    let name = node_backup.name();

    for kind in COPIED_KINDS {
        let data_key = keys::meta_key(node_id, name, kind);
        if store.get_blob(&data_key)?.is_none() {
            debug!("backup {node_id}.{name} has no {} blob; skipping", kind.as_str());
            continue;
        }
        let content = store.get_blob_content_as_string(&data_key)?;
        store.put_object(
            &keys::index_entry_key(name, kind, node_id),
            content.as_bytes(),
        )?;
    }

    let differential = store
        .get_blob(&keys::meta_key(node_id, name, EntryKind::Differential))?
        .is_some()
        || store
            .get_blob(&keys::meta_key(node_id, name, EntryKind::Incremental))?
            .is_some();
    if differential {
        store.put_object(
            &keys::index_entry_key(name, EntryKind::Differential, node_id),
            b"",
        )?;
    }

    if let Some(ts) = node_backup.started() {
        store.put_object(
            &keys::index_timestamp_key(name, EventKind::Started, node_id, ts),
            b"",
        )?;
    }
    if let Some(ts) = node_backup.finished() {
        store.put_object(
            &keys::index_timestamp_key(name, EventKind::Finished, node_id, ts),
            b"",
        )?;
    }
    Ok(())
}

/// Point a node's latest-backup pointer at a backup name.
pub fn set_latest_backup(store: &dyn BlobStore, node_id: &str, name: &str) -> Result<()> {
    store.put_object(&keys::latest_backup_pointer_key(node_id), name.as_bytes())?;
    Ok(())
}

/// Delete every index entry for this backup's `(node_id, backup_name)`.
///
/// Lists the backup's slice of the index and deletes the entries owned by
/// the node, one key at a time. Already-deleted keys are no-ops, so the
/// call is idempotent and safe to race.
pub fn clean_backup_from_index(store: &dyn BlobStore, node_backup: &NodeBackup) -> Result<()> {
    // Trailing slash: "daily" must not sweep up "daily2".
    let prefix = format!("{}/{}/", keys::INDEX_PREFIX, node_backup.name());
    for blob in store.list_objects(&prefix)? {
        if keys::decode_owner(&blob.key)? == node_backup.node_id() {
            debug!("deleting index entry {}", blob.key);
            store.delete_object(&blob.key)?;
        }
    }
    Ok(())
}

/// Rebuild the index from a full data-namespace scan.
///
/// Publishes entries for every discovered node backup and points each
/// node's latest-backup pointer at its most recently started one. Returns
/// the number of backups indexed.
pub fn build_index(catalog: &BackupCatalog) -> Result<usize> {
    let store = catalog.store().as_ref();
    let mut latest: BTreeMap<String, (i64, String)> = BTreeMap::new();
    let mut indexed = 0usize;

    for node_backup in catalog.discover_node_backups(None)? {
        add_backup_to_index(store, &node_backup)?;
        indexed += 1;
        if let Some(started) = node_backup.started() {
            let node_id = node_backup.node_id().to_string();
            let candidate = (started, node_backup.name().to_string());
            match latest.get(&node_id) {
                Some(current) if *current >= candidate => {}
                _ => {
                    latest.insert(node_id, candidate);
                }
            }
        }
    }

    for (node_id, (_, name)) in &latest {
        set_latest_backup(store, node_id, name)?;
    }

    info!("indexed {indexed} node backups");
    Ok(indexed)
}
