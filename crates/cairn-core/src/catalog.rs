use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use cairn_storage::{store_from_config, Blob, BlobStore};

use crate::cluster_backup::ClusterBackup;
use crate::config::{storage_config_from_catalog, CatalogConfig};
use crate::error::{CairnError, Result};
use crate::index;
use crate::keys::{self, EntryKind, EventKind};
use crate::node_backup::NodeBackup;

/// Two-level grouping of index blobs: backup name → node id → blobs.
///
/// Rebuilt on every query that needs it and discarded afterwards; never
/// cached across calls.
pub type IndexGrouping = BTreeMap<String, BTreeMap<String, Vec<Blob>>>;

/// Outcome of an opportunistic index cleanup attempt during listing.
#[derive(Debug)]
pub enum CleanupOutcome {
    /// Stale index entries were deleted.
    Removed,
    /// The caller's credentials lack delete permission; entries retained.
    SkippedUnauthorized,
    /// Cleanup failed for another reason; entries retained.
    Failed(CairnError),
}

/// The catalog of cluster backups held in one object-storage bucket.
///
/// The catalog is layered on two independently-mutating namespaces: the
/// index (`index/`) and the data namespace (`<node>/<backup>/...`). It is
/// eventually consistent and self-healing — stale index entries are removed
/// as a side effect of listing — but never authoritative. Every operation
/// is a stateless query; nothing is cached between calls.
pub struct BackupCatalog {
    store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for BackupCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupCatalog").finish_non_exhaustive()
    }
}

impl BackupCatalog {
    /// Resolve the configured provider and connect to it.
    pub fn connect(config: &CatalogConfig) -> Result<Self> {
        let store = store_from_config(&storage_config_from_catalog(config))?;
        Ok(Self {
            store: Arc::from(store),
        })
    }

    /// Wrap an already-constructed store.
    pub fn with_store(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// View of one known backup, without any listing.
    pub fn get_node_backup(&self, node_id: &str, name: &str) -> NodeBackup {
        NodeBackup::new(self.store.clone(), node_id, name)
    }

    /// List the raw index entries. Callers running several queries against
    /// one point-in-time view of the index pass the result back in as the
    /// `preloaded_index`.
    pub fn list_backup_index_blobs(&self) -> Result<Vec<Blob>> {
        Ok(self.store.list_objects(keys::INDEX_PREFIX)?)
    }

    /// Build the two-level index grouping. A key that does not parse aborts
    /// the whole operation: a partially-parsed index cannot be trusted.
    pub fn group_index_by_backup_and_node(&self, index_blobs: &[Blob]) -> Result<IndexGrouping> {
        let mut grouping: IndexGrouping = BTreeMap::new();
        for blob in index_blobs {
            let backup_name = keys::decode_backup_name(&blob.key)?;
            let node_id = keys::decode_owner(&blob.key)?;
            grouping
                .entry(backup_name)
                .or_default()
                .entry(node_id)
                .or_default()
                .push(blob.clone());
        }
        Ok(grouping)
    }

    /// Discover node backups by traversing the data namespace.
    ///
    /// This scans every object under the node prefix (or the entire bucket)
    /// and is very taxing for cloud backends. It exists to rebuild the
    /// index, not for regular listing — use [`BackupCatalog::list_node_backups`]
    /// for that.
    pub fn discover_node_backups(
        &self,
        node_filter: Option<&str>,
    ) -> Result<impl Iterator<Item = NodeBackup> + '_> {
        let prefix = node_filter.unwrap_or("");
        debug!("listing blobs with prefix '{prefix}'");
        let blobs = self.store.list_objects(prefix)?;
        debug!("finished listing blobs");

        let meta_marker = format!("/{}/", keys::META_FOLDER);
        let mut groups: BTreeMap<(String, String), Vec<Blob>> = BTreeMap::new();
        for blob in blobs {
            if !blob.key.contains(&meta_marker) {
                continue;
            }
            let (node_id, backup_name) = keys::decode_data_owner(&blob.key)?;
            if node_filter.is_some_and(|f| f != node_id.as_str()) {
                continue;
            }
            groups.entry((node_id, backup_name)).or_default().push(blob);
        }

        let store = self.store.clone();
        Ok(groups
            .into_iter()
            .filter_map(move |((node_id, backup_name), blobs)| {
                // The schema blob is written with the backup data; a group
                // without one is garbage, not a backup.
                find_meta_blob(&blobs, EntryKind::Schema)?;
                debug!("found backup {node_id}.{backup_name}");
                Some(node_backup_from_data_blobs(
                    store.clone(),
                    node_id,
                    backup_name,
                    &blobs,
                ))
            }))
    }

    /// List node backups using the index.
    ///
    /// The cheap path: one listing under the index prefix. If there is no
    /// index, nothing is found — rebuild it from
    /// [`BackupCatalog::discover_node_backups`] in that case.
    ///
    /// Backups whose start marker never made it into the index are
    /// unorderable and are dropped from the output. The returned sequence
    /// verifies existence lazily, walking candidates oldest-first: once one
    /// backup is confirmed to exist, all later-started ones are assumed to
    /// exist too, on the premise that expiry prunes oldest-first. This
    /// trades a small staleness risk for far fewer storage probes. Any
    /// candidate confirmed missing has its index entries removed on the
    /// spot.
    pub fn list_node_backups(
        &self,
        node_filter: Option<&str>,
        preloaded_index: Option<Vec<Blob>>,
    ) -> Result<NodeBackupListing<'_>> {
        let index_blobs = match preloaded_index {
            Some(blobs) => blobs,
            None => self.list_backup_index_blobs()?,
        };
        let grouping = self.group_index_by_backup_and_node(&index_blobs)?;

        let mut candidates = Vec::new();
        let mut saw_tokenmap = false;
        for (backup_name, nodes) in &grouping {
            for (node_id, blobs) in nodes {
                // A tokenmap entry is the existence proxy: if it made it
                // into the index, the whole backup is assumed present.
                if lookup_blob(blobs, EntryKind::Tokenmap.as_str()).is_none() {
                    continue;
                }
                saw_tokenmap = true;
                if node_filter.is_some_and(|f| f != node_id.as_str()) {
                    continue;
                }
                candidates.push(self.node_backup_from_index_blobs(node_id, backup_name, blobs)?);
            }
        }

        if !saw_tokenmap {
            info!("no backups found in index; rebuild the index if backups exist");
        }

        // Oldest first; candidates without a derivable start are dropped.
        candidates.retain(|nb| nb.started().is_some());
        candidates.sort_by_key(NodeBackup::started);

        Ok(NodeBackupListing {
            catalog: self,
            pending: candidates.into_iter(),
            previous_existed: false,
        })
    }

    /// Resolve one index candidate's companion blobs and timestamps.
    fn node_backup_from_index_blobs(
        &self,
        node_id: &str,
        backup_name: &str,
        blobs: &[Blob],
    ) -> Result<NodeBackup> {
        let started_blob = lookup_blob(blobs, EventKind::Started.as_str());
        let finished_blob = lookup_blob(blobs, EventKind::Finished.as_str());
        let started = started_blob
            .as_ref()
            .map(|b| keys::decode_timestamp(&b.key))
            .transpose()?;
        let finished = finished_blob
            .as_ref()
            .map(|b| keys::decode_timestamp(&b.key))
            .transpose()?;
        let differential_blob = lookup_blob(blobs, EntryKind::Differential.as_str())
            .or_else(|| lookup_blob(blobs, EntryKind::Incremental.as_str()));

        Ok(NodeBackup {
            store: self.store.clone(),
            node_id: node_id.to_string(),
            name: backup_name.to_string(),
            manifest_blob: lookup_blob(blobs, EntryKind::Manifest.as_str()),
            schema_blob: lookup_blob(blobs, EntryKind::Schema.as_str()),
            tokenmap_blob: lookup_blob(blobs, EntryKind::Tokenmap.as_str()),
            started_blob,
            finished_blob,
            differential_blob,
            started,
            finished,
        })
    }

    /// List cluster backups, grouped by backup name.
    pub fn list_cluster_backups(
        &self,
        preloaded_index: Option<Vec<Blob>>,
    ) -> Result<impl Iterator<Item = ClusterBackup> + use<>> {
        let mut node_backups: Vec<NodeBackup> =
            self.list_node_backups(None, preloaded_index)?.collect();
        node_backups.sort_by(|a, b| {
            (a.name(), a.started()).cmp(&(b.name(), b.started()))
        });

        let mut groups: Vec<ClusterBackup> = Vec::new();
        for nb in node_backups {
            match groups.last_mut() {
                Some(cb) if cb.name() == nb.name() => cb.push(nb),
                _ => {
                    let name = nb.name().to_string();
                    groups.push(ClusterBackup::new(name, vec![nb]));
                }
            }
        }
        Ok(groups.into_iter())
    }

    /// The most recent backup of one node, via the latest-backup pointer.
    ///
    /// Best-effort: the pointer is an optimization, not the source of
    /// truth, so any failure along this path reports "no latest backup".
    /// A pointer at a backup that no longer exists is deleted on the spot.
    pub fn latest_node_backup(&self, node_id: &str) -> Option<NodeBackup> {
        match self.resolve_latest_node_backup(node_id) {
            Ok(node_backup) => Some(node_backup),
            Err(e) => {
                info!("node {node_id} does not have a latest backup: {e}");
                None
            }
        }
    }

    fn resolve_latest_node_backup(&self, node_id: &str) -> Result<NodeBackup> {
        let pointer_key = keys::latest_backup_pointer_key(node_id);
        let name = self.store.get_blob_content_as_string(&pointer_key)?;
        let name = name.trim().to_string();

        let differential_blob = match self
            .store
            .get_blob(&keys::meta_key(node_id, &name, EntryKind::Differential))?
        {
            Some(blob) => Some(blob),
            // Legacy marker name, kept for backups written by older tooling.
            None => self
                .store
                .get_blob(&keys::meta_key(node_id, &name, EntryKind::Incremental))?,
        };

        let mut node_backup = NodeBackup::new(self.store.clone(), node_id, &name);
        node_backup.differential_blob = differential_blob;

        if !node_backup.exists()? {
            warn!("latest-backup pointer for {node_id} references a missing backup; deleting it");
            self.remove_latest_backup_marker(node_id)?;
            return Err(CairnError::BackupNotFound(name));
        }
        Ok(node_backup)
    }

    /// The cluster backup with the maximum start time, complete or not.
    /// Ties are broken arbitrarily.
    pub fn latest_cluster_backup(
        &self,
        preloaded_index: Option<Vec<Blob>>,
    ) -> Result<Option<ClusterBackup>> {
        let last_started = self
            .list_cluster_backups(preloaded_index)?
            .max_by_key(ClusterBackup::started);
        debug!(
            "latest cluster backup: {:?}",
            last_started.as_ref().map(ClusterBackup::name)
        );
        Ok(last_started)
    }

    /// The most recent cluster backup that finished on every node.
    pub fn latest_complete_cluster_backup(
        &self,
        preloaded_index: Option<Vec<Blob>>,
    ) -> Result<Option<ClusterBackup>> {
        Ok(self
            .list_cluster_backups(preloaded_index)?
            .filter(|cb| cb.finished().is_some())
            .max_by_key(ClusterBackup::finished))
    }

    /// Find a cluster backup by name.
    pub fn get_cluster_backup(&self, backup_name: &str) -> Result<ClusterBackup> {
        self.list_cluster_backups(None)?
            .find(|cb| cb.name() == backup_name)
            .ok_or_else(|| CairnError::BackupNotFound(backup_name.to_string()))
    }

    /// Delete every index entry for this backup's `(node_id, backup_name)`.
    ///
    /// Used by the self-healing path when a backup turns out to exist only
    /// in the index, and by retention tooling after deleting backup data.
    /// Deletions are idempotent, so concurrent engines racing on the same
    /// entries are safe.
    pub fn remove_backup_from_index(&self, node_backup: &NodeBackup) -> Result<()> {
        index::clean_backup_from_index(self.store.as_ref(), node_backup)
    }

    /// Delete all latest-backup marker objects for a node.
    pub fn remove_latest_backup_marker(&self, node_id: &str) -> Result<()> {
        let markers = self.store.list_objects(&keys::latest_backup_dir(node_id))?;
        for marker in markers {
            self.store.delete_object(&marker.key)?;
        }
        Ok(())
    }

    /// Remove a stale backup's index entries, downgrading authorization
    /// failures: listing credentials often lack delete permission, and the
    /// listing must still complete without cleanup in that case.
    pub fn cleanup_stale_backup(&self, node_backup: &NodeBackup) -> CleanupOutcome {
        match self.remove_backup_from_index(node_backup) {
            Ok(()) => CleanupOutcome::Removed,
            Err(e) if e.is_unauthorized() => CleanupOutcome::SkippedUnauthorized,
            Err(e) => CleanupOutcome::Failed(e),
        }
    }
}

/// Lazy sequence of node backups in ascending start order.
///
/// Existence verification and self-healing run on demand as items are
/// pulled; abandoning the iterator stops all of it.
pub struct NodeBackupListing<'a> {
    catalog: &'a BackupCatalog,
    pending: std::vec::IntoIter<NodeBackup>,
    previous_existed: bool,
}

impl Iterator for NodeBackupListing<'_> {
    type Item = NodeBackup;

    fn next(&mut self) -> Option<NodeBackup> {
        for node_backup in self.pending.by_ref() {
            // Once one backup is confirmed to exist, all later-started ones
            // are assumed to exist too: expiry prunes oldest-first, so the
            // remaining probes would all succeed anyway.
            if self.previous_existed {
                return Some(node_backup);
            }
            match node_backup.exists() {
                Ok(true) => {
                    self.previous_existed = true;
                    return Some(node_backup);
                }
                Ok(false) => {
                    debug!(
                        "backup {} for node {} present only in index",
                        node_backup.name(),
                        node_backup.node_id()
                    );
                    match self.catalog.cleanup_stale_backup(&node_backup) {
                        CleanupOutcome::Removed => {}
                        CleanupOutcome::SkippedUnauthorized => debug!(
                            "not authorized to clean index entries of {} for node {}; \
                             ignoring and continuing",
                            node_backup.name(),
                            node_backup.node_id()
                        ),
                        CleanupOutcome::Failed(e) => warn!(
                            "failed to clean index entries of {} for node {}: {e}",
                            node_backup.name(),
                            node_backup.node_id()
                        ),
                    }
                }
                Err(e) => {
                    warn!(
                        "existence check failed for backup {} of node {}: {e}; omitting it",
                        node_backup.name(),
                        node_backup.node_id()
                    );
                }
            }
        }
        None
    }
}

/// First blob in a node's list whose file name contains the kind substring.
fn lookup_blob(blobs: &[Blob], kind: &str) -> Option<Blob> {
    blobs
        .iter()
        .find(|b| b.key.rsplit('/').next().is_some_and(|file| file.contains(kind)))
        .cloned()
}

/// Exact metadata blob of a kind within a discovered data-namespace group.
fn find_meta_blob(blobs: &[Blob], kind: EntryKind) -> Option<&Blob> {
    let suffix = format!("/{}/{}", keys::META_FOLDER, kind.as_str());
    blobs.iter().find(|b| b.key.ends_with(&suffix))
}

/// Assemble a node backup from its discovered data-namespace blobs.
///
/// The data namespace has no timestamp markers, so start and finish fall
/// back to blob modification times: the schema is written when the backup
/// starts, the manifest when it completes.
fn node_backup_from_data_blobs(
    store: Arc<dyn BlobStore>,
    node_id: String,
    name: String,
    blobs: &[Blob],
) -> NodeBackup {
    let schema_blob = find_meta_blob(blobs, EntryKind::Schema).cloned();
    let manifest_blob = find_meta_blob(blobs, EntryKind::Manifest).cloned();
    let tokenmap_blob = find_meta_blob(blobs, EntryKind::Tokenmap).cloned();
    let differential_blob = find_meta_blob(blobs, EntryKind::Differential)
        .or_else(|| find_meta_blob(blobs, EntryKind::Incremental))
        .cloned();
    let started = schema_blob.as_ref().and_then(|b| b.last_modified);
    let finished = manifest_blob.as_ref().and_then(|b| b.last_modified);

    NodeBackup {
        store,
        node_id,
        name,
        manifest_blob,
        schema_blob,
        tokenmap_blob,
        started_blob: None,
        finished_blob: None,
        differential_blob,
        started,
        finished,
    }
}
