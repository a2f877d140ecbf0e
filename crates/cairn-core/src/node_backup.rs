use std::sync::Arc;

use chrono::{DateTime, Utc};

use cairn_storage::{Blob, BlobStore};

use crate::error::Result;
use crate::keys::{self, EntryKind};
use crate::manifest::{parse_manifest, ManifestObject};

/// One node's backup for one named backup run.
///
/// This is a read-mostly view assembled per query, never persisted. Until
/// [`NodeBackup::exists`] has been confirmed against the data namespace it
/// is only a candidate: the index alone can claim backups whose data has
/// already been expired.
pub struct NodeBackup {
    pub(crate) store: Arc<dyn BlobStore>,
    pub(crate) node_id: String,
    pub(crate) name: String,
    pub(crate) manifest_blob: Option<Blob>,
    pub(crate) schema_blob: Option<Blob>,
    pub(crate) tokenmap_blob: Option<Blob>,
    pub(crate) started_blob: Option<Blob>,
    pub(crate) finished_blob: Option<Blob>,
    pub(crate) differential_blob: Option<Blob>,
    pub(crate) started: Option<i64>,
    pub(crate) finished: Option<i64>,
}

impl NodeBackup {
    /// Bare view for a known `(node_id, backup_name)` pair, with no blob
    /// references resolved yet.
    pub fn new(store: Arc<dyn BlobStore>, node_id: &str, name: &str) -> Self {
        Self {
            store,
            node_id: node_id.to_string(),
            name: name.to_string(),
            manifest_blob: None,
            schema_blob: None,
            tokenmap_blob: None,
            started_blob: None,
            finished_blob: None,
            differential_blob: None,
            started: None,
            finished: None,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start of this backup as unix seconds, if a start marker was found.
    pub fn started(&self) -> Option<i64> {
        self.started
    }

    /// End of this backup as unix seconds, if a finish marker was found.
    pub fn finished(&self) -> Option<i64> {
        self.finished
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn is_differential(&self) -> bool {
        self.differential_blob.is_some()
    }

    pub fn manifest_blob(&self) -> Option<&Blob> {
        self.manifest_blob.as_ref()
    }

    pub fn schema_blob(&self) -> Option<&Blob> {
        self.schema_blob.as_ref()
    }

    pub fn tokenmap_blob(&self) -> Option<&Blob> {
        self.tokenmap_blob.as_ref()
    }

    pub fn started_blob(&self) -> Option<&Blob> {
        self.started_blob.as_ref()
    }

    pub fn finished_blob(&self) -> Option<&Blob> {
        self.finished_blob.as_ref()
    }

    /// Prefix of this backup's blobs in the data namespace.
    pub fn data_prefix(&self) -> String {
        format!("{}/{}/", self.node_id, self.name)
    }

    /// Key of this backup's schema blob in the data namespace.
    pub fn schema_key(&self) -> String {
        keys::meta_key(&self.node_id, &self.name, EntryKind::Schema)
    }

    /// Whether this backup actually exists in the data namespace.
    ///
    /// Performs exactly one storage probe, keyed on the schema blob: the
    /// schema file is written with the backup data, so its presence proves
    /// the backup was not expired out from under the index. Idempotent;
    /// repeated calls re-probe.
    pub fn exists(&self) -> Result<bool> {
        Ok(self.store.get_blob(&self.schema_key())?.is_some())
    }

    /// Fetch and parse this backup's manifest.
    ///
    /// Reads the resolved manifest blob when one is attached, falling back
    /// to the data-namespace manifest key.
    pub fn manifest_objects(&self) -> Result<Vec<ManifestObject>> {
        let key = match &self.manifest_blob {
            Some(blob) => blob.key.clone(),
            None => keys::meta_key(&self.node_id, &self.name, EntryKind::Manifest),
        };
        let content = self.store.get_blob_content_as_string(&key)?;
        parse_manifest(&content)
    }

    /// Total size in bytes of the files listed in this backup's manifest.
    pub fn size(&self) -> Result<u64> {
        Ok(self.manifest_objects()?.iter().map(|o| o.size).sum())
    }
}

impl std::fmt::Debug for NodeBackup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeBackup")
            .field("node_id", &self.node_id)
            .field("name", &self.name)
            .field("started", &self.started)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
