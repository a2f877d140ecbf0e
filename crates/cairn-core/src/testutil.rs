use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cairn_storage::error::{Result, StorageError};
use cairn_storage::{Blob, BlobStore};

use crate::keys::{self, EntryKind, EventKind};

struct StoredObject {
    data: Vec<u8>,
    last_modified: Option<i64>,
}

/// In-memory blob store for testing. Thread-safe via Mutex.
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Write an object with an explicit last-modified time, for tests that
    /// derive timestamps from blob metadata.
    pub fn put_with_time(&self, key: &str, data: &[u8], last_modified: i64) {
        let mut map = self.objects.lock().unwrap();
        map.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                last_modified: Some(last_modified),
            },
        );
    }

    /// All stored keys, for asserting on final storage state.
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

impl BlobStore for MemoryBlobStore {
    fn list_objects(&self, prefix: &str) -> Result<Vec<Blob>> {
        let map = self.objects.lock().unwrap();
        Ok(map
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| Blob {
                key: k.clone(),
                size: v.data.len() as u64,
                checksum: None,
                last_modified: v.last_modified,
            })
            .collect())
    }

    fn get_blob(&self, key: &str) -> Result<Option<Blob>> {
        let map = self.objects.lock().unwrap();
        Ok(map.get(key).map(|v| Blob {
            key: key.to_string(),
            size: v.data.len() as u64,
            checksum: None,
            last_modified: v.last_modified,
        }))
    }

    fn get_blob_content_as_string(&self, key: &str) -> Result<String> {
        let map = self.objects.lock().unwrap();
        let obj = map
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        String::from_utf8(obj.data.clone()).map_err(|_| StorageError::NotText(key.to_string()))
    }

    fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut map = self.objects.lock().unwrap();
        map.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                last_modified: None,
            },
        );
        Ok(())
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        let mut map = self.objects.lock().unwrap();
        map.remove(key);
        Ok(())
    }
}

/// Store wrapper that rejects deletes with an authorization failure, for
/// exercising the self-healing skip path. Delegates everything else.
pub struct DenyDeleteStore {
    inner: MemoryBlobStore,
}

impl DenyDeleteStore {
    pub fn new(inner: MemoryBlobStore) -> Self {
        Self { inner }
    }
}

impl BlobStore for DenyDeleteStore {
    fn list_objects(&self, prefix: &str) -> Result<Vec<Blob>> {
        self.inner.list_objects(prefix)
    }
    fn get_blob(&self, key: &str) -> Result<Option<Blob>> {
        self.inner.get_blob(key)
    }
    fn get_blob_content_as_string(&self, key: &str) -> Result<String> {
        self.inner.get_blob_content_as_string(key)
    }
    fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        self.inner.put_object(key, data)
    }
    fn delete_object(&self, key: &str) -> Result<()> {
        Err(StorageError::Unauthorized(format!(
            "delete denied for {key}"
        )))
    }
}

/// Shared counter of `get_blob` probes, for asserting on the existence
/// short-circuit.
#[derive(Clone)]
pub struct ProbeLog(Arc<AtomicUsize>);

impl ProbeLog {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Store wrapper that counts metadata probes. Delegates everything to an
/// inner [`MemoryBlobStore`].
pub struct ProbeCountingStore {
    inner: MemoryBlobStore,
    probes: ProbeLog,
}

impl ProbeCountingStore {
    pub fn new(inner: MemoryBlobStore) -> (Self, ProbeLog) {
        let probes = ProbeLog(Arc::new(AtomicUsize::new(0)));
        (
            Self {
                inner,
                probes: probes.clone(),
            },
            probes,
        )
    }
}

impl BlobStore for ProbeCountingStore {
    fn list_objects(&self, prefix: &str) -> Result<Vec<Blob>> {
        self.inner.list_objects(prefix)
    }
    fn get_blob(&self, key: &str) -> Result<Option<Blob>> {
        self.probes.0.fetch_add(1, Ordering::SeqCst);
        self.inner.get_blob(key)
    }
    fn get_blob_content_as_string(&self, key: &str) -> Result<String> {
        self.inner.get_blob_content_as_string(key)
    }
    fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        self.inner.put_object(key, data)
    }
    fn delete_object(&self, key: &str) -> Result<()> {
        self.inner.delete_object(key)
    }
}

/// Seed the data namespace with one node backup's blobs.
pub fn seed_data_backup(
    store: &MemoryBlobStore,
    node_id: &str,
    name: &str,
    started: i64,
    finished: Option<i64>,
) {
    store.put_with_time(
        &keys::meta_key(node_id, name, EntryKind::Schema),
        b"CREATE KEYSPACE ks WITH replication = {'class': 'SimpleStrategy'};",
        started,
    );
    store.put_with_time(
        &keys::meta_key(node_id, name, EntryKind::Tokenmap),
        format!("{{\"{node_id}\": {{\"tokens\": [1, 2, 3]}}}}").as_bytes(),
        started,
    );
    if let Some(finished) = finished {
        store.put_with_time(
            &keys::meta_key(node_id, name, EntryKind::Manifest),
            format!(
                "[{{\"path\": \"{node_id}/{name}/data/ks/tbl/file-1.db\", \
                 \"size\": 2048, \"MD5\": \"d41d8cd9\"}}]"
            )
            .as_bytes(),
            finished,
        );
    }
}

/// Seed the index namespace with one node backup's entries.
pub fn seed_index_entries(
    store: &MemoryBlobStore,
    node_id: &str,
    name: &str,
    started: Option<i64>,
    finished: Option<i64>,
) {
    store
        .put_object(
            &keys::index_entry_key(name, EntryKind::Tokenmap, node_id),
            b"{}",
        )
        .unwrap();
    store
        .put_object(
            &keys::index_entry_key(name, EntryKind::Schema, node_id),
            b"CREATE KEYSPACE ks;",
        )
        .unwrap();
    store
        .put_object(
            &keys::index_entry_key(name, EntryKind::Manifest, node_id),
            b"[]",
        )
        .unwrap();
    if let Some(ts) = started {
        store
            .put_object(
                &keys::index_timestamp_key(name, EventKind::Started, node_id, ts),
                b"",
            )
            .unwrap();
    }
    if let Some(ts) = finished {
        store
            .put_object(
                &keys::index_timestamp_key(name, EventKind::Finished, node_id, ts),
                b"",
            )
            .unwrap();
    }
}
