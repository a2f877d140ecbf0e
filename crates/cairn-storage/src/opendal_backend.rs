use opendal::{BlockingOperator, Metakey, Operator};

use crate::error::Result;
use crate::{Blob, BlobStore};

/// Blob store backed by an opendal [`BlockingOperator`].
///
/// One wrapper covers every supported service; the constructors only differ
/// in how the operator is built.
pub struct OpendalStore {
    op: BlockingOperator,
}

impl OpendalStore {
    /// Create a store backed by a local filesystem directory.
    pub fn local(root: &str) -> Result<Self> {
        let builder = opendal::services::Fs::default().root(root);
        let op = Operator::new(builder)?.finish().blocking();
        Ok(Self { op })
    }

    /// Create a store backed by AWS S3 (or S3-compatible like MinIO).
    pub fn s3(
        bucket: &str,
        region: &str,
        root: &str,
        endpoint: Option<&str>,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
    ) -> Result<Self> {
        let mut builder = opendal::services::S3::default()
            .bucket(bucket)
            .region(region)
            .root(root);
        if let Some(ep) = endpoint {
            builder = builder.endpoint(ep);
        }
        if let Some(key_id) = access_key_id {
            builder = builder.access_key_id(key_id);
        }
        if let Some(secret) = secret_access_key {
            builder = builder.secret_access_key(secret);
        }
        let op = Operator::new(builder)?.finish().blocking();
        Ok(Self { op })
    }

    /// Create a store backed by Google Cloud Storage.
    pub fn gcs(bucket: &str, root: &str, credential_path: Option<&str>) -> Result<Self> {
        let mut builder = opendal::services::Gcs::default().bucket(bucket).root(root);
        if let Some(path) = credential_path {
            builder = builder.credential_path(path);
        }
        let op = Operator::new(builder)?.finish().blocking();
        Ok(Self { op })
    }

    fn blob_from_metadata(key: &str, meta: &opendal::Metadata) -> Blob {
        Blob {
            key: key.to_string(),
            size: meta.content_length(),
            checksum: meta.content_md5().map(str::to_string),
            last_modified: meta.last_modified().map(|t| t.timestamp()),
        }
    }
}

impl BlobStore for OpendalStore {
    fn list_objects(&self, prefix: &str) -> Result<Vec<Blob>> {
        // opendal lists directories; the catalog's prefixes are all
        // directory-shaped, they just arrive without the trailing slash.
        let path = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };
        let entries = self
            .op
            .list_with(&path)
            .recursive(true)
            .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::ContentMd5)
            .call()?;
        let mut blobs = Vec::new();
        for entry in entries {
            // Skip directory markers
            if entry.path().ends_with('/') {
                continue;
            }
            blobs.push(Self::blob_from_metadata(entry.path(), entry.metadata()));
        }
        Ok(blobs)
    }

    fn get_blob(&self, key: &str) -> Result<Option<Blob>> {
        match self.op.stat(key) {
            Ok(meta) => Ok(Some(Self::blob_from_metadata(key, &meta))),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_blob_content_as_string(&self, key: &str) -> Result<String> {
        let buf = self.op.read(key)?;
        String::from_utf8(buf.to_vec()).map_err(|_| crate::StorageError::NotText(key.to_string()))
    }

    fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        self.op.write(key, data.to_vec())?;
        Ok(())
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        match self.op.delete(key) {
            Ok(()) => Ok(()),
            // Deleting an absent key is a no-op.
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
