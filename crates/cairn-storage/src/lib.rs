pub mod error;
pub mod opendal_backend;
pub mod retry;

use serde::{Deserialize, Serialize};

pub use error::{Result, StorageError};
pub use opendal_backend::OpendalStore;
pub use retry::{retry_transient, RetryConfig};

/// A stored object as seen through a listing or a metadata probe.
///
/// This is a point-in-time description, not live storage state: the object
/// can be deleted or replaced after the `Blob` was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Full key (path) of the object.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Content checksum, when the backend reports one.
    pub checksum: Option<String>,
    /// Last-modified time as unix seconds, when the backend reports one.
    pub last_modified: Option<i64>,
}

/// Capability surface the catalog needs from a storage backend.
///
/// All calls are synchronous; callers wanting concurrency layer it on the
/// outside. Implementations must make `delete_object` a no-op on missing
/// keys.
pub trait BlobStore: Send + Sync {
    /// List objects whose key starts with `prefix`. An empty prefix lists
    /// the entire namespace.
    fn list_objects(&self, prefix: &str) -> Result<Vec<Blob>>;

    /// Resolve metadata for an exact key, or `None` if absent.
    fn get_blob(&self, key: &str) -> Result<Option<Blob>>;

    /// Fetch a small text object's content.
    fn get_blob_content_as_string(&self, key: &str) -> Result<String>;

    /// Write an object.
    fn put_object(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Delete an object. Deleting an absent key succeeds.
    fn delete_object(&self, key: &str) -> Result<()>;
}

/// Supported storage providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Local,
    S3,
    Gcs,
}

impl Provider {
    /// Parse a configured provider identifier.
    ///
    /// Region-qualified S3 identifiers (`s3_us_west_2`) resolve to the S3
    /// provider, matching how deployments name region-pinned buckets.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Provider::Local),
            "gcs" | "google_storage" => Ok(Provider::Gcs),
            s3 if s3 == "s3" || s3.starts_with("s3_") => Ok(Provider::S3),
            other => Err(StorageError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Connection parameters for building a [`BlobStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Provider identifier: `local`, `s3` (or `s3_<region>`), `gcs`.
    pub provider: String,
    /// Bucket name (S3/GCS).
    #[serde(default)]
    pub bucket: Option<String>,
    /// Root path inside the bucket, or the base directory for `local`.
    #[serde(default)]
    pub root: Option<String>,
    /// S3 region.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom S3 endpoint (MinIO, etc.).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Path to a GCS service-account credential file.
    #[serde(default)]
    pub credential_path: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl StorageConfig {
    fn bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| StorageError::Config(format!("provider '{}' needs a bucket", self.provider)))
    }

    fn root(&self) -> &str {
        self.root.as_deref().unwrap_or("/")
    }
}

/// Build a blob store from connection parameters.
///
/// Construction is retried on transient failures with capped exponential
/// backoff: provider clients may perform network calls (credential
/// validation) while being built. An unrecognized provider fails fast.
pub fn store_from_config(cfg: &StorageConfig) -> Result<Box<dyn BlobStore>> {
    let provider = Provider::parse(&cfg.provider)?;
    retry_transient(&cfg.retry, "storage connect", || match provider {
        Provider::Local => Ok(Box::new(OpendalStore::local(cfg.root())?) as Box<dyn BlobStore>),
        Provider::S3 => Ok(Box::new(OpendalStore::s3(
            cfg.bucket()?,
            cfg.region.as_deref().unwrap_or("us-east-1"),
            cfg.root(),
            cfg.endpoint.as_deref(),
            cfg.access_key_id.as_deref(),
            cfg.secret_access_key.as_deref(),
        )?) as Box<dyn BlobStore>),
        Provider::Gcs => Ok(Box::new(OpendalStore::gcs(
            cfg.bucket()?,
            cfg.root(),
            cfg.credential_path.as_deref(),
        )?) as Box<dyn BlobStore>),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_identifiers() {
        assert_eq!(Provider::parse("local").unwrap(), Provider::Local);
        assert_eq!(Provider::parse("s3").unwrap(), Provider::S3);
        assert_eq!(Provider::parse("s3_eu_central_1").unwrap(), Provider::S3);
        assert_eq!(Provider::parse("gcs").unwrap(), Provider::Gcs);
        assert_eq!(Provider::parse("google_storage").unwrap(), Provider::Gcs);
    }

    #[test]
    fn unknown_provider_fails_fast() {
        let err = Provider::parse("ftp").unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedProvider(p) if p == "ftp"));
    }

    #[test]
    fn s3_without_bucket_is_a_config_error() {
        let cfg = StorageConfig {
            provider: "s3".into(),
            bucket: None,
            root: None,
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            credential_path: None,
            retry: RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            },
        };
        assert!(matches!(
            store_from_config(&cfg),
            Err(StorageError::Config(_))
        ));
    }
}
