use serde::{Deserialize, Serialize};

use cairn_storage::{RetryConfig, StorageConfig};

/// Connection settings for a backup catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Provider identifier: `local`, `s3` (or `s3_<region>`), `gcs`.
    pub provider: String,
    /// Bucket name (S3/GCS).
    #[serde(default)]
    pub bucket: Option<String>,
    /// Key prefix inside the bucket, or the base directory for `local`.
    #[serde(default)]
    pub root: Option<String>,
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

/// Convert a [`CatalogConfig`] into a [`StorageConfig`] for backend
/// construction.
pub fn storage_config_from_catalog(cfg: &CatalogConfig) -> StorageConfig {
    StorageConfig {
        provider: cfg.provider.clone(),
        bucket: cfg.bucket.clone(),
        root: cfg.root.clone(),
        region: cfg.region.clone(),
        endpoint: cfg.endpoint.clone(),
        access_key_id: cfg.access_key_id.clone(),
        secret_access_key: cfg.secret_access_key.clone(),
        credential_path: cfg.credential_path.clone(),
        retry: cfg.retry.clone(),
    }
}
