use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One file within a node backup's manifest.
///
/// Immutable data, not live storage state: the described object may have
/// been deleted since the manifest was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestObject {
    pub path: String,
    pub size: u64,
    /// Content checksum. Serialized as `MD5` for compatibility with
    /// manifests written by other tooling against the same bucket.
    #[serde(rename = "MD5")]
    pub checksum: String,
}

/// Parse a manifest blob's content (a JSON array of objects).
pub fn parse_manifest(content: &str) -> Result<Vec<ManifestObject>> {
    Ok(serde_json::from_str(content)?)
}

/// Render a byte count as a human-readable size.
pub fn format_bytes(value: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut unit_shift = UNITS.len() - 1;
    for i in 0..UNITS.len() {
        if value >> (i * 10) < 1024 {
            unit_shift = i;
            break;
        }
    }
    format!(
        "{:.2} {}",
        value as f64 / (1u64 << (unit_shift * 10)) as f64,
        UNITS[unit_shift]
    )
}
