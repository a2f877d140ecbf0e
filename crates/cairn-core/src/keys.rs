//! Key grammar for the backup index and data namespaces.
//!
//! The layout is a wire contract shared with every other tool that reads or
//! writes the same bucket:
//!
//! ```text
//! index/backup_index/<backup_name>/tokenmap_<node_id>.json
//! index/backup_index/<backup_name>/schema_<node_id>.cql
//! index/backup_index/<backup_name>/manifest_<node_id>.json
//! index/backup_index/<backup_name>/differential_<node_id>
//! index/backup_index/<backup_name>/started_<node_id>_<unix_ts>.timestamp
//! index/backup_index/<backup_name>/finished_<node_id>_<unix_ts>.timestamp
//! index/latest_backup/<node_id>/backup_name.txt
//! <node_id>/<backup_name>/meta/<kind>
//! ```
//!
//! `incremental` is a legacy synonym for `differential` and is still
//! accepted everywhere a differential marker is read.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CairnError, Result};

/// Prefix of the backup index namespace.
pub const INDEX_PREFIX: &str = "index/backup_index";

/// Prefix of the latest-backup pointer namespace.
pub const LATEST_BACKUP_PREFIX: &str = "index/latest_backup";

/// Folder segment that marks a backup's metadata blobs in the data
/// namespace.
pub const META_FOLDER: &str = "meta";

/// Matches any index entry and captures its kind and owner segment.
/// The owner capture may still carry an extension.
static INDEX_ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*(tokenmap|schema|manifest|differential|incremental)_(.*)$")
        .expect("valid static regex")
});

/// Matches timestamped index entries. Structurally a superset of what
/// [`INDEX_ENTRY_PATTERN`] accepts, so it must be tried first: otherwise a
/// node id could be mis-parsed out of the timestamp suffix.
static TIMESTAMPED_ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*(started|finished)_(.*)_([0-9]+)\.timestamp$").expect("valid static regex")
});

/// Kinds of per-node index entries without a timestamp suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Tokenmap,
    Schema,
    Manifest,
    Differential,
    /// Legacy synonym for [`EntryKind::Differential`].
    Incremental,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Tokenmap => "tokenmap",
            EntryKind::Schema => "schema",
            EntryKind::Manifest => "manifest",
            EntryKind::Differential => "differential",
            EntryKind::Incremental => "incremental",
        }
    }

    /// Extension carried by this kind's index entry. Extensions are
    /// decorative; they are stripped when recovering the node id.
    pub fn index_extension(self) -> &'static str {
        match self {
            EntryKind::Tokenmap | EntryKind::Manifest => ".json",
            EntryKind::Schema => ".cql",
            EntryKind::Differential | EntryKind::Incremental => "",
        }
    }
}

/// Kinds of timestamped index entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Started,
    Finished,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Started => "started",
            EventKind::Finished => "finished",
        }
    }
}

/// Key of a plain index entry.
pub fn index_entry_key(backup_name: &str, kind: EntryKind, node_id: &str) -> String {
    format!(
        "{INDEX_PREFIX}/{backup_name}/{}_{node_id}{}",
        kind.as_str(),
        kind.index_extension()
    )
}

/// Key of a timestamped index entry.
pub fn index_timestamp_key(
    backup_name: &str,
    event: EventKind,
    node_id: &str,
    timestamp: i64,
) -> String {
    format!(
        "{INDEX_PREFIX}/{backup_name}/{}_{node_id}_{timestamp}.timestamp",
        event.as_str()
    )
}

/// Key of the pointer object holding a node's most recent backup name.
pub fn latest_backup_pointer_key(node_id: &str) -> String {
    format!("{LATEST_BACKUP_PREFIX}/{node_id}/backup_name.txt")
}

/// Prefix under which all latest-backup markers for a node live.
pub fn latest_backup_dir(node_id: &str) -> String {
    format!("{LATEST_BACKUP_PREFIX}/{node_id}/")
}

/// Key of a metadata blob in the data namespace.
pub fn meta_key(node_id: &str, backup_name: &str, kind: EntryKind) -> String {
    format!("{node_id}/{backup_name}/{META_FOLDER}/{}", kind.as_str())
}

/// Recover the owning node id from an index entry key.
///
/// The timestamp pattern is tried first; see [`TIMESTAMPED_ENTRY_PATTERN`].
/// Fails with [`CairnError::MalformedKey`] when neither pattern matches,
/// which indicates corruption of the index namespace.
pub fn decode_owner(key: &str) -> Result<String> {
    let owner = TIMESTAMPED_ENTRY_PATTERN
        .captures(key)
        .or_else(|| INDEX_ENTRY_PATTERN.captures(key))
        .map(|caps| caps[2].to_string())
        .ok_or_else(|| CairnError::MalformedKey(key.to_string()))?;
    Ok(strip_extension(&owner))
}

/// Recover the unix-seconds timestamp from a timestamped index entry key.
pub fn decode_timestamp(key: &str) -> Result<i64> {
    let caps = TIMESTAMPED_ENTRY_PATTERN
        .captures(key)
        .ok_or_else(|| CairnError::MalformedKey(key.to_string()))?;
    caps[3]
        .parse()
        .map_err(|_| CairnError::MalformedKey(key.to_string()))
}

/// Recover the backup name from an index entry key
/// (`index/backup_index/<backup_name>/...`).
pub fn decode_backup_name(key: &str) -> Result<String> {
    let mut parts = key.split('/');
    if (parts.next(), parts.next()) != (Some("index"), Some("backup_index")) {
        return Err(CairnError::MalformedKey(key.to_string()));
    }
    match (parts.next(), parts.next()) {
        (Some(name), Some(_)) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(CairnError::MalformedKey(key.to_string())),
    }
}

/// Recover `(node_id, backup_name)` from a data-namespace key
/// (`<node_id>/<backup_name>/...`).
pub fn decode_data_owner(key: &str) -> Result<(String, String)> {
    let mut parts = key.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(node), Some(name), Some(_)) if !node.is_empty() && !name.is_empty() => {
            Ok((node.to_string(), name.to_string()))
        }
        _ => Err(CairnError::MalformedKey(key.to_string())),
    }
}

/// Strip known decorative extensions from a captured owner segment.
pub fn strip_extension(owner: &str) -> String {
    let mut r = owner.to_string();
    for ext in [".json", ".cql", ".txt", ".timestamp"] {
        r = r.replace(ext, "");
    }
    r
}
