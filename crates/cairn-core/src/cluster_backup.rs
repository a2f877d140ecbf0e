use chrono::{DateTime, Utc};

use crate::node_backup::NodeBackup;

/// The union of node backups sharing one backup name: a cluster-wide
/// backup attempt. Owns its members for the duration of the query and
/// performs no storage calls itself.
#[derive(Debug)]
pub struct ClusterBackup {
    name: String,
    node_backups: Vec<NodeBackup>,
}

impl ClusterBackup {
    pub fn new(name: String, node_backups: Vec<NodeBackup>) -> Self {
        Self { name, node_backups }
    }

    pub(crate) fn push(&mut self, node_backup: NodeBackup) {
        self.node_backups.push(node_backup);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_backups(&self) -> &[NodeBackup] {
        &self.node_backups
    }

    /// Cluster backup start is pessimistic: the earliest member start.
    pub fn started(&self) -> Option<i64> {
        self.node_backups.iter().filter_map(|nb| nb.started()).min()
    }

    /// Cluster backup finish is the latest member finish, present only
    /// once every member reports one.
    pub fn finished(&self) -> Option<i64> {
        if !self.is_complete() {
            return None;
        }
        self.node_backups.iter().filter_map(|nb| nb.finished()).max()
    }

    /// A cluster backup is complete iff every member finished.
    pub fn is_complete(&self) -> bool {
        !self.node_backups.is_empty() && self.node_backups.iter().all(|nb| nb.finished().is_some())
    }

    /// Members that never reported a finish marker.
    pub fn unfinished_nodes(&self) -> Vec<&str> {
        self.node_backups
            .iter()
            .filter(|nb| nb.finished().is_none())
            .map(|nb| nb.node_id())
            .collect()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started().and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished().and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}
