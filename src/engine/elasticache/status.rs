//! Replication group and cache cluster status tables.

pub const REPLICATION_GROUP_PENDING: &[&str] = &["creating", "modifying", "snapshotting"];

pub const CACHE_CLUSTER_PENDING: &[&str] = &[
    "creating",
    "modifying",
    "snapshotting",
    "rebooting cluster nodes",
];

pub const DELETE_PENDING: &[&str] = &[
    "available",
    "creating",
    "deleting",
    "modifying",
    "snapshotting",
    "create-failed",
];

pub const AVAILABLE: &[&str] = &["available"];

/// Deletion waits for the resource to disappear.
pub const DELETED: &[&str] = &[];

pub fn is_available(status: &str) -> bool {
    AVAILABLE.contains(&status)
}
