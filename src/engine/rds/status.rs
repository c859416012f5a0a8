//! Database instance status tables.

pub const CREATE_PENDING: &[&str] = &[
    "backing-up",
    "configuring-enhanced-monitoring",
    "configuring-iam-database-auth",
    "configuring-log-exports",
    "creating",
    "maintenance",
    "modifying",
    "rebooting",
    "renaming",
    "resetting-master-credentials",
    "starting",
    "stopping",
    "upgrading",
];

pub const UPDATE_PENDING: &[&str] = &[
    "backing-up",
    "configuring-enhanced-monitoring",
    "configuring-iam-database-auth",
    "configuring-log-exports",
    "creating",
    "maintenance",
    "modifying",
    "moving-to-vpc",
    "rebooting",
    "renaming",
    "resetting-master-credentials",
    "starting",
    "stopping",
    "storage-full",
    "upgrading",
];

pub const DELETE_PENDING: &[&str] = &[
    "available",
    "backing-up",
    "configuring-enhanced-monitoring",
    "configuring-log-exports",
    "creating",
    "deleting",
    "incompatible-parameters",
    "modifying",
    "starting",
    "stopping",
    "storage-full",
    "storage-optimization",
];

pub const AVAILABLE: &[&str] = &["available", "storage-optimization"];

/// Waiting for deletion has no target status: the instance must disappear.
pub const DELETED: &[&str] = &[];

pub fn is_available(status: &str) -> bool {
    AVAILABLE.contains(&status)
}
