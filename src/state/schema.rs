//! SQL DDL for the provisioner state database.
//!
//! One row per provisioned resource id holding the serialized state blob and
//! its revision, plus an append-only log table.

pub const SCHEMA_VERSION: i32 = 1;

pub const CREATE_TABLES_SQL: &str = "
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL,
    description TEXT
);

-- Provisioned resource states
CREATE TABLE IF NOT EXISTS provisioner_states (
    id TEXT PRIMARY KEY,
    provisioner TEXT NOT NULL,
    revision INTEGER NOT NULL,
    data BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Progress log lines
CREATE TABLE IF NOT EXISTS provisioner_state_logs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    state_id TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

pub const CREATE_INDEXES_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_states_provisioner ON provisioner_states(provisioner);
CREATE INDEX IF NOT EXISTS idx_state_logs_state ON provisioner_state_logs(state_id, seq);
";
