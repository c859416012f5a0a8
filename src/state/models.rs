use serde::{Deserialize, Serialize};

/// Summary row for a stored resource state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: String,
    pub provisioner: String,
    pub revision: u64,
    pub created_at: String,
    pub updated_at: String,
}

/// One line from a resource's progress log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLogEntry {
    pub seq: i64,
    pub state_id: String,
    pub message: String,
    pub created_at: String,
}
