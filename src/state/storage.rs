use async_trait::async_trait;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("state not found: {0}")]
    NotFound(String),

    #[error("revision conflict for {id}: expected {expected}, found {found}")]
    Conflict { id: String, expected: u64, found: u64 },

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Durable persistence for one state blob per resource id plus an
/// append-only log sink.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Store `data` for `id` if the stored revision still equals
    /// `expected_revision` (an absent row counts as revision 0). The stored
    /// revision becomes `expected_revision + 1`.
    async fn save_state(
        &self,
        id: &str,
        data: &[u8],
        provisioner: &str,
        expected_revision: u64,
    ) -> StorageResult<()>;

    /// Fetch the blob for `id`, failing with [`StorageError::NotFound`].
    async fn get_state(&self, id: &str) -> StorageResult<Vec<u8>>;

    async fn send_state_log(&self, id: &str, message: &str) -> StorageResult<()>;

    /// Remove the blob for `id`. Removing an absent id is not an error.
    async fn delete_state(&self, id: &str) -> StorageResult<()>;
}
