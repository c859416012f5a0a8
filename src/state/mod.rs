pub mod data;
pub mod models;
pub mod schema;
pub mod sqlite;
pub mod storage;

pub use data::{StateData, StateStatus};
pub use storage::{StateStorage, StorageError};
