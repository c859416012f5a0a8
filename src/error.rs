//! Error types for the provisioning engine.

use std::time::Duration;

use thiserror::Error;

use crate::cloud::CloudError;
use crate::state::storage::StorageError;

/// Result type alias for engine operations.
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

/// Coarse classification of a [`ProvisionError`], so callers can branch on
/// the kind of failure instead of matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    Conflict,
    Cloud,
    Timeout,
    Persistence,
    Rollback,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{key} parameter value is required")]
    MissingRequired { key: String },

    #[error("invalid default for parameter {key}: {reason}")]
    InvalidDefault { key: String, reason: String },

    #[error("immutable parameter value modification not allowed: {key}")]
    ImmutableParameter { key: String },

    #[error("param '{key}' is not allowed or supported")]
    UnsupportedParameter { key: String },

    #[error("failed to parse parameter {key}: {reason}")]
    ParseError { key: String, reason: String },

    #[error("invalid value in the parameter '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already found saved state for this id: {0}")]
    AlreadyProvisioned(String),

    #[error("parameter is already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("state is already locked for reason: {0}")]
    Locked(String),

    #[error("engine '{0}' is not supported")]
    UnsupportedEngine(String),

    #[error("{resource} exists but is not owned by {owner}")]
    NotOwned { resource: String, owner: String },

    #[error("timed out after {timeout:?} waiting for {identifier}")]
    Timeout {
        identifier: String,
        timeout: Duration,
    },

    #[error("state {id} was modified concurrently (expected revision {expected}, found {found})")]
    Conflict { id: String, expected: u64, found: u64 },

    #[error("{operation} failed: {source}")]
    Cloud {
        operation: String,
        #[source]
        source: CloudError,
    },

    #[error("state storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{source}; rollback incomplete: {}", .failures.join("; "))]
    RollbackFailed {
        #[source]
        source: Box<ProvisionError>,
        failures: Vec<String>,
    },

    #[error("teardown of {id} incomplete: {}", .failures.join("; "))]
    TeardownFailed { id: String, failures: Vec<String> },
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingRequired { .. }
            | Self::InvalidDefault { .. }
            | Self::ImmutableParameter { .. }
            | Self::UnsupportedParameter { .. }
            | Self::ParseError { .. }
            | Self::InvalidValue { .. }
            | Self::AlreadyInitialized(_)
            | Self::Locked(_)
            | Self::UnsupportedEngine(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyProvisioned(_) | Self::NotOwned { .. } => ErrorKind::AlreadyExists,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Cloud { source, .. } => match source {
                CloudError::NotFound(_) => ErrorKind::NotFound,
                CloudError::Api { .. } => ErrorKind::Cloud,
            },
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Storage(_) | Self::Serialization(_) => ErrorKind::Persistence,
            Self::RollbackFailed { .. } | Self::TeardownFailed { .. } => ErrorKind::Rollback,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn missing(key: &str) -> Self {
        Self::MissingRequired {
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<StorageError> for ProvisionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => Self::NotFound(format!("state for id {}", id)),
            StorageError::Conflict {
                id,
                expected,
                found,
            } => Self::Conflict {
                id,
                expected,
                found,
            },
            other => Self::Storage(other),
        }
    }
}

/// Treats an absent parameter like an empty one.
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for Result<Option<T>> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Err(e) if e.is_not_found() => Ok(None),
            other => other,
        }
    }
}
