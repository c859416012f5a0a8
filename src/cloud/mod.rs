//! Interfaces to the cloud provider APIs the engine drives.
//!
//! The concrete SDK bindings live outside this crate; the engine only
//! depends on these traits and the plain request/response types below.

pub mod elasticache;
pub mod network;
pub mod rds;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ProvisionError;

pub use elasticache::CacheApi;
pub use network::NetworkApi;
pub use rds::DatabaseApi;

pub type CloudResult<T> = Result<T, CloudError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{code}: {message}")]
    Api { code: String, message: String },
}

impl CloudError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Api {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Attach the name of the failed call to a cloud error.
pub trait CloudResultExt<T> {
    fn during(self, operation: &str) -> crate::error::Result<T>;
}

impl<T> CloudResultExt<T> for CloudResult<T> {
    fn during(self, operation: &str) -> crate::error::Result<T> {
        self.map_err(|source| ProvisionError::Cloud {
            operation: operation.to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// True when the ownership tag `key` carries exactly `id`.
pub fn is_owned_by(tags: &[Tag], key: &str, id: &str) -> bool {
    tags.iter().any(|t| t.key == key && t.value == id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubnetGroup {
    pub name: String,
    pub subnet_ids: Vec<String>,
    pub tags: Vec<Tag>,
}

/// Subnet group calls shared by the database and cache services.
#[async_trait]
pub trait SubnetGroupApi: Send + Sync {
    /// Fails with [`CloudError::NotFound`] when no group has that name.
    async fn describe_subnet_group(&self, name: &str) -> CloudResult<SubnetGroup>;

    async fn create_subnet_group(
        &self,
        name: &str,
        description: &str,
        subnet_ids: &[String],
        tags: &[Tag],
    ) -> CloudResult<SubnetGroup>;

    async fn delete_subnet_group(&self, name: &str) -> CloudResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_requires_exact_tag_value() {
        let tags = vec![Tag::new("provisioner-rds", "app-db"), Tag::new("env", "prod")];
        assert!(is_owned_by(&tags, "provisioner-rds", "app-db"));
        assert!(!is_owned_by(&tags, "provisioner-rds", "app-db-2"));
        assert!(!is_owned_by(&tags, "provisioner-elasticache", "app-db"));
    }

    #[test]
    fn not_found_cloud_errors_are_classified() {
        let err = Err::<(), _>(CloudError::NotFound("db".into()))
            .during("describe db instance")
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "describe db instance failed: not found: db");

        let err = Err::<(), _>(CloudError::api("Throttling", "slow down"))
            .during("create db instance")
            .unwrap_err();
        assert!(!err.is_not_found());
    }
}
