use async_trait::async_trait;

use super::{CloudResult, Tag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub vpc_id: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub protocol: String,
    pub from_port: i32,
    pub to_port: i32,
    pub cidr: String,
    pub description: String,
}

impl IngressRule {
    /// TCP access to a single port from one CIDR block.
    pub fn tcp(port: i32, cidr: &str, description: &str) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr: cidr.to_string(),
            description: description.to_string(),
        }
    }
}

/// VPC and security group calls.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    async fn vpc_cidr(&self, vpc_id: &str) -> CloudResult<String>;

    /// Security groups carrying every tag in `tags`.
    async fn find_security_groups_by_tags(&self, tags: &[Tag]) -> CloudResult<Vec<SecurityGroup>>;

    /// Returns the new group id.
    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: &str,
        tags: &[Tag],
    ) -> CloudResult<String>;

    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> CloudResult<()>;

    async fn delete_security_group(&self, group_id: &str) -> CloudResult<()>;
}
