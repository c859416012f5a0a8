use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{CloudResult, Endpoint, SubnetGroupApi, Tag};

pub const NETWORK_TYPE_IPV4: &str = "ipv4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitEncryptionMode {
    Preferred,
    Required,
}

impl FromStr for TransitEncryptionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preferred" => Ok(TransitEncryptionMode::Preferred),
            "required" => Ok(TransitEncryptionMode::Required),
            other => Err(format!(
                "'{}' must be one of: preferred, required",
                other
            )),
        }
    }
}

impl fmt::Display for TransitEncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitEncryptionMode::Preferred => write!(f, "preferred"),
            TransitEncryptionMode::Required => write!(f, "required"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeGroup {
    pub id: String,
    pub members: Vec<String>,
    pub primary_endpoint: Option<Endpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationGroup {
    pub id: String,
    pub arn: String,
    pub description: Option<String>,
    pub status: String,
    pub node_groups: Vec<NodeGroup>,
    pub at_rest_encryption_enabled: Option<bool>,
    pub auth_token_enabled: Option<bool>,
    pub auto_minor_version_upgrade: Option<bool>,
    /// `enabled`, `enabling`, `disabled` or `disabling`.
    pub automatic_failover: Option<String>,
    pub cache_node_type: Option<String>,
    pub transit_encryption_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNode {
    pub id: String,
    pub create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheCluster {
    pub id: String,
    pub arn: String,
    pub status: String,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub cache_node_type: Option<String>,
    pub num_cache_nodes: i32,
    pub cache_nodes: Vec<CacheNode>,
    pub configuration_endpoint: Option<Endpoint>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub transit_encryption_enabled: Option<bool>,
    pub cache_subnet_group_name: Option<String>,
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateReplicationGroupRequest {
    pub replication_group_id: String,
    pub description: String,
    pub at_rest_encryption_enabled: Option<bool>,
    pub auth_token: Option<String>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub automatic_failover_enabled: Option<bool>,
    pub cache_node_type: Option<String>,
    pub cache_parameter_group_name: Option<String>,
    pub cache_subnet_group_name: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub network_type: String,
    pub num_cache_clusters: Option<i32>,
    pub port: Option<i32>,
    pub security_group_ids: Vec<String>,
    pub transit_encryption_enabled: Option<bool>,
    pub transit_encryption_mode: Option<TransitEncryptionMode>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyReplicationGroupRequest {
    pub replication_group_id: String,
    pub apply_immediately: bool,
    pub description: Option<String>,
    pub auth_token: Option<String>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub automatic_failover_enabled: Option<bool>,
    pub cache_node_type: Option<String>,
    pub cache_parameter_group_name: Option<String>,
    pub engine_version: Option<String>,
    pub security_group_ids: Vec<String>,
    pub transit_encryption_enabled: Option<bool>,
    pub transit_encryption_mode: Option<TransitEncryptionMode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaCountRequest {
    pub replication_group_id: String,
    pub new_replica_count: i32,
    pub apply_immediately: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateCacheClusterRequest {
    pub cache_cluster_id: String,
    pub auto_minor_version_upgrade: Option<bool>,
    pub cache_node_type: Option<String>,
    pub cache_parameter_group_name: Option<String>,
    pub cache_subnet_group_name: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub network_type: String,
    pub num_cache_nodes: Option<i32>,
    pub port: Option<i32>,
    pub security_group_ids: Vec<String>,
    pub transit_encryption_enabled: Option<bool>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyCacheClusterRequest {
    pub cache_cluster_id: String,
    pub apply_immediately: bool,
    pub auto_minor_version_upgrade: Option<bool>,
    pub cache_node_type: Option<String>,
    pub cache_parameter_group_name: Option<String>,
    pub engine_version: Option<String>,
    pub num_cache_nodes: Option<i32>,
    pub cache_node_ids_to_remove: Vec<String>,
    pub security_group_ids: Vec<String>,
}

/// Managed cache service calls.
#[async_trait]
pub trait CacheApi: SubnetGroupApi {
    async fn describe_replication_group(&self, id: &str) -> CloudResult<ReplicationGroup>;

    async fn create_replication_group(
        &self,
        req: CreateReplicationGroupRequest,
    ) -> CloudResult<ReplicationGroup>;

    async fn modify_replication_group(
        &self,
        req: ModifyReplicationGroupRequest,
    ) -> CloudResult<ReplicationGroup>;

    async fn increase_replica_count(&self, req: ReplicaCountRequest) -> CloudResult<()>;

    async fn decrease_replica_count(&self, req: ReplicaCountRequest) -> CloudResult<()>;

    /// A final snapshot is taken when `final_snapshot_identifier` is set.
    async fn delete_replication_group(
        &self,
        id: &str,
        final_snapshot_identifier: Option<&str>,
    ) -> CloudResult<()>;

    async fn describe_cache_cluster(&self, id: &str) -> CloudResult<CacheCluster>;

    async fn create_cache_cluster(&self, req: CreateCacheClusterRequest)
        -> CloudResult<CacheCluster>;

    async fn modify_cache_cluster(&self, req: ModifyCacheClusterRequest)
        -> CloudResult<CacheCluster>;

    async fn delete_cache_cluster(&self, id: &str) -> CloudResult<()>;

    async fn list_tags_for_resource(&self, arn: &str) -> CloudResult<Vec<Tag>>;
}
