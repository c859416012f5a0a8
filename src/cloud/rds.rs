use async_trait::async_trait;

use super::{CloudResult, Endpoint, SubnetGroupApi, Tag};

/// Observed state of a database instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbInstance {
    pub identifier: String,
    pub status: String,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub db_instance_class: Option<String>,
    pub db_name: Option<String>,
    pub master_username: Option<String>,
    pub allocated_storage: Option<i32>,
    pub storage_type: Option<String>,
    pub iops: Option<i32>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub backup_retention_period: Option<i32>,
    pub db_parameter_group_names: Vec<String>,
    pub db_subnet_group_name: Option<String>,
    pub deletion_protection: Option<bool>,
    pub multi_az: Option<bool>,
    pub endpoint: Option<Endpoint>,
    pub preferred_backup_window: Option<String>,
    pub preferred_maintenance_window: Option<String>,
    pub publicly_accessible: Option<bool>,
    pub storage_encrypted: Option<bool>,
    pub vpc_security_group_ids: Vec<String>,
    pub read_replica_source: Option<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDbInstanceRequest {
    pub db_instance_identifier: String,
    pub db_instance_class: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub db_name: Option<String>,
    pub master_username: Option<String>,
    pub master_user_password: Option<String>,
    pub allocated_storage: Option<i32>,
    pub storage_type: Option<String>,
    pub iops: Option<i32>,
    pub port: Option<i32>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub backup_retention_period: Option<i32>,
    pub db_parameter_group_name: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub deletion_protection: Option<bool>,
    pub multi_az: Option<bool>,
    pub preferred_backup_window: Option<String>,
    pub preferred_maintenance_window: Option<String>,
    pub publicly_accessible: Option<bool>,
    pub storage_encrypted: Option<bool>,
    pub vpc_security_group_ids: Vec<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDbInstanceReadReplicaRequest {
    pub db_instance_identifier: String,
    pub source_db_instance_identifier: String,
    pub db_instance_class: Option<String>,
    pub allocated_storage: Option<i32>,
    pub storage_type: Option<String>,
    pub iops: Option<i32>,
    pub port: Option<i32>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub db_parameter_group_name: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub deletion_protection: Option<bool>,
    pub multi_az: Option<bool>,
    pub publicly_accessible: Option<bool>,
    pub vpc_security_group_ids: Vec<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreDbInstanceFromSnapshotRequest {
    pub db_instance_identifier: String,
    pub db_snapshot_identifier: String,
    pub db_instance_class: Option<String>,
    pub engine: Option<String>,
    pub db_name: Option<String>,
    pub allocated_storage: Option<i32>,
    pub storage_type: Option<String>,
    pub iops: Option<i32>,
    pub port: Option<i32>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub backup_retention_period: Option<i32>,
    pub db_parameter_group_name: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub deletion_protection: Option<bool>,
    pub multi_az: Option<bool>,
    pub publicly_accessible: Option<bool>,
    pub vpc_security_group_ids: Vec<String>,
    pub tags: Vec<Tag>,
}

/// Only populated fields are sent to the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyDbInstanceRequest {
    pub db_instance_identifier: String,
    pub apply_immediately: bool,
    pub allow_major_version_upgrade: Option<bool>,
    pub db_instance_class: Option<String>,
    pub engine_version: Option<String>,
    pub master_user_password: Option<String>,
    pub allocated_storage: Option<i32>,
    pub storage_type: Option<String>,
    pub iops: Option<i32>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub backup_retention_period: Option<i32>,
    pub db_parameter_group_name: Option<String>,
    pub deletion_protection: Option<bool>,
    pub multi_az: Option<bool>,
    pub preferred_backup_window: Option<String>,
    pub preferred_maintenance_window: Option<String>,
    pub publicly_accessible: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteDbInstanceRequest {
    pub db_instance_identifier: String,
    pub skip_final_snapshot: bool,
    pub final_db_snapshot_identifier: Option<String>,
}

/// Relational database service calls.
#[async_trait]
pub trait DatabaseApi: SubnetGroupApi {
    /// Fails with [`super::CloudError::NotFound`] when the instance is gone.
    async fn describe_db_instance(&self, identifier: &str) -> CloudResult<DbInstance>;

    async fn create_db_instance(&self, req: CreateDbInstanceRequest) -> CloudResult<DbInstance>;

    async fn create_db_instance_read_replica(
        &self,
        req: CreateDbInstanceReadReplicaRequest,
    ) -> CloudResult<DbInstance>;

    async fn restore_db_instance_from_snapshot(
        &self,
        req: RestoreDbInstanceFromSnapshotRequest,
    ) -> CloudResult<DbInstance>;

    async fn modify_db_instance(&self, req: ModifyDbInstanceRequest) -> CloudResult<DbInstance>;

    async fn delete_db_instance(&self, req: DeleteDbInstanceRequest) -> CloudResult<()>;
}
