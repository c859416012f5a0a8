//! Translation between stored parameters and database API shapes.

use crate::cloud::rds::{
    CreateDbInstanceReadReplicaRequest, CreateDbInstanceRequest, DbInstance,
    DeleteDbInstanceRequest, ModifyDbInstanceRequest, RestoreDbInstanceFromSnapshotRequest,
};
use crate::cloud::Tag;
use crate::error::Result;
use crate::state::StateData;

use super::super::{Changed, Fields};
use super::params::*;

pub fn create_request(state: &StateData, tags: Vec<Tag>) -> Result<CreateDbInstanceRequest> {
    let f = Fields(state);
    Ok(CreateDbInstanceRequest {
        db_instance_identifier: f.required(DB_INSTANCE_IDENTIFIER)?,
        db_instance_class: f.string(DB_INSTANCE_CLASS),
        engine: f.string(ENGINE),
        engine_version: f.string(ENGINE_VERSION),
        db_name: f.string(DB_NAME),
        master_username: f.string(MASTER_USERNAME),
        master_user_password: f.string(MASTER_USER_PASSWORD),
        allocated_storage: f.int(ALLOCATED_STORAGE)?,
        storage_type: f.string(STORAGE_TYPE),
        iops: f.int(IOPS)?,
        port: f.int(PORT)?,
        auto_minor_version_upgrade: f.boolean(AUTO_MINOR_VERSION_UPGRADE)?,
        backup_retention_period: f.int(BACKUP_RETENTION_PERIOD)?,
        db_parameter_group_name: f.string(DB_PARAMETER_GROUP_NAME),
        db_subnet_group_name: f.string(DB_SUBNET_GROUP_NAME),
        deletion_protection: f.boolean(DELETION_PROTECTION)?,
        multi_az: f.boolean(MULTI_AZ)?,
        preferred_backup_window: f.string(PREFERRED_BACKUP_WINDOW),
        preferred_maintenance_window: f.string(PREFERRED_MAINTENANCE_WINDOW),
        publicly_accessible: f.boolean(PUBLICLY_ACCESSIBLE)?,
        storage_encrypted: f.boolean(STORAGE_ENCRYPTED)?,
        vpc_security_group_ids: f.list(VPC_SECURITY_GROUPS)?,
        tags,
    })
}

pub fn read_replica_request(
    state: &StateData,
    tags: Vec<Tag>,
) -> Result<CreateDbInstanceReadReplicaRequest> {
    let f = Fields(state);
    Ok(CreateDbInstanceReadReplicaRequest {
        db_instance_identifier: f.required(DB_INSTANCE_IDENTIFIER)?,
        source_db_instance_identifier: f.required(SOURCE_DB_INSTANCE_IDENTIFIER)?,
        db_instance_class: f.string(DB_INSTANCE_CLASS),
        allocated_storage: f.int(ALLOCATED_STORAGE)?,
        storage_type: f.string(STORAGE_TYPE),
        iops: f.int(IOPS)?,
        port: f.int(PORT)?,
        auto_minor_version_upgrade: f.boolean(AUTO_MINOR_VERSION_UPGRADE)?,
        db_parameter_group_name: f.string(DB_PARAMETER_GROUP_NAME),
        db_subnet_group_name: f.string(DB_SUBNET_GROUP_NAME),
        deletion_protection: f.boolean(DELETION_PROTECTION)?,
        multi_az: f.boolean(MULTI_AZ)?,
        publicly_accessible: f.boolean(PUBLICLY_ACCESSIBLE)?,
        vpc_security_group_ids: f.list(VPC_SECURITY_GROUPS)?,
        tags,
    })
}

pub fn restore_request(
    state: &StateData,
    tags: Vec<Tag>,
) -> Result<RestoreDbInstanceFromSnapshotRequest> {
    let f = Fields(state);
    Ok(RestoreDbInstanceFromSnapshotRequest {
        db_instance_identifier: f.required(DB_INSTANCE_IDENTIFIER)?,
        db_snapshot_identifier: f.required(DB_SNAPSHOT_IDENTIFIER)?,
        db_instance_class: f.string(DB_INSTANCE_CLASS),
        engine: f.string(ENGINE),
        db_name: f.string(DB_NAME),
        allocated_storage: f.int(ALLOCATED_STORAGE)?,
        storage_type: f.string(STORAGE_TYPE),
        iops: f.int(IOPS)?,
        port: f.int(PORT)?,
        auto_minor_version_upgrade: f.boolean(AUTO_MINOR_VERSION_UPGRADE)?,
        backup_retention_period: f.int(BACKUP_RETENTION_PERIOD)?,
        db_parameter_group_name: f.string(DB_PARAMETER_GROUP_NAME),
        db_subnet_group_name: f.string(DB_SUBNET_GROUP_NAME),
        deletion_protection: f.boolean(DELETION_PROTECTION)?,
        multi_az: f.boolean(MULTI_AZ)?,
        publicly_accessible: f.boolean(PUBLICLY_ACCESSIBLE)?,
        vpc_security_group_ids: f.list(VPC_SECURITY_GROUPS)?,
        tags,
    })
}

pub fn modify_request(
    state: &StateData,
    changed: &[String],
    apply_immediately: bool,
) -> Result<ModifyDbInstanceRequest> {
    let c = Changed::new(state, changed, &update_table());

    // A major engine upgrade is refused unless explicitly allowed.
    let allow_major_version_upgrade = if c.keys.contains(ENGINE_VERSION) {
        c.fields.boolean(ALLOW_MAJOR_VERSION_UPGRADE)?
    } else {
        c.boolean(ALLOW_MAJOR_VERSION_UPGRADE)?
    };

    Ok(ModifyDbInstanceRequest {
        db_instance_identifier: c.fields.required(DB_INSTANCE_IDENTIFIER)?,
        apply_immediately,
        allow_major_version_upgrade,
        db_instance_class: c.string(DB_INSTANCE_CLASS),
        engine_version: c.string(ENGINE_VERSION),
        master_user_password: c.string(MASTER_USER_PASSWORD),
        allocated_storage: c.int(ALLOCATED_STORAGE)?,
        storage_type: c.string(STORAGE_TYPE),
        iops: c.int(IOPS)?,
        auto_minor_version_upgrade: c.boolean(AUTO_MINOR_VERSION_UPGRADE)?,
        backup_retention_period: c.int(BACKUP_RETENTION_PERIOD)?,
        db_parameter_group_name: c.string(DB_PARAMETER_GROUP_NAME),
        deletion_protection: c.boolean(DELETION_PROTECTION)?,
        multi_az: c.boolean(MULTI_AZ)?,
        preferred_backup_window: c.string(PREFERRED_BACKUP_WINDOW),
        preferred_maintenance_window: c.string(PREFERRED_MAINTENANCE_WINDOW),
        publicly_accessible: c.boolean(PUBLICLY_ACCESSIBLE)?,
    })
}

/// Replicas are deleted without a snapshot; anything else leaves a
/// timestamped final snapshot behind.
pub fn delete_request(instance: &DbInstance, unix_time: i64) -> DeleteDbInstanceRequest {
    let is_replica = instance
        .read_replica_source
        .as_deref()
        .is_some_and(|s| !s.is_empty());

    if is_replica {
        DeleteDbInstanceRequest {
            db_instance_identifier: instance.identifier.clone(),
            skip_final_snapshot: true,
            final_db_snapshot_identifier: None,
        }
    } else {
        DeleteDbInstanceRequest {
            db_instance_identifier: instance.identifier.clone(),
            skip_final_snapshot: false,
            final_db_snapshot_identifier: Some(format!(
                "{}-final-snapshot-{}",
                instance.identifier, unix_time
            )),
        }
    }
}

fn text<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

/// Record everything the instance reports as imported parameters.
pub fn import_parameters(state: &mut StateData, db: &DbInstance, password: &str) -> Result<()> {
    let table = import_table();
    let fields: Vec<(&str, Option<String>)> = vec![
        (DB_INSTANCE_IDENTIFIER, Some(db.identifier.clone())),
        (ALLOCATED_STORAGE, text(db.allocated_storage)),
        (AUTO_MINOR_VERSION_UPGRADE, text(db.auto_minor_version_upgrade)),
        (BACKUP_RETENTION_PERIOD, text(db.backup_retention_period)),
        (DB_INSTANCE_CLASS, db.db_instance_class.clone()),
        (DB_NAME, db.db_name.clone()),
        (DB_PARAMETER_GROUP_NAME, db.db_parameter_group_names.first().cloned()),
        (DB_SUBNET_GROUP_NAME, db.db_subnet_group_name.clone()),
        (DELETION_PROTECTION, text(db.deletion_protection)),
        (ENGINE, db.engine.clone()),
        (ENGINE_VERSION, db.engine_version.clone()),
        (IOPS, text(db.iops)),
        (MASTER_USERNAME, db.master_username.clone()),
        (MASTER_USER_PASSWORD, Some(password.to_string())),
        (MULTI_AZ, text(db.multi_az)),
        (PORT, text(db.endpoint.as_ref().map(|e| e.port))),
        (PREFERRED_BACKUP_WINDOW, db.preferred_backup_window.clone()),
        (PREFERRED_MAINTENANCE_WINDOW, db.preferred_maintenance_window.clone()),
        (PUBLICLY_ACCESSIBLE, text(db.publicly_accessible)),
        (STORAGE_ENCRYPTED, text(db.storage_encrypted)),
        (STORAGE_TYPE, db.storage_type.clone()),
        (SOURCE_DB_INSTANCE_IDENTIFIER, db.read_replica_source.clone()),
        (
            VPC_SECURITY_GROUPS,
            (!db.vpc_security_group_ids.is_empty()).then(|| db.vpc_security_group_ids.join(",")),
        ),
    ];

    for (key, value) in fields {
        state.add_imported_parameter(key, value, &table)?;
    }
    if let Some(endpoint) = &db.endpoint {
        state.host = endpoint.address.clone();
    }
    Ok(())
}
