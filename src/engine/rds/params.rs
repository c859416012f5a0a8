//! Parameter keys and per-phase metadata for database instances.

use crate::error::Result;
use crate::params::{plan_parameters, MetaData, MetadataTable, Parameter, Phase};

use super::super::password::generate_secure_password;
use super::super::Options;

pub const DB_INSTANCE_IDENTIFIER: &str = "DBInstanceIdentifier";
pub const DB_NAME: &str = "DBName";
pub const DB_PARAMETER_GROUP_NAME: &str = "DBParameterGroupName";
pub const ENGINE: &str = "Engine";
pub const ENGINE_VERSION: &str = "EngineVersion";
pub const DB_INSTANCE_CLASS: &str = "DBInstanceClass";
pub const STORAGE_TYPE: &str = "StorageType";
pub const ALLOCATED_STORAGE: &str = "AllocatedStorage";
pub const MASTER_USERNAME: &str = "MasterUsername";
pub const MASTER_USER_PASSWORD: &str = "MasterUserPassword";
pub const ALLOW_MAJOR_VERSION_UPGRADE: &str = "AllowMajorVersionUpgrade";
pub const AUTO_MINOR_VERSION_UPGRADE: &str = "AutoMinorVersionUpgrade";
pub const BACKUP_RETENTION_PERIOD: &str = "BackupRetentionPeriod";
pub const DB_SUBNET_GROUP_NAME: &str = "DBSubnetGroupName";
pub const DB_SNAPSHOT_IDENTIFIER: &str = "DBSnapshotIdentifier";
pub const DELETION_PROTECTION: &str = "DeletionProtection";
pub const IOPS: &str = "Iops";
pub const MULTI_AZ: &str = "MultiAZ";
pub const PORT: &str = "Port";
pub const PREFERRED_BACKUP_WINDOW: &str = "PreferredBackupWindow";
pub const PREFERRED_MAINTENANCE_WINDOW: &str = "PreferredMaintenanceWindow";
pub const PUBLICLY_ACCESSIBLE: &str = "PubliclyAccessible";
pub const STORAGE_ENCRYPTED: &str = "StorageEncrypted";
pub const SOURCE_DB_INSTANCE_IDENTIFIER: &str = "SourceDBInstanceIdentifier";
pub const VPC_SECURITY_GROUPS: &str = "VPCSecurityGroups";

// Not cloud fields: inputs for the dependent resources and the modify call.
pub const SUBNET_IDS: &str = "SubnetIds";
pub const VPC: &str = "VPC";
pub const APPLY_IMMEDIATELY: &str = "ApplyImmediately";

pub fn default_port(engine: &str) -> &'static str {
    match engine {
        "mysql" | "mariadb" => "3306",
        "postgres" => "5432",
        _ => "8080",
    }
}

pub fn install_table() -> MetadataTable {
    MetadataTable::from([
        (DB_INSTANCE_IDENTIFIER, MetaData::string().required().immutable()),
        (DB_NAME, MetaData::string().required().immutable().default_value("app")),
        (DB_PARAMETER_GROUP_NAME, MetaData::string().interrupts()),
        (ENGINE, MetaData::string().required().immutable()),
        (ENGINE_VERSION, MetaData::string().required().interrupts()),
        (DB_INSTANCE_CLASS, MetaData::string().required().interrupts()),
        (STORAGE_TYPE, MetaData::string().required().default_value("gp2")),
        (ALLOCATED_STORAGE, MetaData::int().required().default_value("20")),
        (MASTER_USERNAME, MetaData::string().required().default_value("app")),
        (MASTER_USER_PASSWORD, MetaData::string().required()),
        (ALLOW_MAJOR_VERSION_UPGRADE, MetaData::boolean().default_value("true")),
        (AUTO_MINOR_VERSION_UPGRADE, MetaData::boolean().interrupts()),
        (BACKUP_RETENTION_PERIOD, MetaData::int().interrupts()),
        (DB_SUBNET_GROUP_NAME, MetaData::string().immutable()),
        (DB_SNAPSHOT_IDENTIFIER, MetaData::string().immutable()),
        (DELETION_PROTECTION, MetaData::boolean()),
        (IOPS, MetaData::int()),
        (MULTI_AZ, MetaData::boolean().interrupts()),
        (PORT, MetaData::int().required().immutable()),
        (PREFERRED_BACKUP_WINDOW, MetaData::string()),
        (PREFERRED_MAINTENANCE_WINDOW, MetaData::string()),
        (PUBLICLY_ACCESSIBLE, MetaData::boolean().default_value("false")),
        (STORAGE_ENCRYPTED, MetaData::boolean().immutable()),
        (SOURCE_DB_INSTANCE_IDENTIFIER, MetaData::string()),
        (SUBNET_IDS, MetaData::list()),
        (VPC_SECURITY_GROUPS, MetaData::list()),
        (VPC, MetaData::string()),
    ])
}

pub fn update_table() -> MetadataTable {
    MetadataTable::from([
        (DB_INSTANCE_IDENTIFIER, MetaData::string().required().immutable()),
        (DB_NAME, MetaData::string().immutable().default_value("app")),
        (DB_PARAMETER_GROUP_NAME, MetaData::string().interrupts()),
        (ENGINE, MetaData::string().immutable()),
        (ENGINE_VERSION, MetaData::string().interrupts()),
        (DB_INSTANCE_CLASS, MetaData::string().interrupts()),
        (STORAGE_TYPE, MetaData::string().default_value("gp2")),
        (ALLOCATED_STORAGE, MetaData::int().default_value("20")),
        (MASTER_USERNAME, MetaData::string().immutable()),
        (MASTER_USER_PASSWORD, MetaData::string()),
        (ALLOW_MAJOR_VERSION_UPGRADE, MetaData::boolean().default_value("true")),
        (AUTO_MINOR_VERSION_UPGRADE, MetaData::boolean().interrupts()),
        (BACKUP_RETENTION_PERIOD, MetaData::int().interrupts()),
        (DB_SUBNET_GROUP_NAME, MetaData::string().immutable()),
        (DB_SNAPSHOT_IDENTIFIER, MetaData::string().immutable()),
        (DELETION_PROTECTION, MetaData::boolean()),
        (IOPS, MetaData::int()),
        (MULTI_AZ, MetaData::boolean().interrupts()),
        (PORT, MetaData::int().immutable()),
        (PREFERRED_BACKUP_WINDOW, MetaData::string()),
        (PREFERRED_MAINTENANCE_WINDOW, MetaData::string()),
        (PUBLICLY_ACCESSIBLE, MetaData::boolean().default_value("false")),
        (STORAGE_ENCRYPTED, MetaData::boolean().immutable()),
        (SOURCE_DB_INSTANCE_IDENTIFIER, MetaData::string().interrupts()),
        (SUBNET_IDS, MetaData::list()),
        (VPC_SECURITY_GROUPS, MetaData::list().immutable()),
        (VPC, MetaData::string()),
        (APPLY_IMMEDIATELY, MetaData::boolean().default_value("true")),
    ])
}

/// Import accepts whatever the existing instance reports. Major version
/// upgrades are an install/update decision and are not imported.
pub fn import_table() -> MetadataTable {
    let mut table: MetadataTable = install_table()
        .into_iter()
        .map(|(key, meta)| {
            let meta = MetaData {
                kind: meta.kind,
                ..MetaData::default()
            };
            (key, meta)
        })
        .collect();
    table.remove(ALLOW_MAJOR_VERSION_UPGRADE);
    table.insert(
        DB_INSTANCE_IDENTIFIER,
        MetaData::string().required().immutable(),
    );
    table
}

/// A replica copies engine, credentials and database from its source, so
/// those keys become optional and no dependent resources are created.
pub fn read_replica_table() -> MetadataTable {
    let mut table: MetadataTable = install_table()
        .into_iter()
        .map(|(key, meta)| (key, meta.optional()))
        .collect();
    table.remove(DB_SNAPSHOT_IDENTIFIER);
    table.remove(BACKUP_RETENTION_PERIOD);
    table.remove(PREFERRED_BACKUP_WINDOW);
    table.remove(PREFERRED_MAINTENANCE_WINDOW);
    table.remove(STORAGE_ENCRYPTED);
    table.remove(ALLOW_MAJOR_VERSION_UPGRADE);
    for (key, meta) in [
        (DB_INSTANCE_IDENTIFIER, MetaData::string().required().immutable()),
        (SOURCE_DB_INSTANCE_IDENTIFIER, MetaData::string().required().immutable()),
        (MASTER_USER_PASSWORD, MetaData::string().required()),
        (DB_INSTANCE_CLASS, MetaData::string().required().interrupts()),
        (DB_NAME, MetaData::string().immutable()),
        (MASTER_USERNAME, MetaData::string()),
        (STORAGE_TYPE, MetaData::string()),
        (ALLOCATED_STORAGE, MetaData::int()),
    ] {
        table.insert(key, meta);
    }
    table
}

/// Credentials come from the snapshot.
pub fn restore_from_snapshot_table() -> MetadataTable {
    let mut table = install_table();
    for (key, meta) in [
        (DB_SNAPSHOT_IDENTIFIER, MetaData::string().required().immutable()),
        (MASTER_USER_PASSWORD, MetaData::string()),
        (MASTER_USERNAME, MetaData::string()),
    ] {
        table.insert(key, meta);
    }
    table
}

pub fn metadata_for(phase: Phase) -> MetadataTable {
    match phase {
        Phase::Install => install_table(),
        Phase::Update => update_table(),
        Phase::Import => import_table(),
        Phase::ReadReplica => read_replica_table(),
        Phase::RestoreFromSnapshot => restore_from_snapshot_table(),
    }
}

/// Which install flavour a set of options asks for.
pub fn install_phase(options: &Options) -> Phase {
    let set = |key: &str| options.get(key).is_some_and(|v| !v.is_empty());
    if set(SOURCE_DB_INSTANCE_IDENTIFIER) {
        Phase::ReadReplica
    } else if set(DB_SNAPSHOT_IDENTIFIER) {
        Phase::RestoreFromSnapshot
    } else {
        Phase::Install
    }
}

/// Fill the engine port and, for a fresh install, a generated password.
pub fn apply_install_defaults(
    options: &mut Options,
    phase: Phase,
    password_length: usize,
) -> Result<()> {
    if matches!(phase, Phase::Install | Phase::RestoreFromSnapshot) && !options.contains_key(PORT)
    {
        let engine = options.get(ENGINE).map(String::as_str).unwrap_or("");
        options.insert(PORT.to_string(), default_port(engine).to_string());
    }

    if phase == Phase::Install && !options.contains_key(MASTER_USER_PASSWORD) {
        let password = generate_secure_password(password_length)?;
        options.insert(MASTER_USER_PASSWORD.to_string(), password);
    }
    Ok(())
}

/// Default and validate the full parameter set of one install flavour,
/// without touching the cloud. The caller's options are not modified.
pub fn plan(phase: Phase, id: &str, options: &Options, password_length: usize) -> Result<Vec<Parameter>> {
    let mut options = options.clone();
    options.insert(DB_INSTANCE_IDENTIFIER.to_string(), id.to_string());
    apply_install_defaults(&mut options, phase, password_length)?;
    plan_parameters(&metadata_for(phase), &options)
}

pub fn plan_install(id: &str, options: &Options, password_length: usize) -> Result<Vec<Parameter>> {
    plan(install_phase(options), id, options, password_length)
}
