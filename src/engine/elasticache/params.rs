//! Parameter keys and per-phase metadata for cache resources.
//!
//! Redis runs as a replication group, memcached as a single cache cluster.
//! Both share most keys; the tables below differ in the identifier and in
//! how capacity is expressed (`NumCacheClusters` vs `NumCacheNodes`).

use std::fmt;

use crate::cloud::elasticache::TransitEncryptionMode;
use crate::error::{ProvisionError, Result};
use crate::params::{parse_bool, plan_parameters, MetaData, MetadataTable, Parameter, Phase};

use super::super::naming::short_resource_name;
use super::super::Options;

pub const REPLICATION_GROUP_ID: &str = "ReplicationGroupId";
pub const CACHE_CLUSTER_ID: &str = "CacheClusterId";
pub const AT_REST_ENCRYPTION_ENABLED: &str = "AtRestEncryptionEnabled";
pub const AUTH_TOKEN: &str = "AuthToken";
pub const AUTO_MINOR_VERSION_UPGRADE: &str = "AutoMinorVersionUpgrade";
pub const AUTOMATIC_FAILOVER_ENABLED: &str = "AutomaticFailoverEnabled";
pub const CACHE_NODE_TYPE: &str = "CacheNodeType";
pub const CACHE_SUBNET_GROUP_NAME: &str = "CacheSubnetGroupName";
pub const CACHE_PARAMETER_GROUP_NAME: &str = "CacheParameterGroupName";
pub const ENGINE: &str = "Engine";
pub const ENGINE_VERSION: &str = "EngineVersion";
pub const NUM_CACHE_CLUSTERS: &str = "NumCacheClusters";
pub const NUM_CACHE_NODES: &str = "NumCacheNodes";
pub const PORT: &str = "Port";
pub const REPLICATION_GROUP_DESCRIPTION: &str = "ReplicationGroupDescription";
pub const DELETION_PROTECTION: &str = "DeletionProtection";
pub const SECURITY_GROUP_IDS: &str = "SecurityGroupIds";
pub const TRANSIT_ENCRYPTION_ENABLED: &str = "TransitEncryptionEnabled";
pub const TRANSIT_ENCRYPTION_MODE: &str = "TransitEncryptionMode";

// Not cloud fields: inputs for the dependent resources and the modify call.
pub const SUBNET_IDS: &str = "SubnetIds";
pub const VPC: &str = "VPC";
pub const APPLY_IMMEDIATELY: &str = "ApplyImmediately";

pub const DEFAULT_DESCRIPTION: &str = "managed replication group";

const AUTH_TOKEN_LENGTH: std::ops::RangeInclusive<usize> = 16..=128;

/// Cache engines this crate provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEngine {
    Redis,
    Memcached,
}

impl CacheEngine {
    pub fn parse(engine: &str) -> Result<Self> {
        match engine.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheEngine::Redis),
            "memcached" => Ok(CacheEngine::Memcached),
            _ => Err(ProvisionError::UnsupportedEngine(engine.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEngine::Redis => "redis",
            CacheEngine::Memcached => "memcached",
        }
    }

    /// Parameter holding the cloud identifier.
    pub fn id_key(&self) -> &'static str {
        match self {
            CacheEngine::Redis => REPLICATION_GROUP_ID,
            CacheEngine::Memcached => CACHE_CLUSTER_ID,
        }
    }

    pub fn default_port(&self) -> &'static str {
        match self {
            CacheEngine::Redis => "6379",
            CacheEngine::Memcached => "11211",
        }
    }

    pub fn table(&self, phase: Phase) -> Result<MetadataTable> {
        match (self, phase) {
            (CacheEngine::Redis, Phase::Install) => Ok(replication_group_install_table()),
            (CacheEngine::Redis, Phase::Update) => Ok(replication_group_update_table()),
            (CacheEngine::Memcached, Phase::Install) => Ok(cache_cluster_install_table()),
            (CacheEngine::Memcached, Phase::Update) => Ok(cache_cluster_update_table()),
            (_, Phase::Import) => Ok(import_table(*self)),
            (_, other) => Err(ProvisionError::invalid(
                "phase",
                format!("{} is not supported for {}", other, self),
            )),
        }
    }
}

impl fmt::Display for CacheEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn replication_group_install_table() -> MetadataTable {
    MetadataTable::from([
        (REPLICATION_GROUP_ID, MetaData::string().required().immutable()),
        (
            AT_REST_ENCRYPTION_ENABLED,
            MetaData::boolean().immutable().default_value("false"),
        ),
        (AUTH_TOKEN, MetaData::string()),
        (AUTO_MINOR_VERSION_UPGRADE, MetaData::boolean()),
        (AUTOMATIC_FAILOVER_ENABLED, MetaData::boolean()),
        (CACHE_NODE_TYPE, MetaData::string().required()),
        (CACHE_SUBNET_GROUP_NAME, MetaData::string().immutable()),
        (CACHE_PARAMETER_GROUP_NAME, MetaData::string()),
        (ENGINE, MetaData::string().required().immutable()),
        (ENGINE_VERSION, MetaData::string().required()),
        (NUM_CACHE_CLUSTERS, MetaData::int()),
        (PORT, MetaData::int().required().immutable()),
        (
            REPLICATION_GROUP_DESCRIPTION,
            MetaData::string().required().default_value(DEFAULT_DESCRIPTION),
        ),
        (DELETION_PROTECTION, MetaData::boolean()),
        (SECURITY_GROUP_IDS, MetaData::list()),
        (TRANSIT_ENCRYPTION_ENABLED, MetaData::boolean()),
        (TRANSIT_ENCRYPTION_MODE, MetaData::string()),
        (SUBNET_IDS, MetaData::list()),
        (VPC, MetaData::string()),
    ])
}

pub fn replication_group_update_table() -> MetadataTable {
    MetadataTable::from([
        (REPLICATION_GROUP_ID, MetaData::string().required().immutable()),
        (AT_REST_ENCRYPTION_ENABLED, MetaData::boolean().immutable()),
        (AUTH_TOKEN, MetaData::string()),
        (AUTO_MINOR_VERSION_UPGRADE, MetaData::boolean()),
        (AUTOMATIC_FAILOVER_ENABLED, MetaData::boolean()),
        (CACHE_NODE_TYPE, MetaData::string()),
        (CACHE_SUBNET_GROUP_NAME, MetaData::string().immutable()),
        (CACHE_PARAMETER_GROUP_NAME, MetaData::string()),
        (ENGINE, MetaData::string().immutable()),
        (ENGINE_VERSION, MetaData::string()),
        (NUM_CACHE_CLUSTERS, MetaData::int()),
        (PORT, MetaData::int().immutable()),
        (
            REPLICATION_GROUP_DESCRIPTION,
            MetaData::string().required().default_value(DEFAULT_DESCRIPTION),
        ),
        (DELETION_PROTECTION, MetaData::boolean()),
        (SECURITY_GROUP_IDS, MetaData::list()),
        (TRANSIT_ENCRYPTION_ENABLED, MetaData::boolean()),
        (TRANSIT_ENCRYPTION_MODE, MetaData::string()),
        (SUBNET_IDS, MetaData::list()),
        (APPLY_IMMEDIATELY, MetaData::boolean().default_value("true")),
    ])
}

pub fn cache_cluster_install_table() -> MetadataTable {
    MetadataTable::from([
        (CACHE_CLUSTER_ID, MetaData::string().required().immutable()),
        (AUTO_MINOR_VERSION_UPGRADE, MetaData::boolean()),
        (CACHE_NODE_TYPE, MetaData::string().required()),
        (CACHE_SUBNET_GROUP_NAME, MetaData::string().immutable()),
        (CACHE_PARAMETER_GROUP_NAME, MetaData::string()),
        (ENGINE, MetaData::string().required().immutable()),
        (ENGINE_VERSION, MetaData::string().required()),
        (NUM_CACHE_NODES, MetaData::int().default_value("1")),
        (PORT, MetaData::int().required().immutable()),
        (DELETION_PROTECTION, MetaData::boolean()),
        (SECURITY_GROUP_IDS, MetaData::list()),
        (TRANSIT_ENCRYPTION_ENABLED, MetaData::boolean()),
        (SUBNET_IDS, MetaData::list()),
        (VPC, MetaData::string()),
    ])
}

pub fn cache_cluster_update_table() -> MetadataTable {
    MetadataTable::from([
        (CACHE_CLUSTER_ID, MetaData::string().required().immutable()),
        (AUTO_MINOR_VERSION_UPGRADE, MetaData::boolean()),
        (CACHE_NODE_TYPE, MetaData::string()),
        (CACHE_SUBNET_GROUP_NAME, MetaData::string().immutable()),
        (CACHE_PARAMETER_GROUP_NAME, MetaData::string()),
        (ENGINE, MetaData::string().immutable()),
        (ENGINE_VERSION, MetaData::string()),
        (NUM_CACHE_NODES, MetaData::int()),
        (PORT, MetaData::int().immutable()),
        (DELETION_PROTECTION, MetaData::boolean()),
        (SECURITY_GROUP_IDS, MetaData::list()),
        (TRANSIT_ENCRYPTION_ENABLED, MetaData::boolean().immutable()),
        (SUBNET_IDS, MetaData::list()),
        (VPC, MetaData::string()),
        (APPLY_IMMEDIATELY, MetaData::boolean().default_value("true")),
    ])
}

/// Import accepts whatever the existing resource reports; only the
/// identifier, engine and port must be known.
pub fn import_table(engine: CacheEngine) -> MetadataTable {
    let install = match engine {
        CacheEngine::Redis => replication_group_install_table(),
        CacheEngine::Memcached => cache_cluster_install_table(),
    };
    let mut table: MetadataTable = install
        .into_iter()
        .map(|(key, meta)| {
            let meta = MetaData {
                kind: meta.kind,
                ..MetaData::default()
            };
            (key, meta)
        })
        .collect();
    table.insert(engine.id_key(), MetaData::string().required().immutable());
    table.insert(ENGINE, MetaData::string().required().immutable());
    table.insert(PORT, MetaData::int().required());
    table
}

pub fn metadata_for(kind: &str, phase: Phase) -> Result<MetadataTable> {
    CacheEngine::parse(kind)?.table(phase)
}

fn is_set(options: &Options, key: &str) -> bool {
    options.get(key).is_some_and(|v| !v.trim().is_empty())
}

/// Checks on values that the metadata kinds cannot express. `value` yields
/// the non-empty value of a key, from caller options or from stored state.
pub fn validate_values<F>(engine: CacheEngine, value: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = value(AUTH_TOKEN) {
        if !AUTH_TOKEN_LENGTH.contains(&token.len()) {
            return Err(ProvisionError::invalid(
                AUTH_TOKEN,
                format!(
                    "length must be between {} and {}",
                    AUTH_TOKEN_LENGTH.start(),
                    AUTH_TOKEN_LENGTH.end()
                ),
            ));
        }
    }
    if let Some(mode) = value(TRANSIT_ENCRYPTION_MODE) {
        mode.parse::<TransitEncryptionMode>()
            .map_err(|reason| ProvisionError::invalid(TRANSIT_ENCRYPTION_MODE, reason))?;
    }

    if engine == CacheEngine::Redis {
        let transit = match value(TRANSIT_ENCRYPTION_ENABLED) {
            Some(raw) => parse_bool(TRANSIT_ENCRYPTION_ENABLED, &raw)?,
            None => false,
        };
        if transit && value(AUTH_TOKEN).is_none() {
            return Err(ProvisionError::invalid(
                AUTH_TOKEN,
                "required when transit encryption is enabled",
            ));
        }
    }
    Ok(())
}

pub fn validate_options(engine: CacheEngine, options: &Options) -> Result<()> {
    validate_values(engine, |key| {
        options.get(key).filter(|v| !v.trim().is_empty()).cloned()
    })
}

/// Default and validate the install parameter set for `kind`, without
/// touching the cloud. A fresh cloud identifier is derived from `id`.
pub fn plan_install(kind: &str, id: &str, options: &Options) -> Result<Vec<Parameter>> {
    let engine = CacheEngine::parse(kind)?;
    let mut options = options.clone();

    match options.get(ENGINE).filter(|e| !e.is_empty()) {
        Some(requested) if CacheEngine::parse(requested)? != engine => {
            return Err(ProvisionError::invalid(
                ENGINE,
                format!("'{}' does not match resource kind {}", requested, engine),
            ));
        }
        Some(_) => {}
        None => {
            options.insert(ENGINE.to_string(), engine.as_str().to_string());
        }
    }
    options.insert(engine.id_key().to_string(), short_resource_name(id));
    if !is_set(&options, PORT) {
        options.insert(PORT.to_string(), engine.default_port().to_string());
    }

    validate_options(engine, &options)?;
    plan_parameters(&engine.table(Phase::Install)?, &options)
}
