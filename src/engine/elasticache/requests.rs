//! Translation between stored parameters and cache API shapes.

use std::cmp::Ordering;

use crate::cloud::elasticache::{
    CacheCluster, CreateCacheClusterRequest, CreateReplicationGroupRequest,
    ModifyCacheClusterRequest, ModifyReplicationGroupRequest, ReplicationGroup,
    TransitEncryptionMode, NETWORK_TYPE_IPV4,
};
use crate::cloud::Tag;
use crate::error::{ProvisionError, Result};
use crate::state::StateData;

use super::super::{Changed, Fields};
use super::params::*;

fn transit_mode(value: Option<String>) -> Result<Option<TransitEncryptionMode>> {
    value
        .map(|mode| {
            mode.parse()
                .map_err(|reason: String| ProvisionError::invalid(TRANSIT_ENCRYPTION_MODE, reason))
        })
        .transpose()
}

pub fn create_replication_group_request(
    state: &StateData,
    tags: Vec<Tag>,
) -> Result<CreateReplicationGroupRequest> {
    let f = Fields(state);
    Ok(CreateReplicationGroupRequest {
        replication_group_id: f.required(REPLICATION_GROUP_ID)?,
        description: f.required(REPLICATION_GROUP_DESCRIPTION)?,
        at_rest_encryption_enabled: f.boolean(AT_REST_ENCRYPTION_ENABLED)?,
        auth_token: f.string(AUTH_TOKEN),
        auto_minor_version_upgrade: f.boolean(AUTO_MINOR_VERSION_UPGRADE)?,
        automatic_failover_enabled: f.boolean(AUTOMATIC_FAILOVER_ENABLED)?,
        cache_node_type: f.string(CACHE_NODE_TYPE),
        cache_parameter_group_name: f.string(CACHE_PARAMETER_GROUP_NAME),
        cache_subnet_group_name: f.string(CACHE_SUBNET_GROUP_NAME),
        engine: f.string(ENGINE),
        engine_version: f.string(ENGINE_VERSION),
        network_type: NETWORK_TYPE_IPV4.to_string(),
        num_cache_clusters: f.int(NUM_CACHE_CLUSTERS)?,
        port: f.int(PORT)?,
        security_group_ids: f.list(SECURITY_GROUP_IDS)?,
        transit_encryption_enabled: f.boolean(TRANSIT_ENCRYPTION_ENABLED)?,
        transit_encryption_mode: transit_mode(f.string(TRANSIT_ENCRYPTION_MODE))?,
        tags,
    })
}

pub fn modify_replication_group_request(
    state: &StateData,
    changed: &[String],
    apply_immediately: bool,
) -> Result<ModifyReplicationGroupRequest> {
    let c = Changed::new(state, changed, &replication_group_update_table());
    Ok(ModifyReplicationGroupRequest {
        replication_group_id: c.fields.required(REPLICATION_GROUP_ID)?,
        apply_immediately,
        description: c.string(REPLICATION_GROUP_DESCRIPTION),
        auth_token: c.string(AUTH_TOKEN),
        auto_minor_version_upgrade: c.boolean(AUTO_MINOR_VERSION_UPGRADE)?,
        automatic_failover_enabled: c.boolean(AUTOMATIC_FAILOVER_ENABLED)?,
        cache_node_type: c.string(CACHE_NODE_TYPE),
        cache_parameter_group_name: c.string(CACHE_PARAMETER_GROUP_NAME),
        engine_version: c.string(ENGINE_VERSION),
        security_group_ids: c.list(SECURITY_GROUP_IDS)?,
        transit_encryption_enabled: c.boolean(TRANSIT_ENCRYPTION_ENABLED)?,
        transit_encryption_mode: transit_mode(c.string(TRANSIT_ENCRYPTION_MODE))?,
    })
}

pub fn create_cache_cluster_request(
    state: &StateData,
    tags: Vec<Tag>,
) -> Result<CreateCacheClusterRequest> {
    let f = Fields(state);
    Ok(CreateCacheClusterRequest {
        cache_cluster_id: f.required(CACHE_CLUSTER_ID)?,
        auto_minor_version_upgrade: f.boolean(AUTO_MINOR_VERSION_UPGRADE)?,
        cache_node_type: f.string(CACHE_NODE_TYPE),
        cache_parameter_group_name: f.string(CACHE_PARAMETER_GROUP_NAME),
        cache_subnet_group_name: f.string(CACHE_SUBNET_GROUP_NAME),
        engine: f.string(ENGINE),
        engine_version: f.string(ENGINE_VERSION),
        network_type: NETWORK_TYPE_IPV4.to_string(),
        num_cache_nodes: f.int(NUM_CACHE_NODES)?,
        port: f.int(PORT)?,
        security_group_ids: f.list(SECURITY_GROUP_IDS)?,
        transit_encryption_enabled: f.boolean(TRANSIT_ENCRYPTION_ENABLED)?,
        tags,
    })
}

pub fn modify_cache_cluster_request(
    state: &StateData,
    changed: &[String],
    apply_immediately: bool,
    cache_node_ids_to_remove: Vec<String>,
) -> Result<ModifyCacheClusterRequest> {
    let c = Changed::new(state, changed, &cache_cluster_update_table());
    Ok(ModifyCacheClusterRequest {
        cache_cluster_id: c.fields.required(CACHE_CLUSTER_ID)?,
        apply_immediately,
        auto_minor_version_upgrade: c.boolean(AUTO_MINOR_VERSION_UPGRADE)?,
        cache_node_type: c.string(CACHE_NODE_TYPE),
        cache_parameter_group_name: c.string(CACHE_PARAMETER_GROUP_NAME),
        engine_version: c.string(ENGINE_VERSION),
        num_cache_nodes: c.int(NUM_CACHE_NODES)?,
        cache_node_ids_to_remove,
        security_group_ids: c.list(SECURITY_GROUP_IDS)?,
    })
}

/// Nodes to drop when shrinking `cluster` to `desired` nodes: the newest
/// ones, with nodes of unknown age treated as newest.
pub fn nodes_to_remove(cluster: &CacheCluster, desired: i32) -> Vec<String> {
    let current = cluster.num_cache_nodes.max(cluster.cache_nodes.len() as i32);
    if desired >= current || desired < 0 {
        return Vec::new();
    }

    let mut nodes: Vec<_> = cluster.cache_nodes.iter().collect();
    nodes.sort_by(|a, b| match (a.create_time, b.create_time) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    nodes
        .into_iter()
        .skip(desired as usize)
        .map(|node| node.id.clone())
        .collect()
}

pub fn final_snapshot_name(id: &str, unix_time: i64) -> String {
    format!("{}-final-snapshot-{}", id, unix_time)
}

fn text<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn failover_enabled(status: &str) -> bool {
    matches!(status, "enabled" | "enabling")
}

/// Record what a replication group reports as imported parameters.
/// The auth token cannot be read back, so it comes from the caller.
pub fn import_replication_group(
    state: &mut StateData,
    group: &ReplicationGroup,
    auth_token: Option<&str>,
) -> Result<()> {
    let auth_token = auth_token.filter(|t| !t.is_empty());
    if group.auth_token_enabled == Some(true) && auth_token.is_none() {
        return Err(ProvisionError::invalid(
            AUTH_TOKEN,
            "required since it is enabled in the replication group",
        ));
    }

    let table = import_table(CacheEngine::Redis);
    let primary = group.node_groups.first();
    let endpoint = primary.and_then(|ng| ng.primary_endpoint.as_ref());

    let fields: Vec<(&str, Option<String>)> = vec![
        (REPLICATION_GROUP_ID, Some(group.id.clone())),
        (ENGINE, Some(CacheEngine::Redis.as_str().to_string())),
        (REPLICATION_GROUP_DESCRIPTION, group.description.clone()),
        (AT_REST_ENCRYPTION_ENABLED, text(group.at_rest_encryption_enabled)),
        (AUTH_TOKEN, auth_token.map(str::to_string)),
        (AUTO_MINOR_VERSION_UPGRADE, text(group.auto_minor_version_upgrade)),
        (
            AUTOMATIC_FAILOVER_ENABLED,
            group
                .automatic_failover
                .as_deref()
                .map(|s| failover_enabled(s).to_string()),
        ),
        (CACHE_NODE_TYPE, group.cache_node_type.clone()),
        (TRANSIT_ENCRYPTION_ENABLED, text(group.transit_encryption_enabled)),
        (NUM_CACHE_CLUSTERS, primary.map(|ng| ng.members.len().to_string())),
    ];
    for (key, value) in fields {
        state.add_imported_parameter(key, value, &table)?;
    }

    if let Some(endpoint) = endpoint {
        state.add_imported_parameter(PORT, Some(endpoint.port.to_string()), &table)?;
        state.host = endpoint.address.clone();
    }
    Ok(())
}

/// Record what a memcached cluster reports as imported parameters.
pub fn import_cache_cluster(state: &mut StateData, cluster: &CacheCluster) -> Result<()> {
    let table = import_table(CacheEngine::Memcached);
    let fields: Vec<(&str, Option<String>)> = vec![
        (CACHE_CLUSTER_ID, Some(cluster.id.clone())),
        (ENGINE, Some(CacheEngine::Memcached.as_str().to_string())),
        (ENGINE_VERSION, cluster.engine_version.clone()),
        (AUTO_MINOR_VERSION_UPGRADE, text(cluster.auto_minor_version_upgrade)),
        (CACHE_NODE_TYPE, cluster.cache_node_type.clone()),
        (CACHE_SUBNET_GROUP_NAME, cluster.cache_subnet_group_name.clone()),
        (NUM_CACHE_NODES, Some(cluster.num_cache_nodes.to_string())),
        (TRANSIT_ENCRYPTION_ENABLED, text(cluster.transit_encryption_enabled)),
        (
            SECURITY_GROUP_IDS,
            (!cluster.security_group_ids.is_empty()).then(|| cluster.security_group_ids.join(",")),
        ),
    ];
    for (key, value) in fields {
        state.add_imported_parameter(key, value, &table)?;
    }

    if let Some(endpoint) = &cluster.configuration_endpoint {
        state.add_imported_parameter(PORT, Some(endpoint.port.to_string()), &table)?;
        state.host = endpoint.address.clone();
    }
    Ok(())
}
