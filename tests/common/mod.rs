#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use provisioner::cloud::elasticache::{
    CacheApi, CacheCluster, CacheNode, CreateCacheClusterRequest, CreateReplicationGroupRequest,
    ModifyCacheClusterRequest, ModifyReplicationGroupRequest, NodeGroup, ReplicaCountRequest,
    ReplicationGroup,
};
use provisioner::cloud::network::{IngressRule, NetworkApi, SecurityGroup};
use provisioner::cloud::rds::{
    CreateDbInstanceReadReplicaRequest, CreateDbInstanceRequest, DatabaseApi, DbInstance,
    DeleteDbInstanceRequest, ModifyDbInstanceRequest, RestoreDbInstanceFromSnapshotRequest,
};
use provisioner::cloud::{CloudError, CloudResult, Endpoint, SubnetGroup, SubnetGroupApi, Tag};
use provisioner::engine::elasticache::ElasticacheProvisioner;
use provisioner::engine::rds::RdsProvisioner;
use provisioner::engine::registry::CloudClients;
use provisioner::engine::waiter::WaiterSettings;
use provisioner::engine::Options;
use provisioner::state::sqlite::SqliteStorage;
use provisioner::state::{StateData, StateStorage};

pub const VPC_CIDR: &str = "10.20.0.0/16";

pub fn opts(pairs: &[(&str, &str)]) -> Options {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn fast_waiter() -> WaiterSettings {
    WaiterSettings {
        timeout: Duration::from_secs(2),
        delay: Duration::from_millis(1),
    }
}

fn not_found(what: &str, id: &str) -> CloudError {
    CloudError::NotFound(format!("{} {}", what, id))
}

/// In-memory stand-in for the network, database and cache services.
///
/// Every call is appended to a log by method name. Created resources are
/// stored as already available, while the create call itself answers like
/// the real services do: status `creating` and no endpoint yet.
#[derive(Default)]
pub struct FakeCloud {
    calls: Mutex<Vec<String>>,
    failures: Mutex<BTreeMap<String, CloudError>>,
    next_id: AtomicUsize,
    security_groups: Mutex<Vec<SecurityGroup>>,
    ingress: Mutex<Vec<(String, IngressRule)>>,
    subnet_groups: Mutex<BTreeMap<String, SubnetGroup>>,
    db_instances: Mutex<BTreeMap<String, DbInstance>>,
    db_deletes: Mutex<Vec<DeleteDbInstanceRequest>>,
    db_modifies: Mutex<Vec<ModifyDbInstanceRequest>>,
    replication_groups: Mutex<BTreeMap<String, ReplicationGroup>>,
    group_modifies: Mutex<Vec<ModifyReplicationGroupRequest>>,
    replica_counts: Mutex<Vec<ReplicaCountRequest>>,
    final_snapshots: Mutex<Vec<Option<String>>>,
    cache_clusters: Mutex<BTreeMap<String, CacheCluster>>,
    cluster_modifies: Mutex<Vec<ModifyCacheClusterRequest>>,
    resource_tags: Mutex<BTreeMap<String, Vec<Tag>>>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ─── Call log and failure injection ─────────────────────────────────────

    fn call(&self, op: &str) -> CloudResult<()> {
        self.calls.lock().unwrap().push(op.to_string());
        match self.failures.lock().unwrap().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Make every later call of `op` fail with `err`.
    pub fn fail(&self, op: &str, err: CloudError) {
        self.failures.lock().unwrap().insert(op.to_string(), err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    /// Calls that change something in the cloud.
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !(c.starts_with("describe") || c.starts_with("find") || c.starts_with("list"))
                    && c != "vpc_cidr"
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn next(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{:04}", prefix, n)
    }

    // ─── Seeding ────────────────────────────────────────────────────────────

    pub fn add_security_group(&self, id: &str, tags: Vec<Tag>) {
        self.security_groups.lock().unwrap().push(SecurityGroup {
            id: id.to_string(),
            name: id.to_string(),
            vpc_id: "vpc-1".to_string(),
            tags,
        });
    }

    pub fn add_subnet_group(&self, name: &str, tags: Vec<Tag>) {
        self.subnet_groups.lock().unwrap().insert(
            name.to_string(),
            SubnetGroup {
                name: name.to_string(),
                subnet_ids: vec!["subnet-a".to_string()],
                tags,
            },
        );
    }

    pub fn add_db_instance(&self, instance: DbInstance) {
        self.db_instances
            .lock()
            .unwrap()
            .insert(instance.identifier.clone(), instance);
    }

    pub fn add_replication_group(&self, group: ReplicationGroup, tags: Vec<Tag>) {
        self.resource_tags
            .lock()
            .unwrap()
            .insert(group.arn.clone(), tags);
        self.replication_groups
            .lock()
            .unwrap()
            .insert(group.id.clone(), group);
    }

    pub fn add_cache_cluster(&self, cluster: CacheCluster, tags: Vec<Tag>) {
        self.resource_tags
            .lock()
            .unwrap()
            .insert(cluster.arn.clone(), tags);
        self.cache_clusters
            .lock()
            .unwrap()
            .insert(cluster.id.clone(), cluster);
    }

    pub fn set_db_status(&self, identifier: &str, status: &str) {
        if let Some(db) = self.db_instances.lock().unwrap().get_mut(identifier) {
            db.status = status.to_string();
        }
    }

    // ─── Inspection ─────────────────────────────────────────────────────────

    pub fn security_group_ids(&self) -> Vec<String> {
        self.security_groups
            .lock()
            .unwrap()
            .iter()
            .map(|sg| sg.id.clone())
            .collect()
    }

    pub fn ingress_rules(&self) -> Vec<(String, IngressRule)> {
        self.ingress.lock().unwrap().clone()
    }

    pub fn subnet_group_names(&self) -> Vec<String> {
        self.subnet_groups.lock().unwrap().keys().cloned().collect()
    }

    pub fn db_instance(&self, identifier: &str) -> Option<DbInstance> {
        self.db_instances.lock().unwrap().get(identifier).cloned()
    }

    pub fn db_modifies(&self) -> Vec<ModifyDbInstanceRequest> {
        self.db_modifies.lock().unwrap().clone()
    }

    pub fn db_deletes(&self) -> Vec<DeleteDbInstanceRequest> {
        self.db_deletes.lock().unwrap().clone()
    }

    pub fn replication_group(&self, id: &str) -> Option<ReplicationGroup> {
        self.replication_groups.lock().unwrap().get(id).cloned()
    }

    pub fn group_modifies(&self) -> Vec<ModifyReplicationGroupRequest> {
        self.group_modifies.lock().unwrap().clone()
    }

    pub fn replica_counts(&self) -> Vec<ReplicaCountRequest> {
        self.replica_counts.lock().unwrap().clone()
    }

    pub fn final_snapshots(&self) -> Vec<Option<String>> {
        self.final_snapshots.lock().unwrap().clone()
    }

    pub fn cache_cluster(&self, id: &str) -> Option<CacheCluster> {
        self.cache_clusters.lock().unwrap().get(id).cloned()
    }

    pub fn cluster_modifies(&self) -> Vec<ModifyCacheClusterRequest> {
        self.cluster_modifies.lock().unwrap().clone()
    }

    // ─── Helpers ────────────────────────────────────────────────────────────

    fn store_db_instance(&self, mut db: DbInstance) -> DbInstance {
        db.status = "available".to_string();
        self.add_db_instance(db.clone());
        db.status = "creating".to_string();
        db.endpoint = None;
        db
    }

    fn members(group_id: &str, count: i32) -> Vec<String> {
        (1..=count.max(1))
            .map(|n| format!("{}-{:03}", group_id, n))
            .collect()
    }
}

pub fn created_at(n: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(1_700_000_000 + n, 0)
}

// ─── Network ─────────────────────────────────────────────────────────────────

#[async_trait]
impl NetworkApi for FakeCloud {
    async fn vpc_cidr(&self, vpc_id: &str) -> CloudResult<String> {
        self.call("vpc_cidr")?;
        if vpc_id.is_empty() {
            return Err(not_found("vpc", vpc_id));
        }
        Ok(VPC_CIDR.to_string())
    }

    async fn find_security_groups_by_tags(&self, tags: &[Tag]) -> CloudResult<Vec<SecurityGroup>> {
        self.call("find_security_groups_by_tags")?;
        Ok(self
            .security_groups
            .lock()
            .unwrap()
            .iter()
            .filter(|sg| tags.iter().all(|t| sg.tags.contains(t)))
            .cloned()
            .collect())
    }

    async fn create_security_group(
        &self,
        name: &str,
        _description: &str,
        vpc_id: &str,
        tags: &[Tag],
    ) -> CloudResult<String> {
        self.call("create_security_group")?;
        let id = self.next("sg");
        self.security_groups.lock().unwrap().push(SecurityGroup {
            id: id.clone(),
            name: name.to_string(),
            vpc_id: vpc_id.to_string(),
            tags: tags.to_vec(),
        });
        Ok(id)
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> CloudResult<()> {
        self.call("authorize_ingress")?;
        self.ingress
            .lock()
            .unwrap()
            .push((group_id.to_string(), rule.clone()));
        Ok(())
    }

    async fn delete_security_group(&self, group_id: &str) -> CloudResult<()> {
        self.call("delete_security_group")?;
        let mut groups = self.security_groups.lock().unwrap();
        let before = groups.len();
        groups.retain(|sg| sg.id != group_id);
        if groups.len() == before {
            return Err(not_found("security group", group_id));
        }
        Ok(())
    }
}

// ─── Subnet groups ───────────────────────────────────────────────────────────

#[async_trait]
impl SubnetGroupApi for FakeCloud {
    async fn describe_subnet_group(&self, name: &str) -> CloudResult<SubnetGroup> {
        self.call("describe_subnet_group")?;
        self.subnet_groups
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| not_found("subnet group", name))
    }

    async fn create_subnet_group(
        &self,
        name: &str,
        _description: &str,
        subnet_ids: &[String],
        tags: &[Tag],
    ) -> CloudResult<SubnetGroup> {
        self.call("create_subnet_group")?;
        let group = SubnetGroup {
            name: name.to_string(),
            subnet_ids: subnet_ids.to_vec(),
            tags: tags.to_vec(),
        };
        self.subnet_groups
            .lock()
            .unwrap()
            .insert(name.to_string(), group.clone());
        Ok(group)
    }

    async fn delete_subnet_group(&self, name: &str) -> CloudResult<()> {
        self.call("delete_subnet_group")?;
        self.subnet_groups
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found("subnet group", name))
    }
}

// ─── Database ────────────────────────────────────────────────────────────────

#[async_trait]
impl DatabaseApi for FakeCloud {
    async fn describe_db_instance(&self, identifier: &str) -> CloudResult<DbInstance> {
        self.call("describe_db_instance")?;
        self.db_instance(identifier)
            .ok_or_else(|| not_found("db instance", identifier))
    }

    async fn create_db_instance(&self, req: CreateDbInstanceRequest) -> CloudResult<DbInstance> {
        self.call("create_db_instance")?;
        let port = req.port.unwrap_or(5432);
        Ok(self.store_db_instance(DbInstance {
            identifier: req.db_instance_identifier.clone(),
            engine: req.engine,
            engine_version: req.engine_version,
            db_instance_class: req.db_instance_class,
            db_name: req.db_name,
            master_username: req.master_username,
            allocated_storage: req.allocated_storage,
            storage_type: req.storage_type,
            db_subnet_group_name: req.db_subnet_group_name,
            deletion_protection: req.deletion_protection,
            multi_az: req.multi_az,
            endpoint: Some(Endpoint {
                address: format!("{}.db.example.internal", req.db_instance_identifier),
                port,
            }),
            vpc_security_group_ids: req.vpc_security_group_ids,
            tags: req.tags,
            ..DbInstance::default()
        }))
    }

    async fn create_db_instance_read_replica(
        &self,
        req: CreateDbInstanceReadReplicaRequest,
    ) -> CloudResult<DbInstance> {
        self.call("create_db_instance_read_replica")?;
        let source = self
            .db_instance(&req.source_db_instance_identifier)
            .ok_or_else(|| not_found("db instance", &req.source_db_instance_identifier))?;
        let port = req
            .port
            .or(source.endpoint.as_ref().map(|e| e.port))
            .unwrap_or(5432);
        Ok(self.store_db_instance(DbInstance {
            identifier: req.db_instance_identifier.clone(),
            engine: source.engine,
            engine_version: source.engine_version,
            db_instance_class: req.db_instance_class,
            db_name: source.db_name,
            master_username: source.master_username,
            endpoint: Some(Endpoint {
                address: format!("{}.db.example.internal", req.db_instance_identifier),
                port,
            }),
            read_replica_source: Some(req.source_db_instance_identifier),
            vpc_security_group_ids: req.vpc_security_group_ids,
            tags: req.tags,
            ..DbInstance::default()
        }))
    }

    async fn restore_db_instance_from_snapshot(
        &self,
        req: RestoreDbInstanceFromSnapshotRequest,
    ) -> CloudResult<DbInstance> {
        self.call("restore_db_instance_from_snapshot")?;
        let port = req.port.unwrap_or(5432);
        Ok(self.store_db_instance(DbInstance {
            identifier: req.db_instance_identifier.clone(),
            engine: req.engine,
            db_instance_class: req.db_instance_class,
            db_name: req.db_name,
            master_username: Some("snapshot-admin".to_string()),
            endpoint: Some(Endpoint {
                address: format!("{}.db.example.internal", req.db_instance_identifier),
                port,
            }),
            vpc_security_group_ids: req.vpc_security_group_ids,
            tags: req.tags,
            ..DbInstance::default()
        }))
    }

    async fn modify_db_instance(&self, req: ModifyDbInstanceRequest) -> CloudResult<DbInstance> {
        self.call("modify_db_instance")?;
        self.db_modifies.lock().unwrap().push(req.clone());
        let mut instances = self.db_instances.lock().unwrap();
        let db = instances
            .get_mut(&req.db_instance_identifier)
            .ok_or_else(|| not_found("db instance", &req.db_instance_identifier))?;
        if let Some(class) = req.db_instance_class {
            db.db_instance_class = Some(class);
        }
        if let Some(storage) = req.allocated_storage {
            db.allocated_storage = Some(storage);
        }
        Ok(db.clone())
    }

    async fn delete_db_instance(&self, req: DeleteDbInstanceRequest) -> CloudResult<()> {
        self.call("delete_db_instance")?;
        self.db_deletes.lock().unwrap().push(req.clone());
        self.db_instances
            .lock()
            .unwrap()
            .remove(&req.db_instance_identifier)
            .map(|_| ())
            .ok_or_else(|| not_found("db instance", &req.db_instance_identifier))
    }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

#[async_trait]
impl CacheApi for FakeCloud {
    async fn describe_replication_group(&self, id: &str) -> CloudResult<ReplicationGroup> {
        self.call("describe_replication_group")?;
        self.replication_group(id)
            .ok_or_else(|| not_found("replication group", id))
    }

    async fn create_replication_group(
        &self,
        req: CreateReplicationGroupRequest,
    ) -> CloudResult<ReplicationGroup> {
        self.call("create_replication_group")?;
        let id = req.replication_group_id.clone();
        let group = ReplicationGroup {
            id: id.clone(),
            arn: format!("arn:cache:replicationgroup:{}", id),
            description: Some(req.description),
            status: "available".to_string(),
            node_groups: vec![NodeGroup {
                id: "0001".to_string(),
                members: Self::members(&id, req.num_cache_clusters.unwrap_or(1)),
                primary_endpoint: Some(Endpoint {
                    address: format!("{}.cache.example.internal", id),
                    port: req.port.unwrap_or(6379),
                }),
            }],
            at_rest_encryption_enabled: req.at_rest_encryption_enabled,
            auth_token_enabled: Some(req.auth_token.is_some()),
            auto_minor_version_upgrade: req.auto_minor_version_upgrade,
            automatic_failover: req
                .automatic_failover_enabled
                .map(|on| if on { "enabled" } else { "disabled" }.to_string()),
            cache_node_type: req.cache_node_type,
            transit_encryption_enabled: req.transit_encryption_enabled,
        };
        self.add_replication_group(group.clone(), req.tags);

        let mut reply = group;
        reply.status = "creating".to_string();
        for ng in &mut reply.node_groups {
            ng.primary_endpoint = None;
        }
        Ok(reply)
    }

    async fn modify_replication_group(
        &self,
        req: ModifyReplicationGroupRequest,
    ) -> CloudResult<ReplicationGroup> {
        self.call("modify_replication_group")?;
        self.group_modifies.lock().unwrap().push(req.clone());
        let mut groups = self.replication_groups.lock().unwrap();
        let group = groups
            .get_mut(&req.replication_group_id)
            .ok_or_else(|| not_found("replication group", &req.replication_group_id))?;
        if let Some(node_type) = req.cache_node_type {
            group.cache_node_type = Some(node_type);
        }
        Ok(group.clone())
    }

    async fn increase_replica_count(&self, req: ReplicaCountRequest) -> CloudResult<()> {
        self.call("increase_replica_count")?;
        self.replica_counts.lock().unwrap().push(req.clone());
        self.resize(&req)
    }

    async fn decrease_replica_count(&self, req: ReplicaCountRequest) -> CloudResult<()> {
        self.call("decrease_replica_count")?;
        self.replica_counts.lock().unwrap().push(req.clone());
        self.resize(&req)
    }

    async fn delete_replication_group(
        &self,
        id: &str,
        final_snapshot_identifier: Option<&str>,
    ) -> CloudResult<()> {
        self.call("delete_replication_group")?;
        self.final_snapshots
            .lock()
            .unwrap()
            .push(final_snapshot_identifier.map(str::to_string));
        self.replication_groups
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("replication group", id))
    }

    async fn describe_cache_cluster(&self, id: &str) -> CloudResult<CacheCluster> {
        self.call("describe_cache_cluster")?;
        self.cache_cluster(id)
            .ok_or_else(|| not_found("cache cluster", id))
    }

    async fn create_cache_cluster(
        &self,
        req: CreateCacheClusterRequest,
    ) -> CloudResult<CacheCluster> {
        self.call("create_cache_cluster")?;
        let id = req.cache_cluster_id.clone();
        let nodes = req.num_cache_nodes.unwrap_or(1);
        let cluster = CacheCluster {
            id: id.clone(),
            arn: format!("arn:cache:cluster:{}", id),
            status: "available".to_string(),
            engine: req.engine,
            engine_version: req.engine_version,
            cache_node_type: req.cache_node_type,
            num_cache_nodes: nodes,
            cache_nodes: (1..=nodes)
                .map(|n| CacheNode {
                    id: format!("{:04}", n),
                    create_time: created_at(n as i64),
                })
                .collect(),
            configuration_endpoint: Some(Endpoint {
                address: format!("{}.cfg.example.internal", id),
                port: req.port.unwrap_or(11211),
            }),
            auto_minor_version_upgrade: req.auto_minor_version_upgrade,
            transit_encryption_enabled: req.transit_encryption_enabled,
            cache_subnet_group_name: req.cache_subnet_group_name,
            security_group_ids: req.security_group_ids,
        };
        self.add_cache_cluster(cluster.clone(), req.tags);

        let mut reply = cluster;
        reply.status = "creating".to_string();
        reply.configuration_endpoint = None;
        Ok(reply)
    }

    async fn modify_cache_cluster(
        &self,
        req: ModifyCacheClusterRequest,
    ) -> CloudResult<CacheCluster> {
        self.call("modify_cache_cluster")?;
        self.cluster_modifies.lock().unwrap().push(req.clone());
        let mut clusters = self.cache_clusters.lock().unwrap();
        let cluster = clusters
            .get_mut(&req.cache_cluster_id)
            .ok_or_else(|| not_found("cache cluster", &req.cache_cluster_id))?;
        cluster
            .cache_nodes
            .retain(|node| !req.cache_node_ids_to_remove.contains(&node.id));
        if let Some(nodes) = req.num_cache_nodes {
            cluster.num_cache_nodes = nodes;
        }
        Ok(cluster.clone())
    }

    async fn delete_cache_cluster(&self, id: &str) -> CloudResult<()> {
        self.call("delete_cache_cluster")?;
        self.cache_clusters
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("cache cluster", id))
    }

    async fn list_tags_for_resource(&self, arn: &str) -> CloudResult<Vec<Tag>> {
        self.call("list_tags_for_resource")?;
        Ok(self
            .resource_tags
            .lock()
            .unwrap()
            .get(arn)
            .cloned()
            .unwrap_or_default())
    }
}

impl FakeCloud {
    fn resize(&self, req: &ReplicaCountRequest) -> CloudResult<()> {
        let mut groups = self.replication_groups.lock().unwrap();
        let group = groups
            .get_mut(&req.replication_group_id)
            .ok_or_else(|| not_found("replication group", &req.replication_group_id))?;
        if let Some(primary) = group.node_groups.first_mut() {
            primary.members = Self::members(&req.replication_group_id, req.new_replica_count + 1);
        }
        Ok(())
    }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

/// A fake cloud plus an in-memory state database.
pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub storage: Arc<SqliteStorage>,
}

impl Harness {
    pub fn new() -> Self {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.initialize().unwrap();
        Self {
            cloud: FakeCloud::new(),
            storage: Arc::new(storage),
        }
    }

    pub fn rds(&self) -> RdsProvisioner {
        RdsProvisioner::new(self.cloud.clone(), self.cloud.clone(), self.storage.clone())
            .with_waiter(fast_waiter())
            .with_password_length(24)
    }

    pub fn elasticache(&self) -> ElasticacheProvisioner {
        ElasticacheProvisioner::new(self.cloud.clone(), self.cloud.clone(), self.storage.clone())
            .with_waiter(fast_waiter())
    }

    pub fn clients(&self) -> CloudClients {
        CloudClients {
            network: self.cloud.clone(),
            database: self.cloud.clone(),
            cache: self.cloud.clone(),
        }
    }

    pub async fn state(&self, id: &str) -> Option<StateData> {
        match self.storage.get_state(id).await {
            Ok(bytes) => Some(StateData::load(&bytes).unwrap()),
            Err(_) => None,
        }
    }

    pub fn log_messages(&self, id: &str) -> Vec<String> {
        self.storage
            .state_logs(id)
            .unwrap()
            .into_iter()
            .map(|entry| entry.message)
            .collect()
    }
}
