//! Managed caches: redis replication groups and memcached clusters.
//!
//! One provisioner serves both engines. The engine is taken from the
//! `Engine` option on install and import, and from stored state afterwards.

mod cache_cluster;
pub mod params;
mod replication_group;
pub mod requests;
pub mod status;

use std::sync::Arc;

use async_trait::async_trait;

use crate::cloud::{CacheApi, CloudError, CloudResultExt, Endpoint, NetworkApi, Tag};
use crate::error::{ProvisionError, Result};
use crate::params::Phase;
use crate::state::{StateData, StateStatus, StateStorage};

use super::dependent::{DependentKeys, Dependents};
use super::keeper::StateKeeper;
use super::rollback::{CleanupAction, RollbackPlan};
use super::waiter::{wait_until_target_status, StatusWaiterConf, WaiterSettings};
use super::{apply_update_options, set_discovered, ConnectionInfo, Fields, Options, Provisioner};
use params::*;

/// Ownership tag key written on every resource this provisioner creates.
pub const OWNER_TAG: &str = "provisioner-elasticache";
pub const KIND: &str = "elasticache";

const DEPENDENT_KEYS: DependentKeys = DependentKeys {
    security_groups: SECURITY_GROUP_IDS,
    subnet_group: CACHE_SUBNET_GROUP_NAME,
    subnet_ids: SUBNET_IDS,
    vpc: VPC,
    port: PORT,
};

pub struct ElasticacheProvisioner {
    cache: Arc<dyn CacheApi>,
    network: Arc<dyn NetworkApi>,
    keeper: StateKeeper,
    waiter: WaiterSettings,
    wait_for_deletion: bool,
}

/// Engine named by the caller's `Engine` option.
fn requested_engine(options: &Options) -> Result<CacheEngine> {
    let engine = options
        .get(ENGINE)
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ProvisionError::missing(ENGINE))?;
    CacheEngine::parse(engine)
}

fn stored_engine(state: &StateData) -> Result<CacheEngine> {
    CacheEngine::parse(&state.parameter_value(ENGINE)?)
}

impl ElasticacheProvisioner {
    pub fn new(
        cache: Arc<dyn CacheApi>,
        network: Arc<dyn NetworkApi>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        Self {
            cache,
            network,
            keeper: StateKeeper::new(storage, KIND),
            waiter: WaiterSettings::default(),
            wait_for_deletion: true,
        }
    }

    pub fn with_waiter(mut self, waiter: WaiterSettings) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_wait_for_deletion(mut self, wait: bool) -> Self {
        self.wait_for_deletion = wait;
        self
    }

    fn dependents(&self) -> Dependents<'_, dyn CacheApi> {
        Dependents {
            network: self.network.as_ref(),
            subnets: self.cache.as_ref(),
            owner_key: OWNER_TAG,
            prefix: "cache",
            keys: DEPENDENT_KEYS,
        }
    }

    fn owner_tags(id: &str) -> Vec<Tag> {
        vec![Tag::new(OWNER_TAG, id)]
    }

    // ─── Install ────────────────────────────────────────────────────────────

    pub async fn install(&self, id: &str, options: &Options) -> Result<()> {
        self.keeper.ensure_absent(id).await?;

        let engine = requested_engine(options)?;
        let parameters = plan_install(engine.as_str(), id, options)?;
        tracing::info!(id, engine = %engine, "Generating the state data");
        let mut state = StateData::new(id, StateStatus::Provisioning, parameters);

        let mut plan = RollbackPlan::new(id);
        if let Err(e) = self.install_steps(engine, &mut state, &mut plan).await {
            tracing::error!(id, error = %e, "Install failed");
            return Err(plan.execute(e, |action| self.undo(action)).await);
        }

        let message = match engine {
            CacheEngine::Redis => "successfully installed replication group",
            CacheEngine::Memcached => "successfully installed cache cluster",
        };
        tracing::info!(id, "{}, it may take some time to be available", message);
        self.keeper.log(id, message).await;
        Ok(())
    }

    async fn install_steps(
        &self,
        engine: CacheEngine,
        state: &mut StateData,
        plan: &mut RollbackPlan,
    ) -> Result<()> {
        let dependents = self.dependents();
        dependents.ensure_security_group(state, plan).await?;
        dependents.ensure_subnet_group(state, plan).await?;

        let endpoint = match engine {
            CacheEngine::Redis => self.create_replication_group(state, plan).await?,
            CacheEngine::Memcached => self.create_cache_cluster(state, plan).await?,
        };
        if let Some(endpoint) = endpoint {
            state.host = endpoint.address;
        }

        self.keeper.save(state).await
    }

    async fn undo(&self, action: CleanupAction) -> Result<()> {
        match &action {
            CleanupAction::ReplicationGroup(group_id) => {
                match self.cache.delete_replication_group(group_id, None).await {
                    Ok(()) | Err(CloudError::NotFound(_)) => {}
                    Err(e) => return Err(e).during("delete replication group"),
                }
                self.wait_for_deletion_of(CacheEngine::Redis, group_id).await
            }
            CleanupAction::CacheCluster(cluster_id) => {
                match self.cache.delete_cache_cluster(cluster_id).await {
                    Ok(()) | Err(CloudError::NotFound(_)) => {}
                    Err(e) => return Err(e).during("delete cache cluster"),
                }
                self.wait_for_deletion_of(CacheEngine::Memcached, cluster_id)
                    .await
            }
            _ => self.dependents().undo(&action).await,
        }
    }

    // ─── Update ─────────────────────────────────────────────────────────────

    pub async fn update(&self, id: &str, options: &Options) -> Result<()> {
        let mut state = self.keeper.load(id).await?;
        let engine = stored_engine(&state)?;
        let table = engine.table(Phase::Update)?;

        let changed = apply_update_options(&mut state, options, &table, APPLY_IMMEDIATELY)?;
        if changed.is_empty() {
            tracing::info!(id, "No changes detected");
            self.keeper.log(id, "no changes detected").await;
            return Ok(());
        }

        tracing::info!(id, changed = %changed.join(", "), "Found changes in parameters");
        validate_values(engine, |key| state.parameter_value_opt(key))?;

        let apply_immediately = Fields(&state).boolean(APPLY_IMMEDIATELY)?.unwrap_or(true);
        match engine {
            CacheEngine::Redis => {
                self.update_replication_group(&state, &changed, apply_immediately)
                    .await?
            }
            CacheEngine::Memcached => {
                self.update_cache_cluster(&state, &changed, apply_immediately)
                    .await?
            }
        }

        state.status = StateStatus::Updating;
        self.keeper.save(&mut state).await?;

        tracing::info!(id, "Successfully applied the cache updates");
        self.keeper
            .log(id, "successfully applied the cache updates")
            .await;
        Ok(())
    }

    // ─── Import ─────────────────────────────────────────────────────────────

    /// Adopt an existing replication group or cache cluster. Only an
    /// earlier import may be replaced.
    pub async fn import(&self, id: &str, identifier: &str, options: &Options) -> Result<()> {
        let engine = requested_engine(options)?;
        let table = import_table(engine);
        if let Some(key) = options.keys().find(|k| !table.contains_key(k.as_str())) {
            return Err(ProvisionError::UnsupportedParameter { key: key.clone() });
        }

        let mut state = StateData::new_imported(id);
        if let Some(existing) = self.keeper.find(id).await? {
            if !existing.imported {
                return Err(ProvisionError::AlreadyProvisioned(id.to_string()));
            }
            state.revision = existing.revision;
        }

        match engine {
            CacheEngine::Redis => {
                tracing::info!(id, identifier, "Fetching replication group details");
                let group = self.describe_replication_group(identifier).await?;
                let token = options.get(AUTH_TOKEN).map(String::as_str);
                requests::import_replication_group(&mut state, &group, token)?;
            }
            CacheEngine::Memcached => {
                tracing::info!(id, identifier, "Fetching cache cluster details");
                let cluster = self.describe_cache_cluster(identifier).await?;
                requests::import_cache_cluster(&mut state, &cluster)?;
            }
        }

        for (key, value) in options {
            if !state.has_parameter(key) {
                state.add_imported_parameter(key, Some(value.clone()), &table)?;
            }
        }

        self.keeper.save(&mut state).await?;
        tracing::info!(id, engine = %engine, "Successfully imported cache resource");
        self.keeper
            .log(id, "successfully imported cache resource")
            .await;
        Ok(())
    }

    // ─── Uninstall ──────────────────────────────────────────────────────────

    /// Tear down everything this provisioner owns for `id`. Every step runs
    /// even if an earlier one fails; state is removed only when all succeed.
    pub async fn uninstall(&self, id: &str) -> Result<()> {
        let state = self.keeper.load(id).await?;

        if state.deletion_protected(DELETION_PROTECTION) {
            tracing::info!(id, "Deletion protection is enabled, skipping uninstall");
            self.keeper
                .log(id, "deletion protection is enabled, nothing was deleted")
                .await;
            return Ok(());
        }
        if state.locked {
            tracing::warn!(id, reason = %state.locked_reason, "Uninstalling a locked state");
        }

        let engine = stored_engine(&state)?;
        let dependents = self.dependents();
        let mut failures = Vec::new();

        let deleted = match engine {
            CacheEngine::Redis => self.delete_replication_group_if_managed(&state).await,
            CacheEngine::Memcached => self.delete_cache_cluster_if_managed(&state).await,
        };
        if let Err(e) = deleted {
            tracing::error!(id, error = %e, "Failed to delete cache resource");
            failures.push(format!("{}: {}", engine, e));
        }
        if let Err(e) = dependents.delete_security_groups_if_managed(id).await {
            tracing::error!(id, error = %e, "Failed to delete security group");
            failures.push(format!("security group: {}", e));
        }
        if let Err(e) = dependents.delete_subnet_group_if_managed(&state).await {
            tracing::error!(id, error = %e, "Failed to delete subnet group");
            failures.push(format!("subnet group: {}", e));
        }

        if !failures.is_empty() {
            return Err(ProvisionError::TeardownFailed {
                id: id.to_string(),
                failures,
            });
        }

        self.keeper.delete(id).await?;
        tracing::info!(id, "Uninstalled the cache resources");
        Ok(())
    }

    /// True when the resource carries our ownership tag for `id`.
    async fn is_managed(&self, arn: &str, id: &str) -> Result<bool> {
        let tags = self
            .cache
            .list_tags_for_resource(arn)
            .await
            .during("list tags for resource")?;
        Ok(crate::cloud::is_owned_by(&tags, OWNER_TAG, id))
    }

    // ─── Status ─────────────────────────────────────────────────────────────

    async fn resource_status(&self, engine: CacheEngine, identifier: &str) -> Result<Option<String>> {
        let result = match engine {
            CacheEngine::Redis => self
                .cache
                .describe_replication_group(identifier)
                .await
                .map(|g| g.status),
            CacheEngine::Memcached => self
                .cache
                .describe_cache_cluster(identifier)
                .await
                .map(|c| c.status),
        };
        match result {
            Ok(status) => Ok(Some(status)),
            Err(CloudError::NotFound(_)) => Ok(None),
            Err(e) => Err(e).during(&format!("describe {}", engine)),
        }
    }

    fn available_conf(&self, engine: CacheEngine) -> StatusWaiterConf {
        let pending = match engine {
            CacheEngine::Redis => status::REPLICATION_GROUP_PENDING,
            CacheEngine::Memcached => status::CACHE_CLUSTER_PENDING,
        };
        self.waiter.conf(pending, status::AVAILABLE)
    }

    async fn wait_for(
        &self,
        engine: CacheEngine,
        identifier: &str,
        conf: StatusWaiterConf,
    ) -> Result<()> {
        wait_until_target_status(identifier, &conf, || {
            self.resource_status(engine, identifier)
        })
        .await
    }

    async fn wait_for_deletion_of(&self, engine: CacheEngine, identifier: &str) -> Result<()> {
        if !self.wait_for_deletion {
            return Ok(());
        }
        let conf = self.waiter.conf(status::DELETE_PENDING, status::DELETED);
        self.wait_for(engine, identifier, conf).await
    }

    /// Block until the resource reports an available status, then record
    /// the settled lifecycle status.
    pub async fn wait_until_available(&self, id: &str) -> Result<()> {
        let mut state = self.keeper.load(id).await?;
        let engine = stored_engine(&state)?;
        let identifier = state.parameter_value(engine.id_key())?;

        tracing::info!(id, engine = %engine, "Waiting for cache resource to be available");
        self.wait_for(engine, &identifier, self.available_conf(engine))
            .await?;
        tracing::info!(id, "Cache resource is now available");

        let settled = state.status.settled();
        if settled != state.status {
            state.status = settled;
            self.keeper.save(&mut state).await?;
        }
        Ok(())
    }

    pub async fn is_available(&self, id: &str) -> Result<bool> {
        let status = self.status(id).await?;
        Ok(status::is_available(&status))
    }

    pub async fn status(&self, id: &str) -> Result<String> {
        let state = self.keeper.load(id).await?;
        let engine = stored_engine(&state)?;
        let identifier = state.parameter_value(engine.id_key())?;
        self.resource_status(engine, &identifier)
            .await?
            .ok_or_else(|| ProvisionError::NotFound(format!("{} {}", engine, identifier)))
    }

    // ─── Connection info ────────────────────────────────────────────────────

    pub async fn connection_info(&self, id: &str) -> Result<ConnectionInfo> {
        let mut state = self.keeper.load(id).await?;
        let engine = stored_engine(&state)?;

        if state.host.is_empty() {
            let identifier = state.parameter_value(engine.id_key())?;
            self.wait_for(engine, &identifier, self.available_conf(engine))
                .await?;

            let endpoint: Endpoint = match engine {
                CacheEngine::Redis => self.replication_group_endpoint(&identifier).await?,
                CacheEngine::Memcached => self.cache_cluster_endpoint(&identifier).await?,
            };

            state.host = endpoint.address;
            let table = engine.table(Phase::Install)?;
            set_discovered(&mut state, PORT, &endpoint.port.to_string(), &table)?;
            state.status = state.status.settled();
            self.keeper.save(&mut state).await?;
        }

        let f = Fields(&state);
        let password = match engine {
            CacheEngine::Redis => f.string(AUTH_TOKEN).unwrap_or_default(),
            CacheEngine::Memcached => String::new(),
        };
        Ok(ConnectionInfo {
            host: state.host.clone(),
            port: f.int(PORT)?.unwrap_or_default(),
            password,
            ..ConnectionInfo::default()
        })
    }
}

#[async_trait]
impl Provisioner for ElasticacheProvisioner {
    fn name(&self) -> &'static str {
        KIND
    }

    async fn provision(&self, id: &str, options: &Options) -> Result<()> {
        if self.keeper.find(id).await?.is_some() {
            tracing::info!(id, "Start cache update");
            return self.update(id, options).await;
        }
        tracing::info!(id, "Start provision for cache");
        self.install(id, options).await
    }

    async fn import(&self, id: &str, identifier: &str, options: &Options) -> Result<()> {
        ElasticacheProvisioner::import(self, id, identifier, options).await
    }

    async fn uninstall(&self, id: &str) -> Result<()> {
        ElasticacheProvisioner::uninstall(self, id).await
    }

    async fn connection_info(&self, id: &str) -> Result<ConnectionInfo> {
        ElasticacheProvisioner::connection_info(self, id).await
    }
}
