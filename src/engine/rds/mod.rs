//! Relational database instances.

pub mod params;
pub mod requests;
pub mod status;

use std::sync::Arc;

use async_trait::async_trait;

use crate::cloud::rds::DbInstance;
use crate::cloud::{is_owned_by, CloudError, CloudResultExt, DatabaseApi, NetworkApi, Tag};
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
pub const OWNER_TAG: &str = "provisioner-rds";
pub const KIND: &str = "rds";

const DEPENDENT_KEYS: DependentKeys = DependentKeys {
    security_groups: VPC_SECURITY_GROUPS,
    subnet_group: DB_SUBNET_GROUP_NAME,
    subnet_ids: SUBNET_IDS,
    vpc: VPC,
    port: PORT,
};

pub struct RdsProvisioner {
    rds: Arc<dyn DatabaseApi>,
    network: Arc<dyn NetworkApi>,
    keeper: StateKeeper,
    waiter: WaiterSettings,
    password_length: usize,
    wait_for_deletion: bool,
}

/// The create call an install flavour ends with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Create {
    Instance,
    ReadReplica,
    FromSnapshot,
}

impl RdsProvisioner {
    pub fn new(
        rds: Arc<dyn DatabaseApi>,
        network: Arc<dyn NetworkApi>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        Self {
            rds,
            network,
            keeper: StateKeeper::new(storage, KIND),
            waiter: WaiterSettings::default(),
            password_length: super::password::DEFAULT_PASSWORD_LENGTH,
            wait_for_deletion: true,
        }
    }

    pub fn with_waiter(mut self, waiter: WaiterSettings) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_password_length(mut self, length: usize) -> Self {
        self.password_length = length;
        self
    }

    pub fn with_wait_for_deletion(mut self, wait: bool) -> Self {
        self.wait_for_deletion = wait;
        self
    }

    fn dependents(&self) -> Dependents<'_, dyn DatabaseApi> {
        Dependents {
            network: self.network.as_ref(),
            subnets: self.rds.as_ref(),
            owner_key: OWNER_TAG,
            prefix: "db",
            keys: DEPENDENT_KEYS,
        }
    }

    fn owner_tags(id: &str) -> Vec<Tag> {
        vec![Tag::new(OWNER_TAG, id)]
    }

    // ─── Install ────────────────────────────────────────────────────────────

    pub async fn install(&self, id: &str, options: &Options) -> Result<()> {
        self.install_as(id, options, Phase::Install).await
    }

    pub async fn install_read_replica(&self, id: &str, options: &Options) -> Result<()> {
        self.install_as(id, options, Phase::ReadReplica).await
    }

    pub async fn restore_from_snapshot(&self, id: &str, options: &Options) -> Result<()> {
        self.install_as(id, options, Phase::RestoreFromSnapshot).await
    }

    async fn install_as(&self, id: &str, options: &Options, phase: Phase) -> Result<()> {
        self.keeper.ensure_absent(id).await?;

        let parameters = params::plan(phase, id, options, self.password_length)?;
        tracing::info!(id, phase = %phase, "Generating the state data");
        let mut state = StateData::new(id, StateStatus::Provisioning, parameters);

        let create = match phase {
            Phase::ReadReplica => Create::ReadReplica,
            Phase::RestoreFromSnapshot => Create::FromSnapshot,
            _ => Create::Instance,
        };

        let mut plan = RollbackPlan::new(id);
        if let Err(e) = self.install_steps(&mut state, &mut plan, create).await {
            tracing::error!(id, error = %e, "Install failed");
            return Err(plan.execute(e, |action| self.undo(action)).await);
        }

        let message = match create {
            Create::Instance => "successfully installed db instance",
            Create::ReadReplica => "successfully installed db instance read replica",
            Create::FromSnapshot => "successfully restored db instance from snapshot",
        };
        tracing::info!(id, "{}, it may take some time to be available", message);
        self.keeper.log(id, message).await;
        Ok(())
    }

    async fn install_steps(
        &self,
        state: &mut StateData,
        plan: &mut RollbackPlan,
        create: Create,
    ) -> Result<()> {
        // A replica lives in its source's network.
        if create != Create::ReadReplica {
            let dependents = self.dependents();
            dependents.ensure_security_group(state, plan).await?;
            dependents.ensure_subnet_group(state, plan).await?;
        }

        let tags = Self::owner_tags(&state.id);
        tracing::info!(id = %state.id, "Creating db instance");
        let instance = match create {
            Create::Instance => {
                let req = requests::create_request(state, tags)?;
                self.rds
                    .create_db_instance(req)
                    .await
                    .during("create db instance")?
            }
            Create::ReadReplica => {
                let req = requests::read_replica_request(state, tags)?;
                self.rds
                    .create_db_instance_read_replica(req)
                    .await
                    .during("create db instance read replica")?
            }
            Create::FromSnapshot => {
                let req = requests::restore_request(state, tags)?;
                self.rds
                    .restore_db_instance_from_snapshot(req)
                    .await
                    .during("restore db instance from snapshot")?
            }
        };
        plan.record(CleanupAction::DbInstance(instance.identifier.clone()));

        if let Some(endpoint) = &instance.endpoint {
            state.host = endpoint.address.clone();
        }

        self.keeper.save(state).await
    }

    async fn undo(&self, action: CleanupAction) -> Result<()> {
        match &action {
            CleanupAction::DbInstance(identifier) => {
                let req = crate::cloud::rds::DeleteDbInstanceRequest {
                    db_instance_identifier: identifier.clone(),
                    skip_final_snapshot: true,
                    final_db_snapshot_identifier: None,
                };
                match self.rds.delete_db_instance(req).await {
                    Ok(()) | Err(CloudError::NotFound(_)) => {}
                    Err(e) => return Err(e).during("delete db instance"),
                }
                if self.wait_for_deletion {
                    self.wait_for_instance(identifier, self.deleted_conf()).await?;
                }
                Ok(())
            }
            _ => self.dependents().undo(&action).await,
        }
    }

    // ─── Update ─────────────────────────────────────────────────────────────

    pub async fn update(&self, id: &str, options: &Options) -> Result<()> {
        let mut state = self.keeper.load(id).await?;
        let table = update_table();

        let changed = apply_update_options(&mut state, options, &table, APPLY_IMMEDIATELY)?;

        if changed.is_empty() {
            tracing::info!(id, "No changes detected");
            self.keeper.log(id, "no changes detected").await;
            return Ok(());
        }

        tracing::info!(id, changed = %changed.join(", "), "Found changes in parameters");

        if changed.iter().any(|k| k == SOURCE_DB_INSTANCE_IDENTIFIER) {
            return Err(ProvisionError::ImmutableParameter {
                key: SOURCE_DB_INSTANCE_IDENTIFIER.to_string(),
            });
        }

        let apply_immediately = Fields(&state).boolean(APPLY_IMMEDIATELY)?.unwrap_or(true);
        let req = requests::modify_request(&state, &changed, apply_immediately)?;

        tracing::info!(id, "Updating db instance");
        self.rds
            .modify_db_instance(req)
            .await
            .during("modify db instance")?;

        state.status = StateStatus::Updating;
        self.keeper.save(&mut state).await?;

        tracing::info!(id, "Successfully applied the db updates");
        self.keeper.log(id, "successfully applied the db updates").await;
        Ok(())
    }

    // ─── Import ─────────────────────────────────────────────────────────────

    /// Adopt an existing instance. Only an earlier import may be replaced.
    pub async fn import(&self, id: &str, identifier: &str, options: &Options) -> Result<()> {
        let password = options
            .get(MASTER_USER_PASSWORD)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ProvisionError::missing(MASTER_USER_PASSWORD))?;

        let table = import_table();
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

        tracing::info!(id, identifier, "Fetching db instance details");
        let db = self.describe(identifier).await?;
        requests::import_parameters(&mut state, &db, password)?;

        for (key, value) in options {
            if !state.has_parameter(key) {
                state.add_imported_parameter(key, Some(value.clone()), &table)?;
            }
        }

        self.keeper.save(&mut state).await?;
        tracing::info!(id, "Successfully imported db instance");
        self.keeper.log(id, "successfully imported db instance").await;
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

        let dependents = self.dependents();
        let mut failures = Vec::new();

        if let Err(e) = self.delete_instance_if_managed(&state).await {
            tracing::error!(id, error = %e, "Failed to delete db instance");
            failures.push(format!("db instance: {}", e));
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
        tracing::info!(id, "Uninstalled the db resources");
        Ok(())
    }

    async fn delete_instance_if_managed(&self, state: &StateData) -> Result<()> {
        let identifier = state.parameter_value(DB_INSTANCE_IDENTIFIER)?;
        let instance = match self.rds.describe_db_instance(&identifier).await {
            Ok(instance) => instance,
            Err(CloudError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e).during("describe db instance"),
        };

        if !is_owned_by(&instance.tags, OWNER_TAG, &state.id) {
            tracing::info!(id = %state.id, identifier = %identifier, "Db instance is not managed, skipping");
            return Ok(());
        }

        tracing::info!(id = %state.id, identifier = %identifier, "Deleting db instance");
        let req = requests::delete_request(&instance, chrono::Utc::now().timestamp());
        match self.rds.delete_db_instance(req).await {
            Ok(()) | Err(CloudError::NotFound(_)) => {}
            Err(e) => return Err(e).during("delete db instance"),
        }

        if self.wait_for_deletion {
            self.wait_for_instance(&identifier, self.deleted_conf())
                .await?;
        }
        Ok(())
    }

    // ─── Status ─────────────────────────────────────────────────────────────

    async fn describe(&self, identifier: &str) -> Result<DbInstance> {
        self.rds
            .describe_db_instance(identifier)
            .await
            .during("describe db instance")
    }

    async fn instance_status(&self, identifier: &str) -> Result<Option<String>> {
        match self.rds.describe_db_instance(identifier).await {
            Ok(instance) => Ok(Some(instance.status)),
            Err(CloudError::NotFound(_)) => Ok(None),
            Err(e) => Err(e).during("describe db instance"),
        }
    }

    fn deleted_conf(&self) -> StatusWaiterConf {
        self.waiter.conf(status::DELETE_PENDING, status::DELETED)
    }

    fn available_conf(&self, state: &StateData) -> StatusWaiterConf {
        match state.status {
            StateStatus::Updating | StateStatus::UpdateSucceeded => {
                self.waiter.conf(status::UPDATE_PENDING, status::AVAILABLE)
            }
            _ => self.waiter.conf(status::CREATE_PENDING, status::AVAILABLE),
        }
    }

    async fn wait_for_instance(&self, identifier: &str, conf: StatusWaiterConf) -> Result<()> {
        wait_until_target_status(identifier, &conf, || self.instance_status(identifier)).await
    }

    /// Block until the instance reports an available status, then record the
    /// settled lifecycle status.
    pub async fn wait_until_available(&self, id: &str) -> Result<()> {
        let mut state = self.keeper.load(id).await?;
        let identifier = state.parameter_value(DB_INSTANCE_IDENTIFIER)?;

        tracing::info!(id, "Waiting for db instance to be available");
        self.wait_for_instance(&identifier, self.available_conf(&state))
            .await?;
        tracing::info!(id, "Db instance is now available");

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
        let identifier = state.parameter_value(DB_INSTANCE_IDENTIFIER)?;
        Ok(self.describe(&identifier).await?.status)
    }

    // ─── Connection info ────────────────────────────────────────────────────

    pub async fn connection_info(&self, id: &str) -> Result<ConnectionInfo> {
        let mut state = self.keeper.load(id).await?;

        if state.host.is_empty() {
            let identifier = state.parameter_value(DB_INSTANCE_IDENTIFIER)?;
            self.wait_for_instance(&identifier, self.available_conf(&state))
                .await?;

            let db = self.describe(&identifier).await?;
            let endpoint = db.endpoint.ok_or_else(|| {
                ProvisionError::NotFound(format!("endpoint of db instance {}", identifier))
            })?;
            let username = db.master_username.ok_or_else(|| {
                ProvisionError::NotFound(format!("master username of db instance {}", identifier))
            })?;

            let table = install_table();
            state.host = endpoint.address;
            set_discovered(&mut state, PORT, &endpoint.port.to_string(), &table)?;
            set_discovered(&mut state, MASTER_USERNAME, &username, &table)?;
            set_discovered(&mut state, DB_NAME, &db.db_name.unwrap_or_default(), &table)?;
            state.status = state.status.settled();
            self.keeper.save(&mut state).await?;
        }

        let f = Fields(&state);
        Ok(ConnectionInfo {
            host: state.host.clone(),
            port: f.int(PORT)?.unwrap_or_default(),
            username: f.string(MASTER_USERNAME).unwrap_or_default(),
            password: f.string(MASTER_USER_PASSWORD).unwrap_or_default(),
            database: f.string(DB_NAME).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Provisioner for RdsProvisioner {
    fn name(&self) -> &'static str {
        KIND
    }

    async fn provision(&self, id: &str, options: &Options) -> Result<()> {
        if self.keeper.find(id).await?.is_some() {
            tracing::info!(id, "Start db instance update");
            return self.update(id, options).await;
        }

        match install_phase(options) {
            Phase::ReadReplica => {
                tracing::info!(id, "Start provision for db replica");
                self.install_read_replica(id, options).await
            }
            Phase::RestoreFromSnapshot => {
                tracing::info!(id, "Start provision for db instance from snapshot");
                self.restore_from_snapshot(id, options).await
            }
            _ => {
                tracing::info!(id, "Start provision for db instance");
                self.install(id, options).await
            }
        }
    }

    async fn import(&self, id: &str, identifier: &str, options: &Options) -> Result<()> {
        RdsProvisioner::import(self, id, identifier, options).await
    }

    async fn uninstall(&self, id: &str) -> Result<()> {
        RdsProvisioner::uninstall(self, id).await
    }

    async fn connection_info(&self, id: &str) -> Result<ConnectionInfo> {
        RdsProvisioner::connection_info(self, id).await
    }
}
