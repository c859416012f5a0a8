//! Security groups and subnet groups that a managed resource needs but the
//! caller did not supply.
//!
//! Everything created here carries the ownership tag `{owner_key: state.id}`
//! and is found again by that tag, so a retried install adopts what an
//! earlier attempt left behind instead of creating a duplicate. Teardown only
//! ever touches groups whose ownership tag matches.

use crate::cloud::network::{IngressRule, NetworkApi};
use crate::cloud::{is_owned_by, CloudError, CloudResultExt, SubnetGroupApi, Tag};
use crate::error::{ProvisionError, Result};
use crate::state::StateData;

use super::naming;
use super::rollback::{CleanupAction, RollbackPlan};

/// Parameter keys a resource kind uses for its dependent resources.
#[derive(Debug, Clone, Copy)]
pub struct DependentKeys {
    pub security_groups: &'static str,
    pub subnet_group: &'static str,
    pub subnet_ids: &'static str,
    pub vpc: &'static str,
    pub port: &'static str,
}

pub struct Dependents<'a, S: SubnetGroupApi + ?Sized> {
    pub network: &'a dyn NetworkApi,
    pub subnets: &'a S,
    pub owner_key: &'static str,
    /// Name prefix for created groups, e.g. `db` or `cache`.
    pub prefix: &'static str,
    pub keys: DependentKeys,
}

impl<'a, S: SubnetGroupApi + ?Sized> Dependents<'a, S> {
    fn owner_tags(&self, id: &str) -> Vec<Tag> {
        vec![Tag::new(self.owner_key, id)]
    }

    pub async fn ensure_security_group(
        &self,
        state: &mut StateData,
        plan: &mut RollbackPlan,
    ) -> Result<()> {
        let key = self.keys.security_groups;
        if state.parameter_value_opt(key).is_some() {
            tracing::info!(id = %state.id, "Security group is provided, using it");
            return Ok(());
        }

        tracing::debug!(id = %state.id, "Checking for a previously created security group");
        let existing = self
            .network
            .find_security_groups_by_tags(&self.owner_tags(&state.id))
            .await
            .during("describe security groups")?;

        if let Some(sg) = existing
            .iter()
            .find(|sg| is_owned_by(&sg.tags, self.owner_key, &state.id))
        {
            tracing::info!(id = %state.id, group_id = %sg.id, "Adopting existing security group");
            plan.record(CleanupAction::SecurityGroup(sg.id.clone()));
            return state.initialize_parameter_value(key, &sg.id);
        }

        let vpc_id = state
            .parameter_value_opt(self.keys.vpc)
            .ok_or_else(|| ProvisionError::missing(self.keys.vpc))?;
        let port = state
            .parameter_i32(self.keys.port)?
            .ok_or_else(|| ProvisionError::missing(self.keys.port))?;

        let cidr = self
            .network
            .vpc_cidr(&vpc_id)
            .await
            .during("describe vpc")?;

        let name = naming::security_group_name(self.prefix, &state.id);
        tracing::info!(id = %state.id, name = %name, vpc = %vpc_id, "Creating security group");
        let group_id = self
            .network
            .create_security_group(
                &name,
                &format!("{} access for {}", self.prefix, state.id),
                &vpc_id,
                &self.owner_tags(&state.id),
            )
            .await
            .during("create security group")?;
        plan.record(CleanupAction::SecurityGroup(group_id.clone()));

        self.network
            .authorize_ingress(
                &group_id,
                &IngressRule::tcp(port, &cidr, "access from within the vpc"),
            )
            .await
            .during("authorize security group ingress")?;

        state.initialize_parameter_value(key, &group_id)
    }

    pub async fn ensure_subnet_group(
        &self,
        state: &mut StateData,
        plan: &mut RollbackPlan,
    ) -> Result<()> {
        let key = self.keys.subnet_group;
        if state.parameter_value_opt(key).is_some() {
            tracing::info!(id = %state.id, "Subnet group is provided, using it");
            return Ok(());
        }

        let name = naming::subnet_group_name(self.prefix, &state.id);
        match self.subnets.describe_subnet_group(&name).await {
            Ok(group) => {
                if !is_owned_by(&group.tags, self.owner_key, &state.id) {
                    return Err(ProvisionError::NotOwned {
                        resource: format!("subnet group {}", name),
                        owner: state.id.clone(),
                    });
                }
                tracing::info!(id = %state.id, name = %name, "Adopting existing subnet group");
                plan.record(CleanupAction::SubnetGroup(name.clone()));
                return state.initialize_parameter_value(key, &name);
            }
            Err(CloudError::NotFound(_)) => {}
            Err(e) => return Err(e).during("describe subnet group"),
        }

        let subnet_ids = state
            .parameter_string_list(self.keys.subnet_ids)?
            .filter(|ids| ids.iter().any(|s| !s.is_empty()))
            .ok_or_else(|| ProvisionError::missing(self.keys.subnet_ids))?;

        tracing::info!(id = %state.id, name = %name, "Creating subnet group");
        let group = self
            .subnets
            .create_subnet_group(
                &name,
                &format!("{} subnet group for {}", self.prefix, state.id),
                &subnet_ids,
                &self.owner_tags(&state.id),
            )
            .await
            .during("create subnet group")?;
        plan.record(CleanupAction::SubnetGroup(group.name.clone()));

        state.initialize_parameter_value(key, &group.name)
    }

    /// Delete every security group tagged as owned by `id`.
    pub async fn delete_security_groups_if_managed(&self, id: &str) -> Result<()> {
        let groups = self
            .network
            .find_security_groups_by_tags(&self.owner_tags(id))
            .await
            .during("describe security groups")?;

        for sg in groups
            .iter()
            .filter(|sg| is_owned_by(&sg.tags, self.owner_key, id))
        {
            tracing::info!(id, group_id = %sg.id, "Deleting security group");
            match self.network.delete_security_group(&sg.id).await {
                Ok(()) | Err(CloudError::NotFound(_)) => {}
                Err(e) => return Err(e).during("delete security group"),
            }
        }
        Ok(())
    }

    /// Delete the subnet group recorded in `state` if it carries our tag.
    pub async fn delete_subnet_group_if_managed(&self, state: &StateData) -> Result<()> {
        let Some(name) = state.parameter_value_opt(self.keys.subnet_group) else {
            return Ok(());
        };

        let group = match self.subnets.describe_subnet_group(&name).await {
            Ok(group) => group,
            Err(CloudError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e).during("describe subnet group"),
        };

        if !is_owned_by(&group.tags, self.owner_key, &state.id) {
            tracing::info!(id = %state.id, name = %name, "Subnet group is not managed, skipping");
            return Ok(());
        }

        tracing::info!(id = %state.id, name = %name, "Deleting subnet group");
        match self.subnets.delete_subnet_group(&name).await {
            Ok(()) | Err(CloudError::NotFound(_)) => Ok(()),
            Err(e) => Err(e).during("delete subnet group"),
        }
    }

    /// Compensating actions for the dependent resources.
    pub async fn undo(&self, action: &CleanupAction) -> Result<()> {
        let result = match action {
            CleanupAction::SecurityGroup(group_id) => {
                self.network.delete_security_group(group_id).await
            }
            CleanupAction::SubnetGroup(name) => self.subnets.delete_subnet_group(name).await,
            _ => return Ok(()),
        };
        match result {
            Ok(()) | Err(CloudError::NotFound(_)) => Ok(()),
            Err(e) => Err(e).during(&format!("delete {}", action)),
        }
    }
}
