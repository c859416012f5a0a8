use crate::cloud::elasticache::{ReplicaCountRequest, ReplicationGroup};
use crate::cloud::{CloudError, CloudResultExt, Endpoint};
use crate::error::{ProvisionError, Result};
use crate::state::StateData;

use super::super::rollback::{CleanupAction, RollbackPlan};
use super::params::*;
use super::{requests, ElasticacheProvisioner};

impl ElasticacheProvisioner {
    pub(super) async fn describe_replication_group(&self, group_id: &str) -> Result<ReplicationGroup> {
        self.cache
            .describe_replication_group(group_id)
            .await
            .during("describe replication group")
    }

    /// Returns the primary endpoint when the cloud already reports one.
    pub(super) async fn create_replication_group(
        &self,
        state: &StateData,
        plan: &mut RollbackPlan,
    ) -> Result<Option<Endpoint>> {
        let req = requests::create_replication_group_request(state, Self::owner_tags(&state.id))?;
        tracing::info!(id = %state.id, group_id = %req.replication_group_id, "Creating replication group");
        let group = self
            .cache
            .create_replication_group(req)
            .await
            .during("create replication group")?;
        plan.record(CleanupAction::ReplicationGroup(group.id.clone()));

        Ok(group
            .node_groups
            .into_iter()
            .next()
            .and_then(|ng| ng.primary_endpoint))
    }

    /// A replica count change goes through its own call; the modify call
    /// is skipped when nothing else changed.
    pub(super) async fn update_replication_group(
        &self,
        state: &StateData,
        changed: &[String],
        apply_immediately: bool,
    ) -> Result<()> {
        let group_id = state.parameter_value(REPLICATION_GROUP_ID)?;
        let remaining: Vec<String> = changed
            .iter()
            .filter(|k| k.as_str() != NUM_CACHE_CLUSTERS)
            .cloned()
            .collect();

        if remaining.len() != changed.len() {
            let desired = state
                .parameter_i32(NUM_CACHE_CLUSTERS)?
                .ok_or_else(|| ProvisionError::missing(NUM_CACHE_CLUSTERS))?;
            self.resize_replication_group(&group_id, desired, apply_immediately)
                .await?;
        }

        if remaining.is_empty() {
            return Ok(());
        }

        let req = requests::modify_replication_group_request(state, &remaining, apply_immediately)?;
        tracing::info!(id = %state.id, group_id = %group_id, "Modifying replication group");
        self.cache
            .modify_replication_group(req)
            .await
            .during("modify replication group")?;
        Ok(())
    }

    async fn resize_replication_group(
        &self,
        group_id: &str,
        desired: i32,
        apply_immediately: bool,
    ) -> Result<()> {
        if desired < 1 {
            return Err(ProvisionError::invalid(
                NUM_CACHE_CLUSTERS,
                "a replication group needs at least one node",
            ));
        }

        let group = self.describe_replication_group(group_id).await?;
        let primary = group.node_groups.first().ok_or_else(|| {
            ProvisionError::NotFound(format!("node groups of replication group {}", group_id))
        })?;
        let current = primary.members.len() as i32;

        let req = ReplicaCountRequest {
            replication_group_id: group_id.to_string(),
            new_replica_count: desired - 1,
            apply_immediately,
        };
        if desired > current {
            tracing::info!(group_id, current, desired, "Increasing replica count");
            self.cache
                .increase_replica_count(req)
                .await
                .during("increase replica count")?;
        } else if desired < current {
            tracing::info!(group_id, current, desired, "Decreasing replica count");
            self.cache
                .decrease_replica_count(req)
                .await
                .during("decrease replica count")?;
        } else {
            tracing::debug!(group_id, current, "Replica count already matches");
        }
        Ok(())
    }

    pub(super) async fn delete_replication_group_if_managed(&self, state: &StateData) -> Result<()> {
        let group_id = state.parameter_value(REPLICATION_GROUP_ID)?;
        let group = match self.cache.describe_replication_group(&group_id).await {
            Ok(group) => group,
            Err(CloudError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e).during("describe replication group"),
        };

        if !self.is_managed(&group.arn, &state.id).await? {
            tracing::info!(id = %state.id, group_id = %group_id, "Replication group is not managed, skipping");
            return Ok(());
        }

        let snapshot = requests::final_snapshot_name(&group_id, chrono::Utc::now().timestamp());
        tracing::info!(id = %state.id, group_id = %group_id, snapshot = %snapshot, "Deleting replication group");
        match self
            .cache
            .delete_replication_group(&group_id, Some(&snapshot))
            .await
        {
            Ok(()) | Err(CloudError::NotFound(_)) => {}
            Err(e) => return Err(e).during("delete replication group"),
        }

        self.wait_for_deletion_of(CacheEngine::Redis, &group_id)
            .await
    }

    pub(super) async fn replication_group_endpoint(&self, group_id: &str) -> Result<Endpoint> {
        let group = self.describe_replication_group(group_id).await?;
        group
            .node_groups
            .into_iter()
            .next()
            .and_then(|ng| ng.primary_endpoint)
            .ok_or_else(|| {
                ProvisionError::NotFound(format!("primary endpoint of replication group {}", group_id))
            })
    }
}
