use crate::cloud::elasticache::CacheCluster;
use crate::cloud::{CloudError, CloudResultExt, Endpoint};
use crate::error::{ProvisionError, Result};
use crate::state::StateData;

use super::super::rollback::{CleanupAction, RollbackPlan};
use super::params::*;
use super::{requests, ElasticacheProvisioner};

impl ElasticacheProvisioner {
    pub(super) async fn describe_cache_cluster(&self, cluster_id: &str) -> Result<CacheCluster> {
        self.cache
            .describe_cache_cluster(cluster_id)
            .await
            .during("describe cache cluster")
    }

    pub(super) async fn create_cache_cluster(
        &self,
        state: &StateData,
        plan: &mut RollbackPlan,
    ) -> Result<Option<Endpoint>> {
        let req = requests::create_cache_cluster_request(state, Self::owner_tags(&state.id))?;
        tracing::info!(id = %state.id, cluster_id = %req.cache_cluster_id, "Creating cache cluster");
        let cluster = self
            .cache
            .create_cache_cluster(req)
            .await
            .during("create cache cluster")?;
        plan.record(CleanupAction::CacheCluster(cluster.id.clone()));
        Ok(cluster.configuration_endpoint)
    }

    /// Shrinking names the nodes to drop; the newest go first.
    pub(super) async fn update_cache_cluster(
        &self,
        state: &StateData,
        changed: &[String],
        apply_immediately: bool,
    ) -> Result<()> {
        let cluster_id = state.parameter_value(CACHE_CLUSTER_ID)?;

        let mut to_remove = Vec::new();
        if changed.iter().any(|k| k == NUM_CACHE_NODES) {
            let desired = state
                .parameter_i32(NUM_CACHE_NODES)?
                .ok_or_else(|| ProvisionError::missing(NUM_CACHE_NODES))?;
            if desired < 1 {
                return Err(ProvisionError::invalid(
                    NUM_CACHE_NODES,
                    "a cache cluster needs at least one node",
                ));
            }
            let cluster = self.describe_cache_cluster(&cluster_id).await?;
            to_remove = requests::nodes_to_remove(&cluster, desired);
            if !to_remove.is_empty() {
                tracing::info!(cluster_id = %cluster_id, nodes = %to_remove.join(", "), "Removing cache nodes");
            }
        }

        let req =
            requests::modify_cache_cluster_request(state, changed, apply_immediately, to_remove)?;
        tracing::info!(id = %state.id, cluster_id = %cluster_id, "Modifying cache cluster");
        self.cache
            .modify_cache_cluster(req)
            .await
            .during("modify cache cluster")?;
        Ok(())
    }

    pub(super) async fn delete_cache_cluster_if_managed(&self, state: &StateData) -> Result<()> {
        let cluster_id = state.parameter_value(CACHE_CLUSTER_ID)?;
        let cluster = match self.cache.describe_cache_cluster(&cluster_id).await {
            Ok(cluster) => cluster,
            Err(CloudError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e).during("describe cache cluster"),
        };

        if !self.is_managed(&cluster.arn, &state.id).await? {
            tracing::info!(id = %state.id, cluster_id = %cluster_id, "Cache cluster is not managed, skipping");
            return Ok(());
        }

        tracing::info!(id = %state.id, cluster_id = %cluster_id, "Deleting cache cluster");
        match self.cache.delete_cache_cluster(&cluster_id).await {
            Ok(()) | Err(CloudError::NotFound(_)) => {}
            Err(e) => return Err(e).during("delete cache cluster"),
        }

        self.wait_for_deletion_of(CacheEngine::Memcached, &cluster_id)
            .await
    }

    pub(super) async fn cache_cluster_endpoint(&self, cluster_id: &str) -> Result<Endpoint> {
        self.describe_cache_cluster(cluster_id)
            .await?
            .configuration_endpoint
            .ok_or_else(|| {
                ProvisionError::NotFound(format!("configuration endpoint of cache cluster {}", cluster_id))
            })
    }
}
