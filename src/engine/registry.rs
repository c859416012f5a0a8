use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cloud::{CacheApi, DatabaseApi, NetworkApi};
use crate::config::ProvisionerConfig;
use crate::error::{ProvisionError, Result};
use crate::state::StateStorage;

use super::elasticache::ElasticacheProvisioner;
use super::rds::RdsProvisioner;
use super::{ProvisionRequest, Provisioner};

/// Cloud collaborators shared by the built-in provisioners.
#[derive(Clone)]
pub struct CloudClients {
    pub network: Arc<dyn NetworkApi>,
    pub database: Arc<dyn DatabaseApi>,
    pub cache: Arc<dyn CacheApi>,
}

/// Provisioners by kind name, built once at startup and passed by reference.
#[derive(Default, Clone)]
pub struct ProvisionerRegistry {
    provisioners: BTreeMap<&'static str, Arc<dyn Provisioner>>,
}

impl ProvisionerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the rds and elasticache provisioners, tuned by `cfg`.
    pub fn from_config(
        cfg: &ProvisionerConfig,
        clients: CloudClients,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        let waiter = cfg.waiter.settings();
        let wait_for_deletion = cfg.teardown.wait_for_deletion;

        let rds = RdsProvisioner::new(clients.database, clients.network.clone(), storage.clone())
            .with_waiter(waiter)
            .with_password_length(cfg.password.length)
            .with_wait_for_deletion(wait_for_deletion);
        let elasticache = ElasticacheProvisioner::new(clients.cache, clients.network, storage)
            .with_waiter(waiter)
            .with_wait_for_deletion(wait_for_deletion);

        let mut registry = Self::new();
        registry.register(Arc::new(rds)).register(Arc::new(elasticache));
        registry
    }

    /// Register under the provisioner's own name, replacing any earlier one.
    pub fn register(&mut self, provisioner: Arc<dyn Provisioner>) -> &mut Self {
        let name = provisioner.name();
        tracing::debug!(kind = name, "Registering provisioner");
        self.provisioners.insert(name, provisioner);
        self
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn Provisioner>> {
        self.provisioners
            .get(kind)
            .cloned()
            .ok_or_else(|| ProvisionError::UnsupportedEngine(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.provisioners.keys().copied().collect()
    }

    pub async fn dispatch(&self, kind: &str, id: &str, request: ProvisionRequest) -> Result<()> {
        let provisioner = self.get(kind)?;
        match request {
            ProvisionRequest::Provision { options } => provisioner.provision(id, &options).await,
            ProvisionRequest::Import {
                identifier,
                options,
            } => provisioner.import(id, &identifier, &options).await,
        }
    }
}
