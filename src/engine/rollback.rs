use std::fmt;
use std::future::Future;

use crate::error::{ProvisionError, Result};

/// Compensating action for one step of an install that already succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    SecurityGroup(String),
    SubnetGroup(String),
    DbInstance(String),
    ReplicationGroup(String),
    CacheCluster(String),
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupAction::SecurityGroup(id) => write!(f, "security group {}", id),
            CleanupAction::SubnetGroup(name) => write!(f, "subnet group {}", name),
            CleanupAction::DbInstance(id) => write!(f, "db instance {}", id),
            CleanupAction::ReplicationGroup(id) => write!(f, "replication group {}", id),
            CleanupAction::CacheCluster(id) => write!(f, "cache cluster {}", id),
        }
    }
}

/// Compensating actions recorded as an install progresses.
#[derive(Debug, Default)]
pub struct RollbackPlan {
    id: String,
    actions: Vec<CleanupAction>,
}

impl RollbackPlan {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            actions: Vec::new(),
        }
    }

    pub fn record(&mut self, action: CleanupAction) {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    /// Undo every recorded step, newest first, and return the error to
    /// report for `cause`. Every action is attempted even if an earlier one
    /// fails.
    pub async fn execute<F, Fut>(self, cause: ProvisionError, mut undo: F) -> ProvisionError
    where
        F: FnMut(CleanupAction) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        tracing::warn!(id = %self.id, error = %cause, steps = self.actions.len(), "Rolling back install");

        let mut failures = Vec::new();
        for action in self.actions.into_iter().rev() {
            let label = action.to_string();
            if let Err(e) = undo(action).await {
                tracing::error!(id = %self.id, step = %label, error = %e, "Rollback step failed");
                failures.push(format!("{}: {}", label, e));
            }
        }

        if failures.is_empty() {
            cause
        } else {
            ProvisionError::RollbackFailed {
                source: Box::new(cause),
                failures,
            }
        }
    }
}
