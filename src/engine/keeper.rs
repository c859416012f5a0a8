use std::sync::Arc;

use crate::error::{ProvisionError, Result};
use crate::state::{StateData, StateStorage};

/// Loads, saves and logs state for one provisioner.
#[derive(Clone)]
pub struct StateKeeper {
    storage: Arc<dyn StateStorage>,
    owner: &'static str,
}

impl StateKeeper {
    pub fn new(storage: Arc<dyn StateStorage>, owner: &'static str) -> Self {
        Self { storage, owner }
    }

    pub async fn load(&self, id: &str) -> Result<StateData> {
        tracing::debug!(id, "Fetching the state data");
        let bytes = self.storage.get_state(id).await?;
        StateData::load(&bytes)
    }

    /// `Ok(None)` when nothing has been stored for `id`.
    pub async fn find(&self, id: &str) -> Result<Option<StateData>> {
        match self.load(id).await {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fail with already-provisioned when state exists for `id`.
    pub async fn ensure_absent(&self, id: &str) -> Result<()> {
        match self.find(id).await? {
            Some(_) => Err(ProvisionError::AlreadyProvisioned(id.to_string())),
            None => Ok(()),
        }
    }

    /// Persist `state`, guarded by the revision it was loaded at.
    pub async fn save(&self, state: &mut StateData) -> Result<()> {
        tracing::debug!(id = %state.id, revision = state.revision, "Saving the state data");
        let expected = state.revision;
        state.revision = expected + 1;

        let result = async {
            let bytes = state.to_bytes()?;
            self.storage
                .save_state(&state.id, &bytes, self.owner, expected)
                .await?;
            Ok::<_, ProvisionError>(())
        }
        .await;

        if let Err(e) = result {
            state.revision = expected;
            tracing::error!(id = %state.id, error = %e, "Failed to save state");
            return Err(e);
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.storage.delete_state(id).await?;
        Ok(())
    }

    /// Best-effort progress message for the caller.
    pub async fn log(&self, id: &str, message: &str) {
        if let Err(e) = self.storage.send_state_log(id, message).await {
            tracing::warn!(id, error = %e, "Failed to send state log");
        }
    }
}
