use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};
use crate::params::{MetadataTable, Parameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStatus {
    Provisioning,
    ProvisionSucceeded,
    ProvisionFailed,
    Updating,
    UpdateSucceeded,
}

impl StateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateStatus::Provisioning => "provisioning",
            StateStatus::ProvisionSucceeded => "provision_succeeded",
            StateStatus::ProvisionFailed => "provision_failed",
            StateStatus::Updating => "updating",
            StateStatus::UpdateSucceeded => "update_succeeded",
        }
    }

    /// Status to record once the cloud reports the resource as available.
    pub fn settled(&self) -> StateStatus {
        match self {
            StateStatus::Provisioning => StateStatus::ProvisionSucceeded,
            StateStatus::Updating => StateStatus::UpdateSucceeded,
            other => *other,
        }
    }
}

impl fmt::Display for StateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provisioning state of one managed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    pub id: String,
    #[serde(rename = "state")]
    pub status: StateStatus,
    #[serde(default)]
    pub imported: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, rename = "lockedReason")]
    pub locked_reason: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    parameters: BTreeMap<String, Parameter>,
    /// Optimistic concurrency token, bumped on every successful save.
    #[serde(default)]
    pub revision: u64,
}

impl StateData {
    pub fn new(
        id: impl Into<String>,
        status: StateStatus,
        params: impl IntoIterator<Item = Parameter>,
    ) -> Self {
        Self {
            id: id.into(),
            status,
            imported: false,
            locked: false,
            locked_reason: String::new(),
            host: String::new(),
            parameters: params
                .into_iter()
                .map(|p| (p.key().to_string(), p))
                .collect(),
            revision: 0,
        }
    }

    pub fn new_imported(id: impl Into<String>) -> Self {
        let mut state = Self::new(id, StateStatus::ProvisionSucceeded, Vec::new());
        state.imported = true;
        state
    }

    pub fn load(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    // ─── Parameters ─────────────────────────────────────────────────────────

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameters.contains_key(key)
    }

    pub fn add_or_update_parameter(&mut self, param: Parameter) {
        self.parameters.insert(param.key().to_string(), param);
    }

    pub fn parameter(&self, key: &str) -> Result<&Parameter> {
        self.parameters
            .get(key)
            .ok_or_else(|| ProvisionError::NotFound(format!("parameter not found: {}", key)))
    }

    fn parameter_mut(&mut self, key: &str) -> Result<&mut Parameter> {
        self.parameters
            .get_mut(key)
            .ok_or_else(|| ProvisionError::NotFound(format!("parameter not found: {}", key)))
    }

    /// Non-empty value of a parameter; absent and empty both fail with
    /// not-found.
    pub fn parameter_value(&self, key: &str) -> Result<String> {
        self.parameter(key)?.get_value()
    }

    pub fn parameter_value_opt(&self, key: &str) -> Option<String> {
        self.parameters.get(key).and_then(Parameter::get_value_opt)
    }

    pub fn parameter_i32(&self, key: &str) -> Result<Option<i32>> {
        self.parameter(key)?.as_i32()
    }

    pub fn parameter_bool(&self, key: &str) -> Result<Option<bool>> {
        self.parameter(key)?.as_bool()
    }

    pub fn parameter_string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        self.parameter(key)?.as_string_list()
    }

    /// Update-phase entry point. New keys are added and count as changed;
    /// existing keys go through [`Parameter::update`] and pick up the update
    /// table metadata when they really change.
    pub fn update_parameter_value(
        &mut self,
        key: &str,
        raw: &str,
        table: &MetadataTable,
    ) -> Result<bool> {
        let meta = table
            .get(key)
            .cloned()
            .ok_or_else(|| ProvisionError::UnsupportedParameter {
                key: key.to_string(),
            })?;

        match self.parameters.get_mut(key) {
            None => {
                let param = Parameter::new(key, raw, meta)?;
                self.add_or_update_parameter(param);
                Ok(true)
            }
            Some(param) => {
                let changed = param.update(raw)?;
                if changed {
                    param.update_metadata(meta);
                }
                Ok(changed)
            }
        }
    }

    /// Fill a pre-seeded placeholder exactly once.
    pub fn initialize_parameter_value(&mut self, key: &str, raw: &str) -> Result<()> {
        self.parameter_mut(key)?.initialize(raw)
    }

    /// Record a value discovered on an existing cloud resource.
    pub fn add_imported_parameter(
        &mut self,
        key: &str,
        raw: Option<String>,
        table: &MetadataTable,
    ) -> Result<()> {
        if self.parameters.contains_key(key) {
            return Err(ProvisionError::AlreadyInitialized(key.to_string()));
        }
        let meta = table
            .get(key)
            .cloned()
            .ok_or_else(|| ProvisionError::UnsupportedParameter {
                key: key.to_string(),
            })?;
        let raw = raw.unwrap_or_default();
        if meta.required && raw.is_empty() {
            return Err(ProvisionError::missing(key));
        }
        let param = Parameter::new(key, &raw, meta)?;
        self.add_or_update_parameter(param);
        Ok(())
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self.status,
            StateStatus::Provisioning | StateStatus::Updating
        )
    }

    pub fn lock(&mut self, reason: &str) -> Result<()> {
        if self.locked && self.locked_reason != reason {
            return Err(ProvisionError::Locked(self.locked_reason.clone()));
        }
        self.locked = true;
        self.locked_reason = reason.to_string();
        Ok(())
    }

    pub fn unlock(&mut self) {
        self.locked = false;
        self.locked_reason.clear();
    }

    pub fn deletion_protected(&self, key: &str) -> bool {
        matches!(
            self.parameters.get(key).map(Parameter::as_bool),
            Some(Ok(Some(true)))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MetaData;

    fn sample() -> StateData {
        StateData::new(
            "app-db",
            StateStatus::Provisioning,
            vec![
                Parameter::new("Engine", "postgres", MetaData::string().required().immutable())
                    .unwrap(),
                Parameter::new("Port", "5432", MetaData::int().required()).unwrap(),
            ],
        )
    }

    #[test]
    fn status_uses_snake_case_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["state"], "provisioning");
        assert_eq!(json["parameters"]["Port"]["value"], "5432");
    }

    #[test]
    fn lock_with_same_reason_is_idempotent() {
        let mut state = sample();
        state.lock("deletion protection").unwrap();
        state.lock("deletion protection").unwrap();
        let err = state.lock("upgrade").unwrap_err();
        assert_eq!(
            err.to_string(),
            "state is already locked for reason: deletion protection"
        );
        state.unlock();
        state.lock("upgrade").unwrap();
    }

    #[test]
    fn settled_status_transitions() {
        assert_eq!(
            StateStatus::Provisioning.settled(),
            StateStatus::ProvisionSucceeded
        );
        assert_eq!(StateStatus::Updating.settled(), StateStatus::UpdateSucceeded);
        assert_eq!(
            StateStatus::ProvisionFailed.settled(),
            StateStatus::ProvisionFailed
        );
    }
}
