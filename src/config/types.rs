use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::password::DEFAULT_PASSWORD_LENGTH;
use crate::engine::waiter::{WaiterSettings, DEFAULT_WAIT_DELAY, DEFAULT_WAIT_TIMEOUT};

// ─── Top-Level Config ───────────────────────────────────────────────────────

/// Root configuration, read from `provisioner.yaml`. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    pub state: StateConfig,
    pub waiter: WaiterConfig,
    pub password: PasswordConfig,
    pub teardown: TeardownConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// SQLite database holding state blobs and progress logs.
    pub path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: ".provisioner/state.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaiterConfig {
    pub timeout_secs: u64,
    pub delay_secs: u64,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_WAIT_TIMEOUT.as_secs(),
            delay_secs: DEFAULT_WAIT_DELAY.as_secs(),
        }
    }
}

impl WaiterConfig {
    pub fn settings(&self) -> WaiterSettings {
        WaiterSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            delay: Duration::from_secs(self.delay_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_PASSWORD_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeardownConfig {
    /// Wait for the managed resource to disappear before deleting the
    /// security and subnet groups it uses.
    pub wait_for_deletion: bool,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            wait_for_deletion: true,
        }
    }
}
