//! Provisioning engine: one [`Provisioner`] per resource kind, plus the
//! shared machinery they are built from.
//!
//! A provision call either installs a new resource (no state stored for the
//! id yet) or applies an update diff against the stored state. Install steps
//! record compensating actions in a [`rollback::RollbackPlan`] so a failure
//! part way through leaves nothing behind. Import adopts a resource created
//! elsewhere without issuing any mutating cloud call.

pub mod dependent;
pub mod elasticache;
pub mod keeper;
pub mod naming;
pub mod password;
pub mod rds;
pub mod registry;
pub mod rollback;
pub mod waiter;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{OptionalExt, ProvisionError, Result};
use crate::params::{MetadataTable, Parameter, Phase};
use crate::state::StateData;

pub use registry::ProvisionerRegistry;

/// Caller options keyed by cloud field name.
pub type Options = BTreeMap<String, String>;

/// Key of the legacy option that routes a provision call to import.
pub const IMPORT_OPTION: &str = "import";

/// Endpoint and credentials of a provisioned resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: i32,
    pub username: String,
    pub password: String,
    pub database: String,
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Name of the resource kind, also used as the storage owner.
    fn name(&self) -> &'static str;

    /// Install when nothing is stored for `id`, otherwise update.
    async fn provision(&self, id: &str, options: &Options) -> Result<()>;

    /// Adopt the existing cloud resource `identifier` under `id`.
    async fn import(&self, id: &str, identifier: &str, options: &Options) -> Result<()>;

    async fn uninstall(&self, id: &str) -> Result<()>;

    async fn connection_info(&self, id: &str) -> Result<ConnectionInfo>;
}

/// What a caller asked for, with import split out of the option map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionRequest {
    Provision { options: Options },
    Import { identifier: String, options: Options },
}

impl ProvisionRequest {
    /// Interpret an option map that may still carry the `import` key
    /// (matched case-insensitively). An empty import value is dropped.
    pub fn from_options(mut options: Options) -> Self {
        let key = options
            .keys()
            .find(|k| k.eq_ignore_ascii_case(IMPORT_OPTION))
            .cloned();

        match key.and_then(|k| options.remove(&k)) {
            Some(identifier) if !identifier.trim().is_empty() => ProvisionRequest::Import {
                identifier: identifier.trim().to_string(),
                options,
            },
            _ => ProvisionRequest::Provision { options },
        }
    }
}

/// Resource kinds that have metadata tables, as accepted by the CLI.
pub const RESOURCE_KINDS: &[&str] = &["rds", "redis", "memcached"];

pub fn metadata_table(kind: &str, phase: Phase) -> Result<MetadataTable> {
    match kind {
        "rds" | "postgres" | "mysql" | "mariadb" => Ok(rds::params::metadata_for(phase)),
        _ => elasticache::params::metadata_for(kind, phase),
    }
}

/// Install planning without any cloud call: defaults, unknown-key and
/// required checks.
pub fn plan_install(
    kind: &str,
    id: &str,
    options: &Options,
    password_length: usize,
) -> Result<Vec<Parameter>> {
    match kind {
        "rds" | "postgres" | "mysql" | "mariadb" => {
            rds::params::plan_install(id, options, password_length)
        }
        _ => elasticache::params::plan_install(kind, id, options),
    }
}

/// Typed reads that treat an absent key like an empty value.
pub(crate) struct Fields<'a>(pub &'a StateData);

impl<'a> Fields<'a> {
    pub fn string(&self, key: &str) -> Option<String> {
        self.0.parameter_value_opt(key)
    }

    pub fn int(&self, key: &str) -> Result<Option<i32>> {
        self.0.parameter_i32(key).optional()
    }

    pub fn boolean(&self, key: &str) -> Result<Option<bool>> {
        self.0.parameter_bool(key).optional()
    }

    pub fn list(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .0
            .parameter_string_list(key)
            .optional()?
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect())
    }

    pub fn required(&self, key: &str) -> Result<String> {
        self.string(key)
            .ok_or_else(|| ProvisionError::missing(key))
    }
}

/// Reads restricted to the changed keys plus the keys `table` marks
/// required, which a modify call needs every time.
pub(crate) struct Changed<'a> {
    pub fields: Fields<'a>,
    pub keys: BTreeSet<&'a str>,
}

impl<'a> Changed<'a> {
    pub fn new(state: &'a StateData, changed: &'a [String], table: &MetadataTable) -> Self {
        let mut keys: BTreeSet<&str> = changed.iter().map(String::as_str).collect();
        keys.extend(
            table
                .iter()
                .filter(|(_, meta)| meta.required)
                .map(|(key, _)| *key),
        );
        Self {
            fields: Fields(state),
            keys,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.contains(key).then(|| self.fields.string(key)).flatten()
    }

    pub fn int(&self, key: &str) -> Result<Option<i32>> {
        if self.contains(key) {
            self.fields.int(key)
        } else {
            Ok(None)
        }
    }

    pub fn boolean(&self, key: &str) -> Result<Option<bool>> {
        if self.contains(key) {
            self.fields.boolean(key)
        } else {
            Ok(None)
        }
    }

    pub fn list(&self, key: &str) -> Result<Vec<String>> {
        if self.contains(key) {
            self.fields.list(key)
        } else {
            Ok(Vec::new())
        }
    }
}

/// Diff `options` into `state` using the update `table`. Returns the keys
/// whose value really changed; `ApplyImmediately` is a directive for the
/// modify call and never counts as a change on its own.
pub(crate) fn apply_update_options(
    state: &mut StateData,
    options: &Options,
    table: &MetadataTable,
    apply_immediately_key: &str,
) -> Result<Vec<String>> {
    let mut changed = Vec::new();
    for (key, value) in options {
        if state.update_parameter_value(key, value, table)? && key != apply_immediately_key {
            changed.push(key.clone());
        }
    }
    Ok(changed)
}

/// Overwrite a value learned from the cloud, keeping the key's stored
/// metadata or taking it from `table` for a key not stored yet. An empty
/// value clears the parameter instead of falling back to the default.
pub(crate) fn set_discovered(
    state: &mut StateData,
    key: &str,
    value: &str,
    table: &MetadataTable,
) -> Result<()> {
    let meta = match state.parameter(key) {
        Ok(existing) => existing.meta().clone(),
        Err(_) => table.get(key).cloned().unwrap_or_default(),
    };
    state.add_or_update_parameter(Parameter::discovered(key, value, meta)?);
    Ok(())
}
