//! Typed, validated resource parameters and their per-phase metadata.
//!
//! Values are persisted as strings for forward compatibility, but are parsed
//! once into a [`ParamValue`] whenever they enter the engine.

pub mod metadata;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};

pub use metadata::{MetaData, MetadataTable, Phase, ValueKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    String(String),
    Int(i32),
    Bool(bool),
    StringList(Vec<String>),
}

impl ParamValue {
    /// Parse a raw string into the given kind. Empty input has no value.
    pub fn parse(key: &str, kind: ValueKind, raw: &str) -> Result<Option<Self>> {
        if raw.is_empty() {
            return Ok(None);
        }
        let value = match kind {
            ValueKind::String => ParamValue::String(raw.to_string()),
            ValueKind::Int => ParamValue::Int(parse_int(key, raw)?),
            ValueKind::Bool => ParamValue::Bool(parse_bool(key, raw)?),
            ValueKind::StringList => {
                let items = split_list(raw);
                if items.is_empty() {
                    return Ok(None);
                }
                ParamValue::StringList(items)
            }
        };
        Ok(Some(value))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ParamValue::String(_) => ValueKind::String,
            ParamValue::Int(_) => ValueKind::Int,
            ParamValue::Bool(_) => ValueKind::Bool,
            ParamValue::StringList(_) => ValueKind::StringList,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::String(s) => write!(f, "{}", s),
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::StringList(items) => write!(f, "{}", items.join(",")),
        }
    }
}

fn parse_int(key: &str, raw: &str) -> Result<i32> {
    raw.trim()
        .parse::<i32>()
        .map_err(|e| ProvisionError::ParseError {
            key: key.to_string(),
            reason: format!("'{}' is not a 32-bit integer: {}", raw, e),
        })
}

/// Accepts the usual spellings: 1, t, T, TRUE, true, True and their false
/// counterparts.
pub fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(ProvisionError::ParseError {
            key: key.to_string(),
            reason: format!("'{}' is not a boolean", other),
        }),
    }
}

/// Comma separated items, trimmed. Blank items are dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// A single key/value pair describing part of a resource's configuration.
///
/// The value can only change through [`Parameter::update`] or
/// [`Parameter::initialize`], which enforce the metadata flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameter", into = "RawParameter")]
pub struct Parameter {
    key: String,
    value: Option<ParamValue>,
    meta: MetaData,
}

/// Persisted form of a [`Parameter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawParameter {
    meta: MetaData,
    key: String,
    #[serde(default)]
    value: Option<String>,
}

impl TryFrom<RawParameter> for Parameter {
    type Error = ProvisionError;

    fn try_from(raw: RawParameter) -> Result<Self> {
        let value = match raw.value {
            Some(v) => ParamValue::parse(&raw.key, raw.meta.kind, &v)?,
            None => None,
        };
        Ok(Parameter {
            key: raw.key,
            value,
            meta: raw.meta,
        })
    }
}

impl From<Parameter> for RawParameter {
    fn from(p: Parameter) -> Self {
        RawParameter {
            value: p.value.as_ref().map(|v| v.to_string()),
            key: p.key,
            meta: p.meta,
        }
    }
}

impl Parameter {
    /// Build a parameter, falling back to the metadata default when `raw` is
    /// empty. Only conversion errors are reported here; requiredness is
    /// checked by [`Parameter::validate`].
    pub fn new(key: impl Into<String>, raw: &str, meta: MetaData) -> Result<Self> {
        let key = key.into();
        let raw = match (&meta.default, raw.is_empty()) {
            (Some(default), true) => default.as_str(),
            _ => raw,
        };
        let value = ParamValue::parse(&key, meta.kind, raw)?;
        Ok(Parameter { key, value, meta })
    }

    /// Build from a value reported by the cloud. Empty input stays empty;
    /// the metadata default is not applied.
    pub fn discovered(key: impl Into<String>, raw: &str, meta: MetaData) -> Result<Self> {
        let key = key.into();
        let value = ParamValue::parse(&key, meta.kind, raw)?;
        Ok(Parameter { key, value, meta })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&ParamValue> {
        self.value.as_ref()
    }

    pub fn meta(&self) -> &MetaData {
        &self.meta
    }

    pub fn is_empty(&self) -> bool {
        match &self.value {
            None => true,
            Some(ParamValue::String(s)) => s.is_empty(),
            Some(ParamValue::StringList(items)) => items.iter().all(|i| i.trim().is_empty()),
            Some(_) => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(default) = &self.meta.default {
            if let Err(e) = ParamValue::parse(&self.key, self.meta.kind, default) {
                return Err(ProvisionError::InvalidDefault {
                    key: self.key.clone(),
                    reason: e.to_string(),
                });
            }
        }
        if self.meta.required && self.is_empty() {
            return Err(ProvisionError::missing(&self.key));
        }
        Ok(())
    }

    /// Apply a new raw value. Returns `false` when the value is unchanged.
    pub fn update(&mut self, raw: &str) -> Result<bool> {
        let next = ParamValue::parse(&self.key, self.meta.kind, raw)?;
        if next == self.value {
            return Ok(false);
        }
        if self.meta.immutable && !self.is_empty() {
            return Err(ProvisionError::ImmutableParameter {
                key: self.key.clone(),
            });
        }
        self.value = next;
        Ok(true)
    }

    /// Set-once assignment for system computed values.
    pub fn initialize(&mut self, raw: &str) -> Result<()> {
        if !self.is_empty() {
            return Err(ProvisionError::AlreadyInitialized(self.key.clone()));
        }
        self.value = ParamValue::parse(&self.key, self.meta.kind, raw)?;
        Ok(())
    }

    pub fn update_metadata(&mut self, meta: MetaData) {
        self.meta = meta;
    }

    pub fn get_value(&self) -> Result<String> {
        match &self.value {
            Some(v) if !self.is_empty() => Ok(v.to_string()),
            _ => Err(ProvisionError::NotFound(format!(
                "value not found for param: {}",
                self.key
            ))),
        }
    }

    pub fn get_value_opt(&self) -> Option<String> {
        self.get_value().ok()
    }

    pub fn as_i32(&self) -> Result<Option<i32>> {
        match &self.value {
            None => Ok(None),
            Some(ParamValue::Int(n)) => Ok(Some(*n)),
            Some(ParamValue::String(s)) => parse_int(&self.key, s).map(Some),
            Some(other) => Err(self.kind_mismatch(other, ValueKind::Int)),
        }
    }

    pub fn as_bool(&self) -> Result<Option<bool>> {
        match &self.value {
            None => Ok(None),
            Some(ParamValue::Bool(b)) => Ok(Some(*b)),
            Some(ParamValue::String(s)) => parse_bool(&self.key, s).map(Some),
            Some(other) => Err(self.kind_mismatch(other, ValueKind::Bool)),
        }
    }

    pub fn as_string_list(&self) -> Result<Option<Vec<String>>> {
        match &self.value {
            None => Ok(None),
            Some(ParamValue::StringList(items)) => Ok(Some(items.clone())),
            Some(ParamValue::String(s)) => Ok(Some(split_list(s))),
            Some(other) => Err(self.kind_mismatch(other, ValueKind::StringList)),
        }
    }

    fn kind_mismatch(&self, value: &ParamValue, wanted: ValueKind) -> ProvisionError {
        ProvisionError::ParseError {
            key: self.key.clone(),
            reason: format!("stored {} value cannot be read as {}", value.kind(), wanted),
        }
    }
}

/// Build and validate one parameter per table entry from caller options.
///
/// Unknown option keys are rejected before anything else so that no cloud
/// call is ever made with a parameter the phase does not understand.
pub fn plan_parameters(
    table: &MetadataTable,
    options: &BTreeMap<String, String>,
) -> Result<Vec<Parameter>> {
    if let Some(key) = options.keys().find(|k| !table.contains_key(k.as_str())) {
        return Err(ProvisionError::UnsupportedParameter { key: key.clone() });
    }

    let params = table
        .iter()
        .map(|(key, meta)| {
            let raw = options.get(*key).map(String::as_str).unwrap_or("");
            Parameter::new(*key, raw, meta.clone())
        })
        .collect::<Result<Vec<_>>>()?;

    for param in &params {
        param.validate()?;
    }
    Ok(params)
}
