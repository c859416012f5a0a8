use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The typed shape a parameter value takes once parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    String,
    Int,
    Bool,
    StringList,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::String => "string",
            ValueKind::Int => "int",
            ValueKind::Bool => "bool",
            ValueKind::StringList => "list",
        };
        write!(f, "{}", s)
    }
}

/// Per-phase annotations for a single parameter key.
///
/// The persisted field names are kept stable so that state blobs written by
/// earlier versions still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub ignore: bool,
    #[serde(default)]
    pub immutable: bool,
    #[serde(default, rename = "updatesWithSomeInterruption")]
    pub updates_with_interruption: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub kind: ValueKind,
}

impl MetaData {
    pub fn string() -> Self {
        Self::default()
    }

    pub fn int() -> Self {
        Self {
            kind: ValueKind::Int,
            ..Self::default()
        }
    }

    pub fn boolean() -> Self {
        Self {
            kind: ValueKind::Bool,
            ..Self::default()
        }
    }

    pub fn list() -> Self {
        Self {
            kind: ValueKind::StringList,
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn interrupts(mut self) -> Self {
        self.updates_with_interruption = true;
        self
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    /// Same flags with requiredness dropped, used when deriving a more
    /// permissive phase table from a stricter one.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Metadata for every key accepted by one lifecycle phase of a resource kind.
pub type MetadataTable = BTreeMap<&'static str, MetaData>;

/// Lifecycle phases that carry their own metadata table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Install,
    Update,
    Import,
    ReadReplica,
    RestoreFromSnapshot,
}

impl Phase {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "install" => Some(Phase::Install),
            "update" => Some(Phase::Update),
            "import" => Some(Phase::Import),
            "readreplica" | "replica" => Some(Phase::ReadReplica),
            "restorefromsnapshot" | "snapshot" | "restore" => Some(Phase::RestoreFromSnapshot),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Install => "install",
            Phase::Update => "update",
            Phase::Import => "import",
            Phase::ReadReplica => "read-replica",
            Phase::RestoreFromSnapshot => "restore-from-snapshot",
        };
        write!(f, "{}", s)
    }
}
