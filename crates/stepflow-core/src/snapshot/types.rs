use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{FORMAT_BASIC, FORMAT_FULL};
use crate::workflow::TransitionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    Basic,
    Full,
}

impl ExportMode {
    /// Valor del discriminador `format`.
    pub fn format(&self) -> &'static str {
        match self {
            ExportMode::Basic => FORMAT_BASIC,
            ExportMode::Full => FORMAT_FULL,
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Basic => f.write_str("basic"),
            ExportMode::Full => f.write_str("full"),
        }
    }
}

impl FromStr for ExportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(ExportMode::Basic),
            "full" => Ok(ExportMode::Full),
            other => Err(format!("unknown export mode '{other}' (expected basic|full)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub format: String,
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_version: Option<String>,
    pub inventory_kinds: Vec<String>,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub kind: String,
    pub from: String,
    pub to: String,
    pub unidirectional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub current: CurrentSnapshot,
    pub history: Vec<HistorySnapshot>,
    #[serde(default)]
    pub stores: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSnapshot {
    #[serde(default)]
    pub node_id: Option<String>,
    pub status: TransitionStatus,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub node_id: String,
    #[serde(default)]
    pub input: Value,
}
