//! Serialized input documents.
//!
//! These records mirror the JSON exactly as it arrives. Nothing downstream of
//! [`crate::problem::Problem::from_input`] touches them again.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Identifier of a scan or an index, as supplied by the caller.
///
/// Index OIDs are usually numeric, scan IDs usually strings; both forms are
/// accepted and echoed back unchanged in the report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(u64),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Number(n) => write!(f, "{}", n),
            Identifier::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::Text(value.to_string())
    }
}

impl From<u64> for Identifier {
    fn from(value: u64) -> Self {
        Identifier::Number(value)
    }
}

/// Workload document: scans plus the existing and possible indexes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadInput {
    #[serde(rename = "Scans", default)]
    pub scans: Vec<ScanRecord>,
    #[serde(rename = "Existing Indexes", alias = "ExistingIndexes", default)]
    pub existing_indexes: Vec<IndexRecord>,
    #[serde(rename = "Possible Indexes", alias = "PossibleIndexes", default)]
    pub possible_indexes: Vec<IndexRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    #[serde(rename = "Scan ID", alias = "ScanID")]
    pub scan_id: Identifier,
    /// `None` drops the scan from the model.
    #[serde(rename = "Sequential Scan Cost", alias = "SequentialScanCost", default)]
    pub sequential_cost: Option<f64>,
    #[serde(rename = "Existing Index Costs", alias = "ExistingIndexCosts", default)]
    pub existing_index_costs: Vec<IndexCost>,
    #[serde(rename = "Possible Index Costs", alias = "PossibleIndexCosts", default)]
    pub possible_index_costs: Vec<IndexCost>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(rename = "Index")]
    pub index: IndexRef,
    #[serde(rename = "Index Write Overhead", alias = "IndexWriteOverhead")]
    pub write_overhead: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRef {
    #[serde(rename = "Index OID", alias = "IndexOID")]
    pub oid: Identifier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexCost {
    #[serde(rename = "Index OID", alias = "IndexOID")]
    pub oid: Identifier,
    #[serde(rename = "Cost")]
    pub cost: f64,
}

impl WorkloadInput {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Optimizer settings document. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsInput {
    #[serde(rename = "Options", default)]
    pub options: OptionsInput,
    #[serde(rename = "Time Limit", alias = "TimeLimit", default)]
    pub time_limit: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsInput {
    /// `None` selects the default goal sequence; an empty list is rejected later.
    #[serde(rename = "Goals", default)]
    pub goals: Option<Vec<GoalInput>>,
    #[serde(rename = "Rules", default)]
    pub rules: Vec<RuleInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalInput {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Tolerance", default)]
    pub tolerance: Option<f64>,
}

/// Rule values stay untyped here so that type errors become validation
/// errors naming the rule rather than generic JSON errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleInput {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: serde_json::Value,
}

impl SettingsInput {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
