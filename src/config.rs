//! Workbook configuration

use serde::{Deserialize, Serialize};

use crate::error::CellGraphResult;

/// Behavioural knobs for a [`Workbook`](crate::Workbook).
///
/// Every field has a default, so a YAML document only needs the keys it
/// overrides:
///
/// ```yaml
/// formula_sigil: "="
/// circular_sentinel: "#CIRC!"
/// decimal_places: 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookConfig {
    /// Leading character that marks cell text as a formula
    pub formula_sigil: char,
    /// Marker written into cells on or downstream of a circular reference
    pub circular_sentinel: String,
    /// Marker written into cells whose formula read a removed worksheet
    pub reference_sentinel: String,
    /// Numeric results are rounded to this many decimals
    pub decimal_places: u32,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            formula_sigil: '=',
            circular_sentinel: "#ERROR#".to_string(),
            reference_sentinel: "#REF!".to_string(),
            decimal_places: 6,
        }
    }
}

impl WorkbookConfig {
    pub fn from_yaml_str(yaml: &str) -> CellGraphResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
