//! Laboratory results.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Abnormal flag attached to a lab value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabFlag {
    #[serde(rename = "(H)")]
    High,
    #[serde(rename = "(L)")]
    Low,
}

impl LabFlag {
    /// Coerce a flag token (`H`, `High`, `↑`, `*`, `L`, `Low`, `↓`, `(H)`…).
    pub fn from_token(token: &str) -> Option<Self> {
        let inner = token
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .to_lowercase();
        match inner.as_str() {
            "h" | "hh" | "high" | "↑" | "*" | "**" => Some(LabFlag::High),
            "l" | "ll" | "low" | "↓" => Some(LabFlag::Low),
            _ => None,
        }
    }

    /// Canonical marker, `(H)` or `(L)`.
    pub fn marker(&self) -> &'static str {
        match self {
            LabFlag::High => "(H)",
            LabFlag::Low => "(L)",
        }
    }
}

/// Value of a lab result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabValue {
    Number(f64),
    Text(String),
}

impl LabValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LabValue::Number(n) => Some(*n),
            LabValue::Text(_) => None,
        }
    }
}

impl fmt::Display for LabValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            LabValue::Number(n) => write!(f, "{}", n),
            LabValue::Text(s) => f.write_str(s),
        }
    }
}

/// Line format a lab result was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabFormat {
    /// `AST/ALT: 45/62`
    Combo,
    /// `Sodium: 139 mmol/L`
    Delimited,
    /// `Sodium 139`
    Spaced,
}

impl LabFormat {
    pub const PRIORITY: [LabFormat; 3] = [LabFormat::Combo, LabFormat::Delimited, LabFormat::Spaced];

    pub fn label(&self) -> &'static str {
        match self {
            LabFormat::Combo => "combo",
            LabFormat::Delimited => "delimited",
            LabFormat::Spaced => "spaced",
        }
    }
}

/// A single lab result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResult {
    pub name: String,
    pub value: LabValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_range: Option<String>,
    pub flag: Option<LabFlag>,
    /// Date of the column the value was taken from, when the table had a date header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected: Option<NaiveDate>,
    pub source: LabFormat,
    pub raw: String,
}

impl LabResult {
    /// Value with its flag marker appended, e.g. `"5.8 (H)"`.
    pub fn display_value(&self) -> String {
        match self.flag {
            Some(flag) => format!("{} {}", self.value, flag.marker()),
            None => self.value.to_string(),
        }
    }

    /// Composite key used for deduplication.
    pub fn dedup_key(&self) -> (String, String) {
        (self.name.to_lowercase(), self.value.to_string())
    }
}
