//! Aggregate parse result handed to rendering and enrichment collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Allergy, LabResult, VitalReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

impl Demographics {
    pub fn is_empty(&self) -> bool {
        self.age.is_none() && self.gender.is_none()
    }
}

/// A medication list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    pub raw: String,
}

/// Structured record extracted from one clinical note.
///
/// Created fresh by every parse; the parser keeps no reference to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    /// Section name → content. Always holds `"__full"`.
    pub sections: BTreeMap<String, String>,
    pub full_text: String,
    pub vitals: Vec<VitalReading>,
    pub labs: Vec<LabResult>,
    /// `[NKDA]` means none known; empty means no allergy information found.
    pub allergies: Vec<Allergy>,
    pub medications: Vec<Medication>,
    pub diagnoses: Vec<String>,
    pub demographics: Demographics,
    /// Aggregate confidence in [0, 1].
    pub confidence: f64,
    pub warnings: Vec<String>,
}

impl ParseResult {
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }

    pub fn has_critical_warning(&self) -> bool {
        self.warnings.iter().any(|w| w.starts_with("CRITICAL"))
    }

    pub fn is_nkda(&self) -> bool {
        self.allergies.len() == 1 && self.allergies[0].is_nkda()
    }
}

/// One candidate considered by an extraction strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    /// Result field, e.g. `"vitals"`.
    pub field: String,
    /// What was matched, e.g. `"HR"` or `"Sodium"`.
    pub item: String,
    /// Strategy that produced the candidate, e.g. `"table"`.
    pub strategy: String,
    /// False when a higher-priority candidate won or the candidate was deduplicated.
    pub accepted: bool,
}

/// Per-parse record of which strategy matched what.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionTrace {
    pub entries: Vec<TraceEntry>,
}

impl ExtractionTrace {
    pub fn record(&mut self, field: &str, item: &str, strategy: &str, accepted: bool) {
        self.entries.push(TraceEntry {
            field: field.to_string(),
            item: item.to_string(),
            strategy: strategy.to_string(),
            accepted,
        });
    }

    /// Accepted entries for one field.
    pub fn accepted<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a TraceEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.field == field && e.accepted)
    }

    /// Strategy that supplied an accepted item, if any.
    pub fn strategy_for(&self, field: &str, item: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.field == field && e.accepted && e.item.eq_ignore_ascii_case(item))
            .map(|e| e.strategy.as_str())
    }
}

/// Parse result plus its diagnostic trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReport {
    pub result: ParseResult,
    pub trace: ExtractionTrace,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabFormat, LabValue};

    #[test]
    fn test_nested_fields_serialize_camel_case() {
        let result = ParseResult {
            labs: vec![LabResult {
                name: "Sodium".to_string(),
                value: LabValue::Number(139.0),
                unit: Some("mmol/L".to_string()),
                ref_range: Some("135-145".to_string()),
                flag: None,
                collected: None,
                source: LabFormat::Delimited,
                raw: "Sodium: 139 mmol/L (135-145)".to_string(),
            }],
            ..ParseResult::default()
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"refRange\":\"135-145\""), "{}", json);
        assert!(!json.contains("ref_range"), "{}", json);
        assert!(json.contains("\"fullText\""));

        let back: ParseResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.labs[0].ref_range.as_deref(), Some("135-145"));
    }

    #[test]
    fn test_strategy_for_skips_rejected() {
        let mut trace = ExtractionTrace::default();
        trace.record("vitals", "HR", "inline", false);
        trace.record("vitals", "HR", "table", true);
        trace.record("labs", "HR", "spaced", true);

        let field = String::from("vitals");
        let strategy = trace.strategy_for(&field, "hr");
        drop(field);
        assert_eq!(strategy, Some("table"));
        assert_eq!(trace.strategy_for("vitals", "BP"), None);
        assert_eq!(trace.accepted("labs").count(), 1);
    }
}
