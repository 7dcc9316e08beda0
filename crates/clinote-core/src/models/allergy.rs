//! Allergy entries.

use serde::{Deserialize, Serialize};

/// Substance name used for the "no known allergies" sentinel.
pub const NKDA: &str = "NKDA";

/// How an allergy entry was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllergySource {
    /// Explicit "No Known Allergies" statement.
    Sentinel,
    /// Comma list on the header line (`Allergies: PCN, sulfa`).
    Inline,
    Bulleted,
    Tabular,
    /// Segmenter-provided `allergies` section.
    Section,
}

impl AllergySource {
    pub fn label(&self) -> &'static str {
        match self {
            AllergySource::Sentinel => "sentinel",
            AllergySource::Inline => "inline",
            AllergySource::Bulleted => "bulleted",
            AllergySource::Tabular => "tabular",
            AllergySource::Section => "section",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allergy {
    pub substance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction: Option<String>,
    pub source: AllergySource,
    pub raw: String,
}

impl Allergy {
    /// The "no known drug allergies" sentinel.
    pub fn nkda(raw: &str) -> Self {
        Self {
            substance: NKDA.to_string(),
            reaction: None,
            source: AllergySource::Sentinel,
            raw: raw.to_string(),
        }
    }

    pub fn is_nkda(&self) -> bool {
        self.source == AllergySource::Sentinel && self.substance == NKDA
    }
}
