//! Clinote Core Library
//!
//! Rule-based entity extraction for unstructured clinical notes.
//!
//! # Architecture
//!
//! ```text
//! Raw note text
//!       │
//!   Normalize (line endings, whitespace, blank runs)
//!       │
//!   Segment (header synonyms → canonical sections, "__full" always kept)
//!       │
//!       ├──────────┬──────────┬───────────┬────────────┬──────────────┐
//!       ▼          ▼          ▼           ▼            ▼              ▼
//!    Vitals      Labs     Allergies   Diagnoses   Demographics   Medications
//!  table>minmax  combo,   NKDA first  problems,
//!   >inline     delimited, then block  numbered,
//!               spaced                 keywords
//!       │          │          │           │            │              │
//!       └──────────┴──────────┴─────┬─────┴────────────┴──────────────┘
//!                                   ▼
//!                     Merge / dedup → Confidence + warnings
//!                                   │
//!                                   ▼
//!                              ParseResult
//! ```
//!
//! # Core Principle
//!
//! **Never fail on malformed notes.** Extraction misses become missing
//! fields plus warnings; only blank input is rejected.
//!
//! # Modules
//!
//! - [`config`]: Pattern data (vocabulary, lab allow-list, diagnosis keywords)
//! - [`normalize`]: Text normalization
//! - [`sections`]: Section vocabulary and segmenter
//! - [`extract`]: Field extractors
//! - [`parser`]: Orchestrator and confidence scoring
//! - [`models`]: Result types

pub mod config;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod sections;

// Re-export commonly used types
pub use config::{ConfigError, DiagnosisKeyword, ParserConfig};
pub use models::{
    Allergy, AllergySource, Demographics, ExtractionTrace, Gender, LabFlag, LabFormat, LabResult,
    LabValue, Medication, ParseReport, ParseResult, TraceEntry, VitalName, VitalReading,
    VitalSource, VitalValue,
};
pub use normalize::{normalize, NormalizedText};
pub use parser::{Parser, ParserError, ParserResult};
pub use sections::{SectionVocabulary, Segmentation, Segmenter};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::sync::Arc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinoteError {
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<ParserError> for ClinoteError {
    fn from(e: ParserError) -> Self {
        match e {
            ParserError::EmptyInput => ClinoteError::EmptyInput(e.to_string()),
            ParserError::Config(inner) => ClinoteError::ConfigError(inner.to_string()),
        }
    }
}

impl From<ConfigError> for ClinoteError {
    fn from(e: ConfigError) -> Self {
        ClinoteError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for ClinoteError {
    fn from(e: serde_json::Error) -> Self {
        ClinoteError::SerializationError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Create a parser with the built-in configuration.
#[uniffi::export]
pub fn new_parser() -> Arc<ClinoteCore> {
    Arc::new(ClinoteCore {
        parser: Arc::new(Parser::new()),
    })
}

/// Create a parser from a JSON configuration; missing fields keep defaults.
#[uniffi::export]
pub fn new_parser_with_config(config_json: String) -> Result<Arc<ClinoteCore>, ClinoteError> {
    let config = ParserConfig::from_json(&config_json)?;
    Ok(Arc::new(ClinoteCore {
        parser: Arc::new(Parser::with_config(config)?),
    }))
}

/// Parse a note with the built-in configuration.
#[uniffi::export]
pub fn parse_note(text: String) -> Result<FfiParseResult, ClinoteError> {
    let result = Parser::new().parse(&text)?;
    Ok(result.into())
}

/// Parse a note and include the per-field strategy trace.
#[uniffi::export]
pub fn parse_note_with_trace(text: String) -> Result<FfiParseReport, ClinoteError> {
    let report = Parser::new().parse_with_trace(&text)?;
    Ok(report.into())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Reusable parser handle for FFI. Safe to share across threads.
#[derive(uniffi::Object)]
pub struct ClinoteCore {
    parser: Arc<Parser>,
}

#[uniffi::export]
impl ClinoteCore {
    /// Parse a raw note.
    pub fn parse(&self, text: String) -> Result<FfiParseResult, ClinoteError> {
        Ok(self.parser.parse(&text)?.into())
    }

    /// Parse a raw note with the strategy trace.
    pub fn parse_with_trace(&self, text: String) -> Result<FfiParseReport, ClinoteError> {
        Ok(self.parser.parse_with_trace(&text)?.into())
    }

    /// Parse a raw note and return the result as JSON.
    pub fn parse_json(&self, text: String) -> Result<String, ClinoteError> {
        let result = self.parser.parse(&text)?;
        Ok(serde_json::to_string(&result)?)
    }

    /// Active configuration as JSON.
    pub fn config_json(&self) -> Result<String, ClinoteError> {
        Ok(serde_json::to_string_pretty(self.parser.config())?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe vital reading.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVital {
    pub name: String,
    /// `"141/76"` for blood pressure, the number otherwise.
    pub value: String,
    pub numeric_value: Option<f64>,
    pub unit: String,
    pub source: String,
    pub raw: String,
}

impl From<VitalReading> for FfiVital {
    fn from(reading: VitalReading) -> Self {
        Self {
            name: reading.name.label().to_string(),
            value: reading.value.to_string(),
            numeric_value: reading.value.as_f64(),
            unit: reading.unit,
            source: reading.source.label().to_string(),
            raw: reading.raw,
        }
    }
}

/// FFI-safe lab result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLab {
    pub name: String,
    pub value: String,
    pub numeric_value: Option<f64>,
    pub unit: Option<String>,
    pub ref_range: Option<String>,
    /// `"(H)"`, `"(L)"`, or absent.
    pub flag: Option<String>,
    /// ISO date of the reporting column, when known.
    pub collected: Option<String>,
    pub source: String,
    pub raw: String,
}

impl From<LabResult> for FfiLab {
    fn from(lab: LabResult) -> Self {
        Self {
            name: lab.name,
            value: lab.value.to_string(),
            numeric_value: lab.value.as_f64(),
            unit: lab.unit,
            ref_range: lab.ref_range,
            flag: lab.flag.map(|f| f.marker().to_string()),
            collected: lab.collected.map(|d| d.format("%Y-%m-%d").to_string()),
            source: lab.source.label().to_string(),
            raw: lab.raw,
        }
    }
}

/// FFI-safe allergy.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAllergy {
    pub substance: String,
    pub reaction: Option<String>,
    pub source: String,
}

impl From<Allergy> for FfiAllergy {
    fn from(allergy: Allergy) -> Self {
        Self {
            substance: allergy.substance,
            reaction: allergy.reaction,
            source: allergy.source.label().to_string(),
        }
    }
}

/// FFI-safe medication.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedication {
    pub name: String,
    pub dose: Option<String>,
    pub frequency: Option<String>,
}

impl From<Medication> for FfiMedication {
    fn from(medication: Medication) -> Self {
        Self {
            name: medication.name,
            dose: medication.dose,
            frequency: medication.frequency,
        }
    }
}

/// FFI-safe parse result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiParseResult {
    pub sections: HashMap<String, String>,
    pub full_text: String,
    pub vitals: Vec<FfiVital>,
    pub labs: Vec<FfiLab>,
    pub allergies: Vec<FfiAllergy>,
    pub medications: Vec<FfiMedication>,
    pub diagnoses: Vec<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub confidence: f64,
    pub warnings: Vec<String>,
}

impl From<ParseResult> for FfiParseResult {
    fn from(result: ParseResult) -> Self {
        Self {
            sections: result.sections.into_iter().collect(),
            full_text: result.full_text,
            vitals: result.vitals.into_iter().map(|v| v.into()).collect(),
            labs: result.labs.into_iter().map(|l| l.into()).collect(),
            allergies: result.allergies.into_iter().map(|a| a.into()).collect(),
            medications: result.medications.into_iter().map(|m| m.into()).collect(),
            diagnoses: result.diagnoses,
            age: result.demographics.age,
            gender: result.demographics.gender.map(|g| g.as_str().to_string()),
            confidence: result.confidence,
            warnings: result.warnings,
        }
    }
}

/// FFI-safe trace entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTraceEntry {
    pub field: String,
    pub item: String,
    pub strategy: String,
    pub accepted: bool,
}

impl From<TraceEntry> for FfiTraceEntry {
    fn from(entry: TraceEntry) -> Self {
        Self {
            field: entry.field,
            item: entry.item,
            strategy: entry.strategy,
            accepted: entry.accepted,
        }
    }
}

/// FFI-safe parse report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiParseReport {
    pub result: FfiParseResult,
    pub trace: Vec<FfiTraceEntry>,
}

impl From<ParseReport> for FfiParseReport {
    fn from(report: ParseReport) -> Self {
        Self {
            result: report.result.into(),
            trace: report.trace.entries.into_iter().map(|e| e.into()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_ffi() {
        let result = parse_note(
            "BP  Pulse  Resp  Temp  SpO2\n141/76  82  22  97 °F (36.1 °C)  99 %\nAssessment: syncope\nPlan: tilt table"
                .to_string(),
        )
        .unwrap();

        let bp = result.vitals.iter().find(|v| v.name == "BP").unwrap();
        assert_eq!(bp.value, "141/76");
        assert_eq!(bp.numeric_value, None);
        assert_eq!(bp.source, "table");
        assert!(result.sections.contains_key("__full"));
    }

    #[test]
    fn test_empty_input_error() {
        assert!(matches!(
            parse_note("   ".to_string()),
            Err(ClinoteError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_parser_object_with_config() {
        let core = new_parser_with_config(r#"{"min_headers": 1}"#.to_string()).unwrap();
        let report = core.parse_with_trace("Plan: rest\nSodium 139".to_string()).unwrap();
        assert_eq!(report.result.labs[0].value, "139");
        assert!(report.trace.iter().any(|e| e.field == "labs" && e.strategy == "spaced"));
        assert!(report.result.warnings.is_empty(), "{:?}", report.result.warnings);
    }

    #[test]
    fn test_invalid_config_json() {
        assert!(matches!(
            new_parser_with_config("{".to_string()),
            Err(ClinoteError::ConfigError(_))
        ));
    }

    #[test]
    fn test_parse_json_uses_camel_case() {
        let json = new_parser()
            .parse_json("Assessment: cough\nPlan: rest".to_string())
            .unwrap();
        assert!(json.contains("\"fullText\""));
        assert!(json.contains("\"__full\""));
    }
}
