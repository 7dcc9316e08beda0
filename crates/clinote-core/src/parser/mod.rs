//! Extraction orchestrator.
//!
//! Pipeline: Normalize → Segment → Extract (all fields) → Merge/Dedup → Confidence

mod confidence;

pub use confidence::*;

use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::config::{ConfigError, ConfigResult, ParserConfig};
use crate::extract::{
    dedup_diagnoses, dedup_labs, select_vitals, AllergyExtractor, DemographicsExtractor,
    DiagnosisExtractor, DiagnosisStrategy, LabExtractor, MedicationExtractor, VitalsExtractor,
};
use crate::models::{ExtractionTrace, ParseReport, ParseResult};
use crate::normalize::normalize;
use crate::sections::Segmenter;

/// Parser errors.
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Input text is empty")]
    EmptyInput,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type ParserResult<T> = Result<T, ParserError>;

/// Main parser that coordinates the full pipeline.
///
/// Holds only immutable compiled patterns, so one instance can serve
/// concurrent parses.
pub struct Parser {
    config: ParserConfig,
    segmenter: Segmenter,
    vitals: VitalsExtractor,
    labs: LabExtractor,
    allergies: AllergyExtractor,
    diagnoses: DiagnosisExtractor,
    demographics: DemographicsExtractor,
    medications: MedicationExtractor,
    cues: AttemptCues,
}

impl Default for Parser {
    fn default() -> Self {
        Self::with_config(ParserConfig::default()).expect("built-in parser patterns compile")
    }
}

impl Parser {
    /// Create a parser with the built-in configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser from a custom configuration.
    pub fn with_config(config: ParserConfig) -> ConfigResult<Self> {
        Ok(Self {
            segmenter: Segmenter::new(&config)?,
            vitals: VitalsExtractor::new()?,
            labs: LabExtractor::new(&config)?,
            allergies: AllergyExtractor::new(&config.vocabulary)?,
            diagnoses: DiagnosisExtractor::new(&config)?,
            demographics: DemographicsExtractor::new()?,
            medications: MedicationExtractor::new()?,
            cues: AttemptCues::new(&config)?,
            config,
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a raw note.
    ///
    /// Only blank input is an error; everything else degrades to missing
    /// fields plus warnings.
    pub fn parse(&self, raw: &str) -> ParserResult<ParseResult> {
        Ok(self.parse_with_trace(raw)?.result)
    }

    /// Parse a raw note and record which strategy produced each field.
    pub fn parse_with_trace(&self, raw: &str) -> ParserResult<ParseReport> {
        if raw.trim().is_empty() {
            return Err(ParserError::EmptyInput);
        }

        // Step 1: Normalize and segment
        let text = normalize(raw);
        let segmentation = self.segmenter.segment(&text);

        let mut trace = ExtractionTrace::default();
        let mut failures = Vec::new();

        // Step 2: Vitals, most structured source per vital
        let candidates = guarded("vitals", &mut failures, || self.vitals.extract(&text))
            .unwrap_or_default();
        let vitals = select_vitals(&candidates);
        for candidate in &candidates {
            let accepted = vitals
                .iter()
                .any(|v| v.name == candidate.name && v.source == candidate.source);
            trace.record("vitals", candidate.name.label(), candidate.source.label(), accepted);
        }

        // Step 3: Labs, deduplicated by (name, value)
        let candidates = guarded("labs", &mut failures, || self.labs.candidates(&text))
            .unwrap_or_default();
        let (labs, duplicates) = dedup_labs(candidates);
        for lab in &labs {
            trace.record("labs", &lab.name, lab.source.label(), true);
        }
        for lab in &duplicates {
            trace.record("labs", &lab.name, lab.source.label(), false);
        }

        // Step 4: Allergies, full text first then the allergies section
        let allergies = guarded("allergies", &mut failures, || {
            self.allergies.extract(&text, Some(&segmentation))
        })
        .unwrap_or_default();
        for allergy in &allergies {
            trace.record("allergies", &allergy.substance, allergy.source.label(), true);
        }

        // Step 5: Diagnoses, structured strategies before keywords
        let hits = guarded("diagnoses", &mut failures, || {
            self.diagnoses.candidates(&text, Some(&segmentation))
        })
        .unwrap_or_default();
        let (hits, duplicates) = dedup_diagnoses(hits);
        for hit in &hits {
            trace.record("diagnoses", &hit.text, hit.strategy.label(), true);
        }
        for hit in &duplicates {
            trace.record("diagnoses", &hit.text, hit.strategy.label(), false);
        }
        let keyword_only =
            !hits.is_empty() && hits.iter().all(|h| h.strategy == DiagnosisStrategy::Keyword);

        // Step 6: Demographics and medications
        let demographics = guarded("demographics", &mut failures, || {
            self.demographics.extract(&text)
        })
        .unwrap_or_default();
        if let Some(age) = demographics.age {
            trace.record("demographics", &format!("age {}", age), "pattern", true);
        }
        if let Some(gender) = demographics.gender {
            trace.record("demographics", gender.as_str(), "pattern", true);
        }

        let medications = guarded("medications", &mut failures, || {
            self.medications.extract(&segmentation)
        })
        .unwrap_or_default();
        for medication in &medications {
            trace.record("medications", &medication.name, "section", true);
        }

        // Step 7: Confidence and warnings
        let attempted = self.cues.count(&text);
        let breakdown = ConfidenceBreakdown::new(&segmentation, attempted, vitals.len() + labs.len());
        let confidence = breakdown.weighted_score();
        let mut warnings =
            parse_warnings(&segmentation, confidence, self.config.min_headers, keyword_only);
        warnings.extend(failures);

        tracing::info!(
            sections = segmentation.keys().len(),
            vitals = vitals.len(),
            labs = labs.len(),
            allergies = allergies.len(),
            diagnoses = hits.len(),
            confidence,
            warnings = warnings.len(),
            "parsed note"
        );

        let result = ParseResult {
            sections: segmentation.sections,
            full_text: text.into_string(),
            vitals,
            labs,
            allergies,
            medications,
            diagnoses: hits.into_iter().map(|h| h.text).collect(),
            demographics,
            confidence,
            warnings,
        };

        Ok(ParseReport { result, trace })
    }
}

/// Run one extractor, turning a panic into a warning and an empty field.
fn guarded<T>(field: &str, failures: &mut Vec<String>, run: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(field, "extractor panicked; continuing without it");
            failures.push(format!("{} extractor failed; field left empty", field));
            None
        }
    }
}
