//! Parser configuration.
//!
//! All pattern data the extractors use lives here as immutable values.
//! Defaults are built in; overrides load from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sections::SectionVocabulary;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Compile a regex, mapping failures to [`ConfigError::InvalidPattern`].
pub(crate) fn compile(pattern: &str) -> ConfigResult<regex::Regex> {
    regex::Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// A keyword-fallback diagnosis entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisKeyword {
    /// Case-insensitive regex fragment, matched on word boundaries.
    pub pattern: String,
    /// Diagnosis string emitted on a hit.
    pub canonical: String,
}

impl DiagnosisKeyword {
    fn new(pattern: &str, canonical: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            canonical: canonical.to_string(),
        }
    }
}

/// Complete parser configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Section header synonyms.
    pub vocabulary: SectionVocabulary,
    /// Case-insensitive regex fragments naming recognized labs.
    pub lab_allow_list: Vec<String>,
    /// Keyword fallback dictionary for diagnoses.
    pub diagnosis_keywords: Vec<DiagnosisKeyword>,
    /// Fewer explicit headers than this triggers fallback segmentation.
    pub min_headers: usize,
    /// Minimum Jaro-Winkler similarity for a fuzzy header match.
    pub fuzzy_header_threshold: f64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            vocabulary: SectionVocabulary::default(),
            lab_allow_list: default_lab_allow_list(),
            diagnosis_keywords: default_diagnosis_keywords(),
            min_headers: 2,
            fuzzy_header_threshold: 0.93,
        }
    }
}

impl ParserConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Default lab allow-list.
fn default_lab_allow_list() -> Vec<String> {
    [
        // Cardiac
        r"(?:hs-?|high[- ]sensitivity )?troponin(?: ?[it])?",
        r"tn[it]",
        r"nt-?pro ?bnp",
        r"bnp",
        r"ck-?mb",
        r"ck",
        r"cpk",
        // Renal / electrolytes
        r"creatinine",
        r"cr",
        r"bun",
        r"urea",
        r"e?gfr",
        r"sodium",
        r"na",
        r"potassium",
        r"k",
        r"chloride",
        r"cl",
        r"bicarbonate",
        r"bicarb",
        r"hco3",
        r"co2",
        r"anion gap",
        r"glucose",
        r"calcium",
        r"ca",
        r"magnesium",
        r"mg",
        r"phosphorus",
        r"phos",
        r"uric acid",
        // CBC
        r"wbc",
        r"rbc",
        r"hemoglobin",
        r"hgb",
        r"hb",
        r"hematocrit",
        r"hct",
        r"platelets?",
        r"plt",
        r"mcv",
        r"rdw",
        r"neutrophils?",
        r"lymphocytes?",
        // Liver
        r"ast",
        r"alt",
        r"alp",
        r"alk(?:aline)? phos(?:phatase)?",
        r"(?:total |direct )?bilirubin",
        r"t\.? ?bili",
        r"albumin",
        r"total protein",
        r"lipase",
        r"amylase",
        // Coagulation
        r"inr",
        r"pt",
        r"a?ptt",
        r"d-?dimer",
        r"fibrinogen",
        // Lipids / endocrine
        r"(?:total )?cholesterol",
        r"ldl",
        r"hdl",
        r"triglycerides",
        r"(?:hb ?|hgb ?|hemoglobin )?a1c",
        r"tsh",
        r"free t4",
        r"ft4",
        // Inflammation / misc
        r"lactate",
        r"lactic acid",
        r"crp",
        r"esr",
        r"procalcitonin",
        r"ferritin",
        r"iron",
        r"b12",
        r"folate",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Default keyword fallback dictionary.
fn default_diagnosis_keywords() -> Vec<DiagnosisKeyword> {
    vec![
        DiagnosisKeyword::new(r"hfref", "Heart failure with reduced ejection fraction"),
        DiagnosisKeyword::new(r"hfpef", "Heart failure with preserved ejection fraction"),
        DiagnosisKeyword::new(r"heart failure|chf", "Heart failure"),
        DiagnosisKeyword::new(r"coronary artery disease|cad", "Coronary artery disease"),
        DiagnosisKeyword::new(r"nstemi", "NSTEMI"),
        DiagnosisKeyword::new(r"stemi", "STEMI"),
        DiagnosisKeyword::new(r"atrial fibrillation|a-?fib", "Atrial fibrillation"),
        DiagnosisKeyword::new(r"hypertension|htn", "Hypertension"),
        DiagnosisKeyword::new(r"hyperlipidemia|hld", "Hyperlipidemia"),
        DiagnosisKeyword::new(r"pneumonia", "Pneumonia"),
        DiagnosisKeyword::new(r"copd", "COPD"),
        DiagnosisKeyword::new(r"asthma", "Asthma"),
        DiagnosisKeyword::new(r"gerd", "GERD"),
        DiagnosisKeyword::new(
            r"(?:type (?:1|2|i|ii) )?diabetes(?: mellitus)?|t2dm|dm2|iddm|niddm",
            "Diabetes mellitus",
        ),
        DiagnosisKeyword::new(r"chronic kidney disease|ckd", "Chronic kidney disease"),
        DiagnosisKeyword::new(r"acute kidney injury|aki", "Acute kidney injury"),
        DiagnosisKeyword::new(r"sepsis", "Sepsis"),
        DiagnosisKeyword::new(r"urinary tract infection|uti", "Urinary tract infection"),
        DiagnosisKeyword::new(r"pulmonary embolism", "Pulmonary embolism"),
        DiagnosisKeyword::new(r"deep vein thrombosis|dvt", "Deep vein thrombosis"),
        DiagnosisKeyword::new(r"stroke|cva", "Stroke"),
        DiagnosisKeyword::new(r"anemia", "Anemia"),
        DiagnosisKeyword::new(r"hypothyroidism", "Hypothyroidism"),
        DiagnosisKeyword::new(r"cirrhosis", "Cirrhosis"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_patterns_compile() {
        let config = ParserConfig::default();
        for pattern in &config.lab_allow_list {
            assert!(compile(pattern).is_ok(), "bad lab pattern {}", pattern);
        }
        for keyword in &config.diagnosis_keywords {
            assert!(compile(&keyword.pattern).is_ok());
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ParserConfig::from_json(r#"{"min_headers": 3}"#).unwrap();
        assert_eq!(config.min_headers, 3);
        assert_eq!(config.lab_allow_list, default_lab_allow_list());
        assert_eq!(config.vocabulary, SectionVocabulary::default());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"diagnosis_keywords": [{{"pattern": "gout", "canonical": "Gout"}}]}}"#
        )
        .unwrap();

        let config = ParserConfig::from_path(file.path()).unwrap();
        assert_eq!(config.diagnosis_keywords.len(), 1);
        assert_eq!(config.diagnosis_keywords[0].canonical, "Gout");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ParserConfig::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            compile("(unclosed"),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}
