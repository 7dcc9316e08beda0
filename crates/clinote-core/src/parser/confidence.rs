//! Confidence scoring and parse-level warnings.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{compile, ConfigResult, ParserConfig};
use crate::sections::{Segmentation, ASSESSMENT, EXPECTED_SECTIONS, FEW_HEADERS_WARNING, PLAN};

/// Emitted when neither an assessment nor a plan was found.
pub const MISSING_ASSESSMENT_PLAN_WARNING: &str =
    "CRITICAL: assessment and plan missing; no note can be generated from the extracted sections";

/// Emitted when every diagnosis came from the keyword scan.
pub const KEYWORD_ONLY_WARNING: &str = "diagnoses found only by keyword scan";

/// Scores below this add the few-headers warning.
pub const LOW_CONFIDENCE: f64 = 0.30;

const HEADER_WEIGHT: f64 = 0.40;
const ASSESSMENT_PLAN_WEIGHT: f64 = 0.35;
const YIELD_WEIGHT: f64 = 0.25;

/// Breakdown of how a parse was scored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceBreakdown {
    /// Fraction of expected sections found (0.0 - 1.0) - weight: 40%
    pub header_score: f64,
    /// Assessment or plan present (0.0 or 1.0) - weight: 35%
    pub assessment_plan_score: f64,
    /// Structured fields extracted per attemptable cue (0.0 - 1.0) - weight: 25%.
    /// `None` when the note had nothing that looked attemptable.
    pub yield_score: Option<f64>,
}

impl ConfidenceBreakdown {
    pub fn new(segmentation: &Segmentation, attempted: usize, extracted: usize) -> Self {
        let found = EXPECTED_SECTIONS
            .iter()
            .filter(|s| segmentation.sections.contains_key(**s))
            .count();
        let has_ap = segmentation.has_content(ASSESSMENT) || segmentation.has_content(PLAN);

        Self {
            header_score: found as f64 / EXPECTED_SECTIONS.len() as f64,
            assessment_plan_score: if has_ap { 1.0 } else { 0.0 },
            yield_score: (attempted > 0)
                .then(|| (extracted as f64 / attempted as f64).min(1.0)),
        }
    }

    /// Weighted score in [0, 1], rounded to two decimals.
    ///
    /// Without a yield term the remaining weights are renormalized.
    pub fn weighted_score(&self) -> f64 {
        let base = self.header_score * HEADER_WEIGHT
            + self.assessment_plan_score * ASSESSMENT_PLAN_WEIGHT;
        let score = match self.yield_score {
            Some(y) => base + y * YIELD_WEIGHT,
            None => base / (HEADER_WEIGHT + ASSESSMENT_PLAN_WEIGHT),
        };
        (score.clamp(0.0, 1.0) * 100.0).round() / 100.0
    }
}

/// Counts vitals and lab cues that an extractor could have picked up.
pub struct AttemptCues {
    vitals: Vec<Regex>,
    lab_line: Regex,
}

impl AttemptCues {
    pub fn new(config: &ParserConfig) -> ConfigResult<Self> {
        let names = config
            .lab_allow_list
            .iter()
            .map(|p| format!("(?:{})", p))
            .collect::<Vec<_>>()
            .join("|");

        let vitals = [
            r"(?i)\b(?:bp|b/p|blood pressure)\b",
            r"(?i)\b(?:hr|pulse|heart rate)\b",
            r"(?i)\b(?:rr|resp|respirations|respiratory rate)\b",
            r"(?i)\b(?:temp|temperature)\b",
            r"(?i)\b(?:spo2|sp02|o2 sat|sao2|room air)\b",
            r"(?i)\b(?:wt|weight)\b",
            r"(?i)\b(?:ht|height)\b",
        ]
        .iter()
        .map(|p| compile(p))
        .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            vitals,
            lab_line: compile(&format!(r"(?im)^(?:[-*•] )?(?:{names})\b[^\n]*\d"))?,
        })
    }

    /// Number of vitals mentioned plus lab-looking lines.
    pub fn count(&self, text: &str) -> usize {
        let vitals = self.vitals.iter().filter(|p| p.is_match(text)).count();
        let labs = self.lab_line.find_iter(text).count();
        vitals + labs
    }
}

/// Parse-level warnings, deduplicated, in emission order.
pub fn parse_warnings(
    segmentation: &Segmentation,
    confidence: f64,
    min_headers: usize,
    keyword_only: bool,
) -> Vec<String> {
    let mut warnings: Vec<String> = Vec::new();
    let mut push = |warning: &str| {
        if !warnings.iter().any(|w| w == warning) {
            warnings.push(warning.to_string());
        }
    };

    for warning in &segmentation.warnings {
        push(warning.as_str());
    }
    if segmentation.header_count < min_headers || confidence < LOW_CONFIDENCE {
        push(FEW_HEADERS_WARNING);
    }
    if !segmentation.has_content(ASSESSMENT) && !segmentation.has_content(PLAN) {
        push(MISSING_ASSESSMENT_PLAN_WARNING);
    }
    if keyword_only {
        push(KEYWORD_ONLY_WARNING);
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::sections::Segmenter;

    fn segment(text: &str) -> Segmentation {
        Segmenter::default().segment(&normalize(text))
    }

    #[test]
    fn test_weighted_score() {
        let full = ConfidenceBreakdown {
            header_score: 1.0,
            assessment_plan_score: 1.0,
            yield_score: Some(1.0),
        };
        assert_eq!(full.weighted_score(), 1.0);

        let partial = ConfidenceBreakdown {
            header_score: 0.5,
            assessment_plan_score: 1.0,
            yield_score: Some(0.0),
        };
        assert_eq!(partial.weighted_score(), 0.55);
    }

    #[test]
    fn test_renormalized_without_yield() {
        let breakdown = ConfidenceBreakdown {
            header_score: 0.75,
            assessment_plan_score: 1.0,
            yield_score: None,
        };
        assert_eq!(breakdown.weighted_score(), 0.87);
    }

    #[test]
    fn test_breakdown_from_segmentation() {
        let seg = segment("Subjective: cough\nObjective: clear\nAssessment: URI\nPlan: fluids");
        let breakdown = ConfidenceBreakdown::new(&seg, 4, 2);
        assert_eq!(breakdown.header_score, 1.0);
        assert_eq!(breakdown.assessment_plan_score, 1.0);
        assert_eq!(breakdown.yield_score, Some(0.5));
    }

    #[test]
    fn test_attempt_cues() {
        let cues = AttemptCues::new(&ParserConfig::default()).unwrap();
        assert_eq!(cues.count("BP 120/80, HR 70\nSodium 139\n- K 4.0"), 4);
        assert_eq!(cues.count("Patient has pain."), 0);
    }

    #[test]
    fn test_warnings_for_headerless_note() {
        let seg = segment("Patient has pain.\nDid some tests.");
        let warnings = parse_warnings(&seg, 0.0, 2, false);
        assert_eq!(warnings, vec![FEW_HEADERS_WARNING, MISSING_ASSESSMENT_PLAN_WARNING]);
    }

    #[test]
    fn test_keyword_only_warning() {
        let seg = segment("HPI: cough\nPlan: rest");
        let warnings = parse_warnings(&seg, 0.8, 2, true);
        assert_eq!(warnings, vec![KEYWORD_ONLY_WARNING]);
    }
}
