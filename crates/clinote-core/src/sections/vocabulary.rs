//! Section header synonym dictionary.
//!
//! Maps the many ways EHR exports title a section ("HPI", "History of
//! Present Illness", "Chief Complaint") onto a fixed set of canonical
//! section names. A synonym may map to several sections, e.g.
//! "Assessment and Plan" opens both `assessment` and `plan`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

/// Current version of the built-in vocabulary.
pub const VOCABULARY_VERSION: u32 = 1;

pub const SUBJECTIVE: &str = "subjective";
pub const OBJECTIVE: &str = "objective";
pub const ASSESSMENT: &str = "assessment";
pub const PLAN: &str = "plan";
pub const ALLERGIES: &str = "allergies";
pub const MEDICATIONS: &str = "medications";
pub const LABS: &str = "labs";
pub const HISTORY: &str = "history";
pub const ROS: &str = "ros";

/// Key under which the segmenter stores the whole note.
pub const FULL_TEXT: &str = "__full";

/// Sections a complete note is expected to have.
pub const EXPECTED_SECTIONS: [&str; 4] = [SUBJECTIVE, OBJECTIVE, ASSESSMENT, PLAN];

/// Fuzzy matching ignores synonyms shorter than this.
const FUZZY_MIN_LEN: usize = 5;

/// Versioned canonical-name → synonyms dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionVocabulary {
    pub version: u32,
    pub sections: BTreeMap<String, Vec<String>>,
}

impl Default for SectionVocabulary {
    fn default() -> Self {
        Self {
            version: VOCABULARY_VERSION,
            sections: Self::default_sections(),
        }
    }
}

impl SectionVocabulary {
    /// Canonical sections whose synonyms match `header` exactly.
    pub fn lookup(&self, header: &str) -> Vec<&str> {
        let key = header_key(header);
        if key.is_empty() {
            return Vec::new();
        }
        self.sections
            .iter()
            .filter(|(_, synonyms)| synonyms.iter().any(|s| header_key(s) == key))
            .map(|(canonical, _)| canonical.as_str())
            .collect()
    }

    /// Canonical sections for the closest synonym, if it scores at least `threshold`.
    pub fn fuzzy_lookup(&self, header: &str, threshold: f64) -> Vec<&str> {
        let key = header_key(header);
        if key.chars().count() < FUZZY_MIN_LEN {
            return Vec::new();
        }

        let mut best: Option<(f64, String)> = None;
        for synonym in self.sections.values().flatten() {
            let candidate = header_key(synonym);
            if candidate.chars().count() < FUZZY_MIN_LEN {
                continue;
            }
            let score = jaro_winkler(&key, &candidate);
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, candidate));
            }
        }

        match best {
            Some((score, synonym)) if score >= threshold => self.lookup(&synonym),
            _ => Vec::new(),
        }
    }

    /// Whether a line opens a known section (`Plan:`, `PHYSICAL EXAM`, `Allergies: none`).
    pub fn is_section_start(&self, line: &str) -> bool {
        let line = line.trim();
        let head = match line.find(|c| c == ':' || c == '=') {
            Some(idx) => &line[..idx],
            None => line,
        };
        !self.lookup(head).is_empty()
    }

    /// Built-in synonym table.
    fn default_sections() -> BTreeMap<String, Vec<String>> {
        let table: [(&str, &[&str]); 9] = [
            (
                SUBJECTIVE,
                &[
                    "subjective",
                    "hpi",
                    "history of present illness",
                    "history of the present illness",
                    "chief complaint",
                    "cc",
                    "reason for visit",
                    "reason for consultation",
                    "reason for consult",
                    "presenting complaint",
                    "interval history",
                ],
            ),
            (
                OBJECTIVE,
                &[
                    "objective",
                    "physical exam",
                    "physical examination",
                    "exam",
                    "pe",
                    "vitals",
                    "vital signs",
                    "initial vitals",
                ],
            ),
            (
                ASSESSMENT,
                &[
                    "assessment",
                    "impression",
                    "clinical impression",
                    "assessment and plan",
                    "assessment/plan",
                    "impression and plan",
                    "impression/plan",
                    "a/p",
                    "a and p",
                    "medical decision making",
                    "mdm",
                    "problems addressed",
                    "diagnoses",
                    "diagnosis",
                ],
            ),
            (
                PLAN,
                &[
                    "plan",
                    "plans",
                    "plan of care",
                    "treatment plan",
                    "recommendations",
                    "assessment and plan",
                    "assessment/plan",
                    "impression and plan",
                    "impression/plan",
                    "a/p",
                    "a and p",
                    "disposition",
                ],
            ),
            (
                ALLERGIES,
                &[
                    "allergies",
                    "allergy",
                    "allergen",
                    "allergens",
                    "drug allergies",
                    "allergies/adverse reactions",
                    "adverse reactions",
                ],
            ),
            (
                MEDICATIONS,
                &[
                    "medications",
                    "meds",
                    "current medications",
                    "home medications",
                    "home meds",
                    "outpatient medications",
                    "medication list",
                    "active medications",
                ],
            ),
            (
                LABS,
                &[
                    "labs",
                    "lab results",
                    "laboratory",
                    "laboratory data",
                    "laboratory results",
                    "lab data",
                    "pertinent labs",
                    "results",
                ],
            ),
            (
                HISTORY,
                &[
                    "history",
                    "past medical history",
                    "pmh",
                    "medical history",
                    "past surgical history",
                    "psh",
                    "social history",
                    "family history",
                ],
            ),
            (ROS, &["ros", "review of systems"]),
        ];

        table
            .iter()
            .map(|(canonical, synonyms)| {
                (
                    canonical.to_string(),
                    synonyms.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect()
    }
}

/// Comparison key for a header: lowercase, `&` spelled out, punctuation dropped.
pub fn header_key(header: &str) -> String {
    let spelled = header.to_lowercase().replace('&', " and ");
    spelled
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '/' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_synonyms() {
        let vocab = SectionVocabulary::default();
        assert_eq!(vocab.lookup("HPI"), vec![SUBJECTIVE]);
        assert_eq!(vocab.lookup("Chief Complaint"), vec![SUBJECTIVE]);
        assert_eq!(vocab.lookup("PHYSICAL EXAM"), vec![OBJECTIVE]);
        assert_eq!(vocab.lookup("Vitals"), vec![OBJECTIVE]);
        assert_eq!(vocab.lookup("Problems Addressed"), vec![ASSESSMENT]);
        assert_eq!(vocab.lookup("Medical Decision Making"), vec![ASSESSMENT]);
    }

    #[test]
    fn test_combined_header_maps_to_both() {
        let vocab = SectionVocabulary::default();
        assert_eq!(vocab.lookup("Assessment & Plan"), vec![ASSESSMENT, PLAN]);
        assert_eq!(vocab.lookup("A/P"), vec![ASSESSMENT, PLAN]);
    }

    #[test]
    fn test_unknown_header() {
        let vocab = SectionVocabulary::default();
        assert!(vocab.lookup("Hospital Course").is_empty());
        assert!(vocab.lookup("").is_empty());
    }

    #[test]
    fn test_fuzzy_lookup() {
        let vocab = SectionVocabulary::default();
        assert_eq!(vocab.fuzzy_lookup("Assesment", 0.93), vec![ASSESSMENT]);
        assert_eq!(vocab.fuzzy_lookup("Medicatons", 0.93), vec![MEDICATIONS]);
        assert!(vocab.fuzzy_lookup("Sodium", 0.93).is_empty());
        // Short headers never match fuzzily
        assert!(vocab.fuzzy_lookup("Pln", 0.5).is_empty());
    }

    #[test]
    fn test_is_section_start() {
        let vocab = SectionVocabulary::default();
        assert!(vocab.is_section_start("PLAN:"));
        assert!(vocab.is_section_start("Medications: none"));
        assert!(vocab.is_section_start("Review of Systems"));
        assert!(!vocab.is_section_start("Penicillin - hives"));
    }

    #[test]
    fn test_header_key() {
        assert_eq!(header_key("  Assessment & Plan: "), "assessment and plan");
        assert_eq!(header_key("A/P"), "a/p");
    }
}
