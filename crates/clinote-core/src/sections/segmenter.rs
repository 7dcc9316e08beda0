//! Splits normalized note text into named sections.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use super::vocabulary::{SectionVocabulary, FULL_TEXT};
use crate::config::{compile, ConfigResult, ParserConfig};
use crate::normalize::NormalizedText;

/// Warning emitted when a note has too few explicit headers.
pub const FEW_HEADERS_WARNING: &str = "few explicit headers found; using fallback strategies";

/// Headers at or above this length are treated as content.
const MAX_HEADER_LEN: usize = 40;

/// Title-case headers with more words than this are treated as content.
const MAX_HEADER_WORDS: usize = 5;

/// Lowercase words allowed inside a title-case header.
const CONNECTORS: [&str; 8] = ["of", "and", "the", "for", "to", "in", "on", "with"];

/// A contiguous block of note text under one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    /// Canonical name, or the header verbatim when it is not in the vocabulary.
    pub key: String,
    /// Header text as written.
    pub header: String,
    pub content: String,
}

/// Output of segmentation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    /// Section key → content. Always holds [`FULL_TEXT`].
    pub sections: BTreeMap<String, String>,
    /// Sections in document order. A combined header produces one span per key.
    pub spans: Vec<SectionSpan>,
    /// Text before the first header.
    pub preamble: String,
    /// Number of explicit header lines found.
    pub header_count: usize,
    /// Whether the heuristic boundary pass supplied any section.
    pub used_fallback: bool,
    pub warnings: Vec<String>,
}

impl Segmentation {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.sections.get(key).map(String::as_str)
    }

    /// Whether a section exists and has content.
    pub fn has_content(&self, key: &str) -> bool {
        self.get(key).map_or(false, |c| !c.trim().is_empty())
    }

    pub fn full_text(&self) -> &str {
        self.get(FULL_TEXT).unwrap_or_default()
    }

    /// Keys of all sections found, excluding the full-text bucket.
    pub fn keys(&self) -> BTreeSet<&str> {
        self.sections
            .keys()
            .map(String::as_str)
            .filter(|k| *k != FULL_TEXT)
            .collect()
    }

    /// Preamble plus every span whose key is not in `excluded`.
    pub fn text_outside(&self, excluded: &[&str]) -> String {
        let mut parts = Vec::new();
        if !self.preamble.is_empty() {
            parts.push(self.preamble.as_str());
        }
        for span in &self.spans {
            if !excluded.contains(&span.key.as_str()) && !span.content.is_empty() {
                parts.push(span.content.as_str());
            }
        }
        parts.join("\n")
    }
}

/// A recognized header line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderMatch {
    keys: Vec<String>,
    header: String,
    inline: String,
    /// Keys come from the vocabulary.
    known: bool,
    /// Unknown all-caps line without a colon.
    shouted: bool,
}

impl HeaderMatch {
    fn new(keys: Vec<String>, header: &str, inline: &str, known: bool) -> Self {
        Self {
            keys,
            header: header.to_string(),
            inline: inline.to_string(),
            known,
            shouted: false,
        }
    }
}

/// Section segmenter driven by a [`SectionVocabulary`].
pub struct Segmenter {
    vocabulary: SectionVocabulary,
    min_headers: usize,
    fuzzy_threshold: f64,
    colon_header: Regex,
    fallback_header: Regex,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(&ParserConfig::default()).expect("built-in segmenter patterns compile")
    }
}

impl Segmenter {
    pub fn new(config: &ParserConfig) -> ConfigResult<Self> {
        Ok(Self {
            vocabulary: config.vocabulary.clone(),
            min_headers: config.min_headers,
            fuzzy_threshold: config.fuzzy_header_threshold,
            colon_header: compile(r"^(?P<head>[A-Za-z][A-Za-z /&()'\-]{0,58}?) ?[:=] ?(?P<rest>.*)$")?,
            fallback_header: compile(
                r"(?i)^(?P<head>assessment and plan|assessment|impression|a/p|plan)\b ?(?:-|–|—)? ?(?P<rest>\S.*)$",
            )?,
        })
    }

    pub fn vocabulary(&self) -> &SectionVocabulary {
        &self.vocabulary
    }

    /// Segment a note. Never fails; unmatched text stays in the preamble.
    pub fn segment(&self, text: &NormalizedText) -> Segmentation {
        let mut segmentation = self.segment_pass(text, false);

        if segmentation.header_count < self.min_headers {
            let fallback = self.segment_pass(text, true);
            if fallback.used_fallback {
                segmentation = fallback;
            }
            segmentation.warnings.push(FEW_HEADERS_WARNING.to_string());
        }

        tracing::debug!(
            headers = segmentation.header_count,
            sections = segmentation.sections.len() - 1,
            fallback = segmentation.used_fallback,
            "segmented note"
        );

        segmentation
    }

    fn segment_pass(&self, text: &NormalizedText, allow_fallback: bool) -> Segmentation {
        let mut result = Segmentation::default();
        let mut preamble: Vec<&str> = Vec::new();
        // (keys, header, content lines) of the open section
        let mut current: Option<(Vec<String>, String, Vec<String>)> = None;
        let mut current_known = false;

        for line in text.lines() {
            let header = match self.match_header(line) {
                // Shouted lines under a known section are its content (`CHF EXACERBATION`)
                Some(header) if header.shouted && current_known => None,
                Some(header) => {
                    result.header_count += 1;
                    Some(header)
                }
                None if allow_fallback => {
                    let header = self.match_fallback_header(line);
                    if header.is_some() {
                        result.used_fallback = true;
                    }
                    header
                }
                None => None,
            };

            match header {
                Some(header) => {
                    if let Some(open) = current.take() {
                        close_section(&mut result, open);
                    }
                    let mut lines = Vec::new();
                    if !header.inline.is_empty() {
                        lines.push(header.inline);
                    }
                    current_known = header.known;
                    current = Some((header.keys, header.header, lines));
                }
                None => match current.as_mut() {
                    Some((_, _, lines)) => lines.push(line.to_string()),
                    None => preamble.push(line),
                },
            }
        }
        if let Some(open) = current.take() {
            close_section(&mut result, open);
        }

        result.preamble = preamble.join("\n").trim().to_string();
        result
            .sections
            .insert(FULL_TEXT.to_string(), text.as_str().to_string());
        result
    }

    /// Classify a line as an explicit header.
    fn match_header(&self, line: &str) -> Option<HeaderMatch> {
        if let Some(caps) = self.colon_header.captures(line) {
            let head = caps["head"].trim();
            let rest = caps["rest"].trim();
            let keys = self.canonical_keys(head);
            if !keys.is_empty() {
                return Some(HeaderMatch::new(keys, head, rest, true));
            }
            if rest.is_empty() && head.len() < MAX_HEADER_LEN {
                return Some(HeaderMatch::new(vec![head.to_string()], head, "", false));
            }
            return None;
        }

        if !is_title_line(line) {
            return None;
        }
        let keys = self.canonical_keys(line);
        if !keys.is_empty() {
            return Some(HeaderMatch::new(keys, line, "", true));
        }
        // Unknown title lines only count when shouted
        if is_all_caps_header(line) {
            return Some(HeaderMatch {
                shouted: true,
                ..HeaderMatch::new(vec![line.to_string()], line, "", false)
            });
        }
        None
    }

    /// Heuristic boundary for notes without explicit headers (`Plan - continue meds`).
    fn match_fallback_header(&self, line: &str) -> Option<HeaderMatch> {
        let caps = self.fallback_header.captures(line)?;
        let head = caps["head"].to_string();
        let keys = self.canonical_keys(&head);
        if keys.is_empty() {
            return None;
        }
        Some(HeaderMatch::new(keys, &head, caps["rest"].trim(), true))
    }

    fn canonical_keys(&self, header: &str) -> Vec<String> {
        let exact = self.vocabulary.lookup(header);
        let keys = if exact.is_empty() {
            self.vocabulary.fuzzy_lookup(header, self.fuzzy_threshold)
        } else {
            exact
        };
        keys.into_iter().map(str::to_string).collect()
    }
}

fn close_section(result: &mut Segmentation, (keys, header, lines): (Vec<String>, String, Vec<String>)) {
    let content = lines.join("\n").trim().to_string();
    for key in keys {
        result
            .sections
            .entry(key.clone())
            .and_modify(|existing| {
                if !content.is_empty() {
                    if !existing.is_empty() {
                        existing.push('\n');
                    }
                    existing.push_str(&content);
                }
            })
            .or_insert_with(|| content.clone());
        result.spans.push(SectionSpan {
            key,
            header: header.clone(),
            content: content.clone(),
        });
    }
}

/// Short, digit-free line with every word capitalized.
fn is_title_line(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.len() >= MAX_HEADER_LEN || line.ends_with('.') {
        return false;
    }
    if line.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() > MAX_HEADER_WORDS {
        return false;
    }
    words.iter().all(|word| {
        if CONNECTORS.contains(word) {
            return true;
        }
        match word.chars().find(|c| c.is_alphabetic()) {
            Some(first) => first.is_uppercase(),
            // Connectors like "&" or "/"
            None => true,
        }
    }) && words.iter().any(|w| w.chars().any(char::is_alphabetic))
}

fn is_all_caps_header(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    let words = line.split_whitespace().count();
    letters.iter().all(|c| c.is_uppercase()) && (words >= 2 || letters.len() >= 6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::sections::{ASSESSMENT, OBJECTIVE, PLAN, SUBJECTIVE};

    fn segment(raw: &str) -> Segmentation {
        Segmenter::default().segment(&normalize(raw))
    }

    #[test]
    fn test_basic_soap_note() {
        let seg = segment(
            "CHIEF COMPLAINT:\nChest pain\n\nPHYSICAL EXAM:\nLungs clear\n\nASSESSMENT:\n1. Chest pain, likely angina\n\nPLAN:\n1. EKG now",
        );

        assert_eq!(seg.get(SUBJECTIVE), Some("Chest pain"));
        assert_eq!(seg.get(OBJECTIVE), Some("Lungs clear"));
        assert_eq!(seg.get(ASSESSMENT), Some("1. Chest pain, likely angina"));
        assert_eq!(seg.get(PLAN), Some("1. EKG now"));
        assert_eq!(seg.header_count, 4);
        assert!(seg.warnings.is_empty());
        assert!(seg.full_text().starts_with("CHIEF COMPLAINT:"));
    }

    #[test]
    fn test_inline_header_content() {
        let seg = segment("HPI: 68yo M with dyspnea\nAssessment: CHF exacerbation\nPlan: diurese");
        assert_eq!(seg.get(SUBJECTIVE), Some("68yo M with dyspnea"));
        assert_eq!(seg.get(ASSESSMENT), Some("CHF exacerbation"));
        assert_eq!(seg.get(PLAN), Some("diurese"));
    }

    #[test]
    fn test_value_lines_are_not_headers() {
        let seg = segment("Vitals:\nBP: 140/85\nHR: 92\nSodium: 139\nAssessment:\nStable");
        assert_eq!(seg.header_count, 2);
        assert_eq!(seg.get(OBJECTIVE), Some("BP: 140/85\nHR: 92\nSodium: 139"));
    }

    #[test]
    fn test_combined_assessment_and_plan() {
        let seg = segment("HPI:\nDyspnea\nAssessment and Plan:\n1. HFrEF - diurese");
        assert_eq!(seg.get(ASSESSMENT), Some("1. HFrEF - diurese"));
        assert_eq!(seg.get(PLAN), Some("1. HFrEF - diurese"));
    }

    #[test]
    fn test_unknown_headers_kept_verbatim() {
        let seg = segment("Hospital Course:\nUneventful\n\nDISCHARGE INSTRUCTIONS\nRest");
        assert_eq!(seg.get("Hospital Course"), Some("Uneventful"));
        assert_eq!(seg.get("DISCHARGE INSTRUCTIONS"), Some("Rest"));
    }

    #[test]
    fn test_shouted_lines_stay_in_known_section() {
        let seg = segment("HPI: dyspnea\nASSESSMENT:\nCHF EXACERBATION\nHYPERKALEMIA");
        assert_eq!(seg.get(ASSESSMENT), Some("CHF EXACERBATION\nHYPERKALEMIA"));
        assert_eq!(seg.header_count, 2);

        let seg = segment("ASSESSMENT:\nACUTE HEART FAILURE\nPLAN:\nDiuresis");
        assert_eq!(seg.get(ASSESSMENT), Some("ACUTE HEART FAILURE"));
        assert_eq!(seg.get(PLAN), Some("Diuresis"));
        assert!(!seg.sections.contains_key("ACUTE HEART FAILURE"));
    }

    #[test]
    fn test_title_case_known_header_without_colon() {
        let seg = segment("History of Present Illness\nCough for 3 days\nPhysical Exam\nWheezing");
        assert_eq!(seg.get(SUBJECTIVE), Some("Cough for 3 days"));
        assert_eq!(seg.get(OBJECTIVE), Some("Wheezing"));
    }

    #[test]
    fn test_fuzzy_header() {
        let seg = segment("Assesment:\nPneumonia\nPlan:\nAntibiotics");
        assert_eq!(seg.get(ASSESSMENT), Some("Pneumonia"));
    }

    #[test]
    fn test_no_headers_warns_and_keeps_full_text() {
        let seg = segment("Patient has pain.\nDid some tests.");
        assert_eq!(seg.header_count, 0);
        assert_eq!(seg.warnings, vec![FEW_HEADERS_WARNING.to_string()]);
        assert_eq!(seg.full_text(), "Patient has pain.\nDid some tests.");
        assert_eq!(seg.preamble, "Patient has pain.\nDid some tests.");
        assert!(seg.keys().is_empty());
    }

    #[test]
    fn test_fallback_boundaries() {
        let seg = segment("Seen for cough.\nImpression pneumonia\nPlan - start antibiotics");
        assert!(seg.used_fallback);
        assert_eq!(seg.get(ASSESSMENT), Some("pneumonia"));
        assert_eq!(seg.get(PLAN), Some("start antibiotics"));
        assert_eq!(seg.header_count, 0);
    }

    #[test]
    fn test_repeated_section_appends() {
        let seg = segment("Plan:\nEKG\nHPI:\nPain\nPlan:\nTroponin");
        assert_eq!(seg.get(PLAN), Some("EKG\nTroponin"));
    }

    #[test]
    fn test_text_outside() {
        let seg = segment("Intro line\nPlan:\nEKG\nHospital Course:\nStable");
        assert_eq!(seg.text_outside(&[PLAN]), "Intro line\nStable");
    }
}
