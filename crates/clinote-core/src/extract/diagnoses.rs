//! Diagnosis extraction.
//!
//! Three strategies are unioned:
//! - "Problems Addressed" blocks (`Chest pain: acute, uncomplicated`)
//! - numbered assessment lists (`1. Heart failure (HFrEF)`)
//! - a keyword scan that only supplements the structured results

use regex::Regex;

use super::lines::{is_block_boundary, sentence_case, strip_bullet};
use crate::config::{compile, ConfigResult, ParserConfig};
use crate::sections::{
    SectionVocabulary, Segmentation, ALLERGIES, ASSESSMENT, HISTORY, LABS, MEDICATIONS,
    OBJECTIVE, PLAN, ROS, SUBJECTIVE,
};

/// Lines read under a Problems Addressed header.
const MAX_BLOCK_LINES: usize = 25;

/// Characters before a keyword hit searched for a negation cue.
const NEGATION_WINDOW: usize = 30;

/// Sections whose numbered lists are not diagnoses.
const NON_ASSESSMENT: [&str; 8] = [
    PLAN,
    MEDICATIONS,
    ALLERGIES,
    LABS,
    OBJECTIVE,
    SUBJECTIVE,
    HISTORY,
    ROS,
];

/// Strategy that produced a diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosisStrategy {
    ProblemsAddressed,
    NumberedList,
    Keyword,
}

impl DiagnosisStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosisStrategy::ProblemsAddressed => "problems_addressed",
            DiagnosisStrategy::NumberedList => "numbered_list",
            DiagnosisStrategy::Keyword => "keyword",
        }
    }
}

/// A diagnosis and the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisHit {
    pub text: String,
    pub strategy: DiagnosisStrategy,
}

impl DiagnosisHit {
    fn new(text: &str, strategy: DiagnosisStrategy) -> Option<Self> {
        let text = sentence_case(text);
        (text.chars().any(char::is_alphabetic)).then_some(Self { text, strategy })
    }
}

/// A compiled keyword entry.
struct Keyword {
    pattern: Regex,
    canonical: String,
}

pub struct DiagnosisExtractor {
    vocabulary: SectionVocabulary,
    problems_header: Regex,
    qualifier_line: Regex,
    cause_clause: Regex,
    numbered: Regex,
    gloss: Regex,
    negation: Regex,
    keywords: Vec<Keyword>,
}

impl DiagnosisExtractor {
    pub fn new(config: &ParserConfig) -> ConfigResult<Self> {
        let keywords = config
            .diagnosis_keywords
            .iter()
            .map(|k| {
                Ok(Keyword {
                    pattern: compile(&format!(r"(?i)\b(?:{})\b", k.pattern))?,
                    canonical: k.canonical.clone(),
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            vocabulary: config.vocabulary.clone(),
            problems_header: compile(r"(?i)^problems? addressed\b ?:? ?(?P<rest>.*)$")?,
            qualifier_line: compile(r"^(?P<text>[^:]{2,80}?) ?: ?(?P<qualifier>.*)$")?,
            cause_clause: compile(r"(?i) (?:likely |probably )?(?:due to|secondary to|2/2|caused by)\b.*$")?,
            numbered: compile(r"^(?:#\d{1,2}[.):]?|\d{1,2}[.)]) (?P<text>[A-Za-z].*)$")?,
            gloss: compile(r" ?\((?P<inner>[^()]*)\)")?,
            negation: compile(
                r"(?i)\b(?:no|not|denies|denied|negative for|without|r/o|rule out|ruled out|history of no)\b",
            )?,
            keywords,
        })
    }

    /// All hits before case-insensitive deduplication, in strategy order.
    pub fn candidates(&self, text: &str, sections: Option<&Segmentation>) -> Vec<DiagnosisHit> {
        let mut hits = self.problems_addressed(text);
        hits.extend(self.numbered_list(text, sections));

        let keyword_hits = self.keyword_scan(text, &hits);
        hits.extend(keyword_hits);

        tracing::debug!(count = hits.len(), "diagnosis candidates");
        hits
    }

    /// Deduplicated diagnoses.
    pub fn extract(&self, text: &str, sections: Option<&Segmentation>) -> Vec<DiagnosisHit> {
        dedup_diagnoses(self.candidates(text, sections)).0
    }

    fn problems_addressed(&self, text: &str) -> Vec<DiagnosisHit> {
        let lines: Vec<&str> = text.lines().collect();
        let mut hits = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let caps = match self.problems_header.captures(line.trim()) {
                Some(caps) => caps,
                None => continue,
            };

            let inline = caps["rest"].trim();
            if !inline.is_empty() {
                hits.extend(self.problem_line(inline));
            }
            for next in lines[idx + 1..].iter().take(MAX_BLOCK_LINES) {
                if is_block_boundary(next, &self.vocabulary) {
                    break;
                }
                hits.extend(self.problem_line(next));
            }
        }

        hits
    }

    fn problem_line(&self, line: &str) -> Option<DiagnosisHit> {
        let line = strip_bullet(line).trim();
        let text = match self.qualifier_line.captures(line) {
            Some(caps) => caps.name("text").map_or(line, |m| m.as_str()),
            None => line,
        };
        let text = self.cause_clause.replace(text, "");
        DiagnosisHit::new(&text, DiagnosisStrategy::ProblemsAddressed)
    }

    fn numbered_list(&self, text: &str, sections: Option<&Segmentation>) -> Vec<DiagnosisHit> {
        let scope = match sections {
            Some(s) if s.has_content(ASSESSMENT) => s.get(ASSESSMENT).unwrap_or_default().to_string(),
            Some(s) => s.text_outside(&NON_ASSESSMENT),
            None => text.to_string(),
        };

        scope
            .lines()
            .filter_map(|line| {
                let caps = self.numbered.captures(line.trim())?;
                let mut item = caps["text"].to_string();
                for separator in [": ", " - ", " – "] {
                    if let Some((head, _)) = item.split_once(separator) {
                        item = head.to_string();
                    }
                }
                let item = self.strip_glosses(&item);
                DiagnosisHit::new(&item, DiagnosisStrategy::NumberedList)
            })
            .collect()
    }

    /// Drop parentheticals that only restate an abbreviation, e.g. `(HFrEF)`.
    fn strip_glosses(&self, item: &str) -> String {
        self.gloss
            .replace_all(item, |caps: &regex::Captures<'_>| {
                if is_abbreviation(&caps["inner"]) {
                    String::new()
                } else {
                    caps[0].to_string()
                }
            })
            .trim()
            .to_string()
    }

    fn keyword_scan(&self, text: &str, structured: &[DiagnosisHit]) -> Vec<DiagnosisHit> {
        let mut found: Vec<DiagnosisHit> = Vec::new();

        for keyword in &self.keywords {
            let canonical = keyword.canonical.to_lowercase();
            let hit = keyword
                .pattern
                .find_iter(text)
                .find(|m| !self.is_negated(text, m.start()));
            let hit = match hit {
                Some(hit) => hit,
                None => continue,
            };

            let matched = hit.as_str().to_lowercase();
            let covered = structured.iter().chain(found.iter()).any(|existing| {
                let existing = existing.text.to_lowercase();
                existing.contains(&matched)
                    || existing.contains(&canonical)
                    || canonical.contains(&existing)
            });
            if !covered {
                found.extend(DiagnosisHit::new(&keyword.canonical, DiagnosisStrategy::Keyword));
            }
        }

        found
    }

    /// Whether a negation cue precedes `start` on the same line.
    fn is_negated(&self, text: &str, start: usize) -> bool {
        let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
        let mut window_start = start.saturating_sub(NEGATION_WINDOW).max(line_start);
        while !text.is_char_boundary(window_start) {
            window_start += 1;
        }
        self.negation.is_match(&text[window_start..start])
    }
}

/// Keep the first hit per lowercase text; also return the duplicates.
pub fn dedup_diagnoses(hits: Vec<DiagnosisHit>) -> (Vec<DiagnosisHit>, Vec<DiagnosisHit>) {
    let mut kept: Vec<DiagnosisHit> = Vec::new();
    let mut dropped = Vec::new();
    for hit in hits {
        if kept.iter().any(|k| k.text.eq_ignore_ascii_case(&hit.text)) {
            dropped.push(hit);
        } else {
            kept.push(hit);
        }
    }
    (kept, dropped)
}

/// `HFrEF`, `CAD`, `T2DM`: short, no spaces, at least two capitals.
fn is_abbreviation(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty()
        && text.chars().count() <= 10
        && !text.contains(char::is_whitespace)
        && text.chars().filter(|c| c.is_uppercase()).count() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::sections::Segmenter;

    fn extractor() -> DiagnosisExtractor {
        DiagnosisExtractor::new(&ParserConfig::default()).unwrap()
    }

    fn texts(hits: &[DiagnosisHit]) -> Vec<&str> {
        hits.iter().map(|h| h.text.as_str()).collect()
    }

    #[test]
    fn test_problems_addressed_block() {
        let text = "Problems Addressed:\nChest pain: acute, uncomplicated\n- Hypertension: chronic, stable\nAKI due to dehydration: acute\n\nPlan:\nAspirin";
        let hits = extractor().extract(text, None);
        let structured: Vec<_> = hits
            .iter()
            .filter(|h| h.strategy == DiagnosisStrategy::ProblemsAddressed)
            .map(|h| h.text.as_str())
            .collect();
        assert_eq!(structured, vec!["Chest pain", "Hypertension", "AKI"]);
    }

    #[test]
    fn test_numbered_list_strips_gloss() {
        let text = "Assessment:\n1. Heart failure with reduced ejection fraction (HFrEF)\n2. Pneumonia (left lower lobe)\n3. CAD: stable";
        let hits = extractor().extract(text, None);
        assert_eq!(
            texts(&hits)[..3],
            [
                "Heart failure with reduced ejection fraction",
                "Pneumonia (left lower lobe)",
                "CAD"
            ]
        );
    }

    #[test]
    fn test_numbered_list_scoped_to_assessment() {
        let text = normalize(
            "CHIEF COMPLAINT:\nChest pain\n\nASSESSMENT:\n1. Chest pain, likely angina\n\nPLAN:\n1. EKG now",
        );
        let segmentation = Segmenter::default().segment(&text);
        let hits = extractor().extract(&text, Some(&segmentation));
        assert_eq!(texts(&hits), vec!["Chest pain, likely angina"]);
    }

    #[test]
    fn test_keyword_fallback() {
        let hits = extractor().extract("Pt with hx of HTN and COPD presents with cough.", None);
        assert_eq!(texts(&hits), vec!["Hypertension", "COPD"]);
        assert!(hits.iter().all(|h| h.strategy == DiagnosisStrategy::Keyword));
    }

    #[test]
    fn test_keyword_negation() {
        let hits = extractor().extract("Denies chest pain. No history of diabetes.\nCXR negative for pneumonia.", None);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_keyword_does_not_duplicate_structured() {
        let text = "Assessment:\n1. Heart failure\n2. Type 2 diabetes mellitus\nHistory of CHF and diabetes.";
        let hits = extractor().extract(text, None);
        let heart_failure = hits
            .iter()
            .filter(|h| h.text.eq_ignore_ascii_case("heart failure"))
            .count();
        assert_eq!(heart_failure, 1);
        assert!(hits.iter().all(|h| h.strategy == DiagnosisStrategy::NumberedList));
    }

    #[test]
    fn test_specific_keyword_covers_general() {
        let hits = extractor().extract("Known HFrEF, EF 25%. CHF clinic follow up.", None);
        assert_eq!(texts(&hits), vec!["Heart failure with reduced ejection fraction"]);
    }

    #[test]
    fn test_case_insensitive_dedup() {
        let (kept, dropped) = dedup_diagnoses(vec![
            DiagnosisHit::new("chest pain", DiagnosisStrategy::ProblemsAddressed).unwrap(),
            DiagnosisHit::new("CHEST PAIN", DiagnosisStrategy::NumberedList).unwrap(),
        ]);
        assert_eq!(texts(&kept), vec!["Chest pain"]);
        assert_eq!(dropped.len(), 1);
    }

    #[test]
    fn test_abbreviation_detection() {
        assert!(is_abbreviation("HFrEF"));
        assert!(is_abbreviation("T2DM"));
        assert!(!is_abbreviation("left lower lobe"));
        assert!(!is_abbreviation("mild"));
    }
}
