//! Allergy extraction.
//!
//! An explicit "no known allergies" statement anywhere wins outright.
//! Otherwise the block under an allergy header is read until the next
//! section-like boundary. With no header there is no allergy data.

use regex::Regex;

use super::lines::{is_block_boundary, is_list_item, split_list, strip_bullet, title_case};
use crate::config::{compile, ConfigResult};
use crate::models::{Allergy, AllergySource};
use crate::sections::{SectionVocabulary, Segmentation, ALLERGIES};

/// Lines read under a header before giving up on finding a boundary.
const MAX_BLOCK_LINES: usize = 25;

/// Words that start the reaction part of an unpunctuated entry.
const REACTION_WORDS: [&str; 18] = [
    "rash",
    "hives",
    "urticaria",
    "anaphylaxis",
    "swelling",
    "angioedema",
    "itching",
    "pruritus",
    "nausea",
    "vomiting",
    "diarrhea",
    "gi upset",
    "shortness of breath",
    "wheezing",
    "throat swelling",
    "hypotension",
    "intolerance",
    "unknown",
];

/// Severity words dropped from reactions.
const SEVERITY_WORDS: [&str; 5] = ["mild", "moderate", "severe", "high", "low"];

/// Header-anchored allergy extractor.
pub struct AllergyExtractor {
    vocabulary: SectionVocabulary,
    nkda: Regex,
    header: Regex,
    table_header: Regex,
    negated: Regex,
}

impl AllergyExtractor {
    pub fn new(vocabulary: &SectionVocabulary) -> ConfigResult<Self> {
        Ok(Self {
            vocabulary: vocabulary.clone(),
            nkda: compile(r"(?i)\bno known (?:drug )?allergies\b|\bnkda\b|\bnka\b")?,
            header: compile(
                r"(?i)^(?:drug allergies|allergies/adverse reactions|allerg(?:ies|y|ens|en))\b ?(?:[:=-] ?(?P<rest>.*))?$",
            )?,
            table_header: compile(
                r"(?i)^(?:allergen|substance|agent)s?\b.*\b(?:reaction|severity|type)\b",
            )?,
            negated: compile(r"(?i)^(?:none|nkda|nka|no known\b.*|n/a|not on file)$")?,
        })
    }

    /// Extract allergies. `[NKDA]` for an explicit negative, empty when no
    /// allergy information exists.
    pub fn extract(&self, text: &str, sections: Option<&Segmentation>) -> Vec<Allergy> {
        if let Some(m) = self.nkda.find(text) {
            tracing::debug!(phrase = m.as_str(), "allergy sentinel");
            return vec![Allergy::nkda(m.as_str())];
        }

        let found = self.extract_blocks(text);
        if !found.is_empty() {
            return found;
        }

        // Segmenter may have recognized a header variant the block scan missed
        match sections.and_then(|s| s.get(ALLERGIES)) {
            Some(content) => {
                let entries = content
                    .lines()
                    .flat_map(|line| self.parse_line(line, AllergySource::Section))
                    .collect();
                dedup_allergies(entries)
            }
            None => Vec::new(),
        }
    }

    fn extract_blocks(&self, text: &str) -> Vec<Allergy> {
        let lines: Vec<&str> = text.lines().collect();
        let mut entries = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let line = line.trim();
            let mut table: Option<TableLayout> = None;
            if let Some(caps) = self.header.captures(line) {
                if let Some(rest) = caps.name("rest").map(|m| m.as_str().trim()) {
                    if !rest.is_empty() {
                        entries.extend(self.parse_line(rest, AllergySource::Inline));
                    }
                }
            } else if self.table_header.is_match(line) {
                table = Some(TableLayout::from_header(line));
            } else {
                continue;
            }

            for next in lines[idx + 1..].iter().take(MAX_BLOCK_LINES) {
                if is_block_boundary(next, &self.vocabulary) {
                    break;
                }
                if self.table_header.is_match(next.trim()) {
                    table = Some(TableLayout::from_header(next));
                    continue;
                }
                let entry = match table {
                    Some(layout) if !is_list_item(next) => {
                        self.parse_line(&layout.row(next), AllergySource::Tabular)
                    }
                    _ => self.parse_line(next, AllergySource::Bulleted),
                };
                entries.extend(entry);
            }
        }

        dedup_allergies(entries)
    }

    /// Parse one block line into zero or more entries.
    fn parse_line(&self, line: &str, source: AllergySource) -> Vec<Allergy> {
        let line = strip_bullet(line).trim();
        if line.is_empty() || self.header.is_match(line) {
            return Vec::new();
        }

        split_list(line)
            .into_iter()
            .filter_map(|item| {
                let (substance, reaction) = split_reaction(&item);
                let substance = substance.trim().trim_end_matches(['.', ':', '-']).trim();
                if substance.is_empty() || self.negated.is_match(substance) {
                    return None;
                }
                Some(Allergy {
                    substance: title_case(substance),
                    reaction,
                    source,
                    raw: item.clone(),
                })
            })
            .collect()
    }
}

/// Columns of an allergy table, read from its header row.
///
/// Rows arrive single-spaced, so cells are recovered from the known
/// column order rather than from alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableLayout {
    reaction: bool,
    severity: bool,
}

impl TableLayout {
    fn from_header(header: &str) -> Self {
        let header = header.to_lowercase();
        Self {
            reaction: header.contains("reaction"),
            severity: header.contains("severity"),
        }
    }

    /// Rewrite a row as `substance - reaction` when its cells can be told apart.
    fn row(&self, line: &str) -> String {
        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        if self.severity && tokens.len() > 1 {
            if let Some(last) = tokens.last() {
                if is_severity(last) {
                    tokens.pop();
                }
            }
        }
        let row = tokens.join(" ");
        if row.contains('(') || row.contains(" - ") || row.contains(": ") || row.contains(',') {
            return row;
        }

        let lowered = row.to_lowercase();
        let by_word = REACTION_WORDS.iter().any(|word| {
            lowered
                .match_indices(word)
                .any(|(idx, _)| idx > 0 && lowered.as_bytes()[idx - 1] == b' ')
        });
        if by_word || !self.reaction || tokens.len() < 2 {
            return row;
        }
        format!("{} - {}", tokens[0], tokens[1..].join(" "))
    }
}

fn is_severity(token: &str) -> bool {
    let bare = token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    SEVERITY_WORDS.contains(&bare.as_str())
}

/// Split `substance (reaction)`, `substance - reaction`, `substance: reaction`,
/// or `substance <reaction word>…`.
fn split_reaction(item: &str) -> (String, Option<String>) {
    let item = item.trim();

    if let Some(open) = item.find('(') {
        let substance = &item[..open];
        let reaction = item[open + 1..].trim_end_matches(')');
        return (substance.to_string(), clean_reaction(reaction));
    }
    for separator in [" - ", " – ", ": ", " / "] {
        if let Some((substance, reaction)) = item.split_once(separator) {
            return (substance.to_string(), clean_reaction(reaction));
        }
    }

    let lowered = item.to_lowercase();
    let split = REACTION_WORDS
        .iter()
        .filter_map(|word| {
            lowered
                .match_indices(word)
                .find(|(idx, _)| *idx > 0 && lowered.as_bytes()[idx - 1] == b' ')
                .map(|(idx, _)| idx)
        })
        .min();
    match split {
        Some(idx) if item.is_char_boundary(idx) => {
            (item[..idx].to_string(), clean_reaction(&item[idx..]))
        }
        _ => (item.to_string(), None),
    }
}

fn clean_reaction(reaction: &str) -> Option<String> {
    let words: Vec<&str> = reaction
        .split_whitespace()
        .filter(|w| !is_severity(w))
        .collect();
    let cleaned = words.join(" ");
    let cleaned = cleaned.trim_matches(|c: char| c == ',' || c == '.' || c == '-' || c.is_whitespace());
    (!cleaned.is_empty()).then(|| cleaned.to_lowercase())
}

/// Keep the first entry per lowercase substance.
fn dedup_allergies(entries: Vec<Allergy>) -> Vec<Allergy> {
    let mut kept: Vec<Allergy> = Vec::new();
    for entry in entries {
        let key = entry.substance.to_lowercase();
        if !kept.iter().any(|k| k.substance.to_lowercase() == key) {
            kept.push(entry);
        }
    }
    kept
}
