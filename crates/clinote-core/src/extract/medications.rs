//! Medication list extraction from the medications section.

use regex::Regex;

use super::lines::{split_list, strip_bullet};
use crate::config::{compile, ConfigResult};
use crate::models::Medication;
use crate::sections::{Segmentation, MEDICATIONS};

pub struct MedicationExtractor {
    dose: Regex,
    frequency: Regex,
    route: Regex,
    empty: Regex,
}

impl MedicationExtractor {
    pub fn new() -> ConfigResult<Self> {
        Ok(Self {
            dose: compile(
                r"(?i)\b\d+(?:\.\d+)?(?: ?/ ?\d+(?:\.\d+)?)? ?(?:(?:mg|mcg|µg|g|units?|iu|meq|ml|puffs?|tabs?|tablets?|caps?|capsules?|drops?)\b|%)",
            )?,
            frequency: compile(
                r"(?i)\b(?:once daily|twice daily|daily|bid|tid|qid|qhs|qam|qpm|qod|qd|prn|q ?\d{1,2} ?h(?:rs?|ours)?|every \d{1,2} hours|at bedtime|nightly|weekly|as needed)\b",
            )?,
            route: compile(r"(?i)\b(?:po|iv|im|sq|sc|sl|pr|inh|by mouth|oral(?:ly)?)\b")?,
            empty: compile(r"(?i)^(?:none|no (?:home )?med(?:ication)?s?\b.*|n/a)$")?,
        })
    }

    /// Entries of the medications section, deduplicated by name.
    pub fn extract(&self, sections: &Segmentation) -> Vec<Medication> {
        let content = match sections.get(MEDICATIONS) {
            Some(content) => content,
            None => return Vec::new(),
        };

        let mut medications: Vec<Medication> = Vec::new();
        for line in content.lines() {
            let line = strip_bullet(line).trim();
            if line.is_empty() || line.ends_with(':') {
                continue;
            }
            for item in split_list(line) {
                if let Some(medication) = self.parse_item(&item) {
                    let key = medication.name.to_lowercase();
                    if !medications.iter().any(|m| m.name.to_lowercase() == key) {
                        medications.push(medication);
                    }
                }
            }
        }

        tracing::debug!(count = medications.len(), "medications");
        medications
    }

    fn parse_item(&self, item: &str) -> Option<Medication> {
        if self.empty.is_match(item) {
            return None;
        }

        let dose = self.dose.find(item);
        let frequency = self.frequency.find(item);
        let name_end = [dose.map(|m| m.start()), frequency.map(|m| m.start())]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(item.len());

        let name = self.route.replace_all(&item[..name_end], "");
        let name = name.trim().trim_end_matches([',', '-', ':']).trim();
        if name.is_empty() || !name.chars().any(char::is_alphabetic) {
            return None;
        }

        Some(Medication {
            name: name.to_string(),
            dose: dose.map(|m| m.as_str().to_string()),
            frequency: frequency.map(|m| m.as_str().to_lowercase()),
            raw: item.to_string(),
        })
    }
}
