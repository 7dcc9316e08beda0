//! Age and gender.

use regex::Regex;

use crate::config::{compile, ConfigResult};
use crate::models::{Demographics, Gender};

/// Oldest age accepted.
const MAX_AGE: u32 = 120;

pub struct DemographicsExtractor {
    age_phrase: Regex,
    age_sex_compact: Regex,
    age_line: Regex,
    sex_line: Regex,
}

impl DemographicsExtractor {
    pub fn new() -> ConfigResult<Self> {
        Ok(Self {
            age_phrase: compile(
                r"(?i)\b(?P<age>\d{1,3})[ -]?(?:yo\b|y/o|y\.o\.?|years?[- ]old\b|yr[- ]old\b)(?:[ ]*(?P<sex>male|female|man|woman|gentleman|lady|boy|girl|m|f)\b)?",
            )?,
            age_sex_compact: compile(r"\b(?P<age>\d{1,3})(?P<sex>[MF])\b")?,
            age_line: compile(r"(?im)^age ?[:=] ?(?P<age>\d{1,3})\b")?,
            sex_line: compile(r"(?im)^(?:sex|gender) ?[:=] ?(?P<sex>male|female|m|f)\b")?,
        })
    }

    pub fn extract(&self, text: &str) -> Demographics {
        let mut demographics = Demographics::default();

        for pattern in [&self.age_line, &self.age_phrase, &self.age_sex_compact] {
            for caps in pattern.captures_iter(text) {
                let age = caps["age"].parse::<u32>().ok().filter(|a| *a <= MAX_AGE);
                if demographics.age.is_none() {
                    demographics.age = age;
                }
                if demographics.gender.is_none() && age.is_some() {
                    demographics.gender = caps.name("sex").and_then(|m| gender(m.as_str()));
                }
            }
        }

        if demographics.gender.is_none() {
            demographics.gender = self
                .sex_line
                .captures(text)
                .and_then(|caps| gender(&caps["sex"]));
        }

        demographics
    }
}

fn gender(word: &str) -> Option<Gender> {
    match word.to_lowercase().as_str() {
        "male" | "man" | "gentleman" | "boy" | "m" => Some(Gender::Male),
        "female" | "woman" | "lady" | "girl" | "f" => Some(Gender::Female),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Demographics {
        DemographicsExtractor::new().unwrap().extract(text)
    }

    #[test]
    fn test_age_phrase_with_gender() {
        let d = extract("68 yo male with chest pain");
        assert_eq!(d.age, Some(68));
        assert_eq!(d.gender, Some(Gender::Male));

        let d = extract("Pt is a 45-year-old woman presenting with cough");
        assert_eq!(d.age, Some(45));
        assert_eq!(d.gender, Some(Gender::Female));
    }

    #[test]
    fn test_compact_form() {
        let d = extract("72F with hx of CHF");
        assert_eq!(d.age, Some(72));
        assert_eq!(d.gender, Some(Gender::Female));
    }

    #[test]
    fn test_labelled_lines() {
        let d = extract("Age: 81\nSex: M");
        assert_eq!(d.age, Some(81));
        assert_eq!(d.gender, Some(Gender::Male));
    }

    #[test]
    fn test_implausible_age_ignored() {
        let d = extract("250 year old tree");
        assert!(d.age.is_none());
        assert!(d.is_empty());
    }

    #[test]
    fn test_nothing_found() {
        assert!(extract("Patient has pain.").is_empty());
    }
}
