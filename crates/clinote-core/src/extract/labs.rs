//! Laboratory result extraction.
//!
//! Lines are split into segments and each segment is tried against three
//! formats in order: combo (`AST/ALT: 45/62`), delimited (`Sodium: 139`),
//! and spaced (`Sodium 139`). A name only becomes a result when it matches
//! the configured allow-list.

use chrono::NaiveDate;
use regex::Regex;

use super::lines::{parse_number, strip_bullet};
use crate::config::{compile, ConfigResult, ParserConfig};
use crate::models::{LabFlag, LabFormat, LabResult, LabValue};

/// Qualitative results accepted as text values.
const QUALITATIVE: [&str; 8] = [
    "negative",
    "positive",
    "pending",
    "not detected",
    "detected",
    "trace",
    "normal",
    "abnormal",
];

/// Empty cells in a multi-date row.
const PLACEHOLDERS: [&str; 5] = ["-", "--", "---", "–", "n/a"];

/// Names this short need a clean value to count (`Pt 5 days post CABG` is prose).
const SHORT_NAME_CHARS: usize = 2;

/// One whitespace token of a value run.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number {
        value: f64,
        flag: Option<LabFlag>,
        unit: Option<String>,
    },
    Compared(String),
    Flag(LabFlag),
    Unit(String),
    /// Empty or text cell between values.
    Placeholder,
    Other,
}

/// Value portion of a lab line after the name.
#[derive(Debug, Clone, PartialEq)]
struct ParsedValue {
    value: LabValue,
    unit: Option<String>,
    ref_range: Option<String>,
    flag: Option<LabFlag>,
    /// The value run ended at a word that is not a unit or flag.
    prose_after: bool,
}

/// Allow-list gated lab extractor.
pub struct LabExtractor {
    allow: Regex,
    admin_line: Regex,
    date: Regex,
    time: Regex,
    age_phrase: Regex,
    dosing: Regex,
    combo: Regex,
    delimited: Regex,
    spaced: Regex,
    range: Regex,
    trailing_range: Regex,
    bound: Regex,
    paren_flag: Regex,
    parenthetical: Regex,
    unit: Regex,
}

impl LabExtractor {
    pub fn new(config: &ParserConfig) -> ConfigResult<Self> {
        let names = config
            .lab_allow_list
            .iter()
            .map(|p| format!("(?:{})", p))
            .collect::<Vec<_>>()
            .join("|");
        let qualifier = r"(?:serum|plasma|whole blood|poc|total)";

        Ok(Self {
            allow: compile(&format!(
                r"(?i)^(?:{qualifier} )?(?:{names})(?: (?:level|lvl|{qualifier}))*(?: ?\([^)]*\))?$"
            ))?,
            admin_line: compile(
                r"(?i)^(?:date|time|patient|name|mrn|dob|collected|received|reported|ordered|account|encounter|provider|location)\b",
            )?,
            date: compile(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b|\b\d{4}-\d{2}-\d{2}\b")?,
            time: compile(r"\b\d{1,2}:\d{2}(?::\d{2})?\b")?,
            age_phrase: compile(r"(?i)\b\d{1,3} ?-?(?:yo\b|y/o|y\.o\.|years?\b|yrs?\b)")?,
            dosing: compile(
                r"(?i)\b(?:daily|bid|tid|qid|qhs|qam|qpm|prn|q\d{1,2}h|po|tabs?|capsules?|puffs?)\b",
            )?,
            combo: compile(
                r"^(?P<n1>[A-Za-z][A-Za-z0-9 \-]{0,30}?) ?/ ?(?P<n2>[A-Za-z][A-Za-z0-9 \-]{0,30}?) ?[:=]? ?(?P<v1>\d+(?:\.\d+)?) ?/ ?(?P<v2>\d+(?:\.\d+)?)(?P<rest>.*)$",
            )?,
            delimited: compile(r"^(?P<name>[A-Za-z][^:=]{0,40}?) ?[:=] ?(?P<rest>.+)$")?,
            spaced: compile(
                r"(?i)^(?P<name>[a-z][a-z0-9 ,.'()\-]{0,40}?)(?: (?:was|is|of|at))? (?P<rest>[<>]?=? ?\d.*)$",
            )?,
            range: compile(
                r"(?i)(?:\((?:ref(?:erence)?(?: range)?:? ?)?|\bref(?:erence)?(?: range)?:? ?)(?P<lo>\d+(?:\.\d+)?) ?- ?(?P<hi>\d+(?:\.\d+)?)\)?",
            )?,
            trailing_range: compile(r"(?:^| )(?P<lo>\d+(?:\.\d+)?)-(?P<hi>\d+(?:\.\d+)?)$")?,
            bound: compile(r"(?i)\((?:ref:? ?)?(?P<bound>[<>]=? ?\d+(?:\.\d+)?)\)")?,
            paren_flag: compile(r"(?i)\((?P<flag>hh|ll|h|l|high|low)\)")?,
            parenthetical: compile(r"\([^)]*\)")?,
            unit: compile(
                r"(?i)^(?:%|x ?10\^?\d+/[a-zµμ]+|[a-zµμ]{1,5}/[a-zµμ0-9./]{1,12}|mmol|meq|mg|g|iu|u|units|ng|pg|fl|sec|seconds|ratio)$",
            )?,
        })
    }

    /// Extract and deduplicate lab results.
    pub fn extract(&self, text: &str) -> Vec<LabResult> {
        dedup_labs(self.candidates(text)).0
    }

    /// All allow-listed results before deduplication, in document order.
    pub fn candidates(&self, text: &str) -> Vec<LabResult> {
        let mut results = Vec::new();
        let mut collected: Option<NaiveDate> = None;

        for line in text.lines() {
            let line = strip_bullet(line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(date) = self.date_row(line) {
                collected = Some(date);
                continue;
            }
            if self.admin_line.is_match(line) {
                continue;
            }

            for segment in split_segments(line) {
                let mut found = self.parse_segment(segment, line);
                for result in &mut found {
                    result.collected = collected;
                }
                results.extend(found);
            }
        }

        tracing::debug!(count = results.len(), "lab candidates");
        results
    }

    /// Whether `name` is an allow-listed lab.
    pub fn is_lab_name(&self, name: &str) -> bool {
        self.allow.is_match(name.trim())
    }

    /// Rightmost date of a line made only of dates and times.
    fn date_row(&self, line: &str) -> Option<NaiveDate> {
        let dates: Vec<NaiveDate> = self
            .date
            .find_iter(line)
            .filter_map(|m| parse_date(m.as_str()))
            .collect();
        if dates.is_empty() {
            return None;
        }
        let stripped = self.time.replace_all(&self.date.replace_all(line, ""), "").to_string();
        if stripped.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }
        dates.last().copied()
    }

    fn parse_segment(&self, segment: &str, raw: &str) -> Vec<LabResult> {
        if self.age_phrase.is_match(segment) || self.dosing.is_match(segment) {
            return Vec::new();
        }

        for format in LabFormat::PRIORITY {
            let found = match format {
                LabFormat::Combo => self.parse_combo(segment, raw),
                LabFormat::Delimited => self.parse_delimited(segment, raw).into_iter().collect(),
                LabFormat::Spaced => self.parse_spaced(segment, raw).into_iter().collect(),
            };
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    fn parse_combo(&self, segment: &str, raw: &str) -> Vec<LabResult> {
        let caps = match self.combo.captures(segment) {
            Some(caps) => caps,
            None => return Vec::new(),
        };
        let unit = caps["rest"]
            .split_whitespace()
            .map(|t| t.trim_end_matches([',', '.']))
            .find(|t| self.unit.is_match(t))
            .map(str::to_string);

        [("n1", "v1"), ("n2", "v2")]
            .iter()
            .filter_map(|(name, value)| {
                let name = caps[*name].trim();
                if !self.is_lab_name(name) {
                    return None;
                }
                let value = parse_number(&caps[*value])?;
                Some(LabResult {
                    name: name.to_string(),
                    value: LabValue::Number(value),
                    unit: unit.clone(),
                    ref_range: None,
                    flag: None,
                    collected: None,
                    source: LabFormat::Combo,
                    raw: raw.to_string(),
                })
            })
            .collect()
    }

    fn parse_delimited(&self, segment: &str, raw: &str) -> Option<LabResult> {
        let caps = self.delimited.captures(segment)?;
        let name = caps["name"].trim();
        let rest = &caps["rest"];

        if !self.is_lab_name(name) {
            // `BMP: Na 139` carries the lab after a panel label
            return self.parse_spaced(rest.trim(), raw);
        }

        let parsed = self.parse_value(rest)?;
        Some(self.result(name, parsed, LabFormat::Delimited, raw))
    }

    fn parse_spaced(&self, segment: &str, raw: &str) -> Option<LabResult> {
        let caps = self.spaced.captures(segment)?;
        let name = caps["name"].trim();
        if !self.is_lab_name(name) {
            return None;
        }
        let parsed = self.parse_value(&caps["rest"])?;
        if parsed.prose_after && name.chars().count() <= SHORT_NAME_CHARS {
            return None;
        }
        Some(self.result(name, parsed, LabFormat::Spaced, raw))
    }

    fn result(&self, name: &str, parsed: ParsedValue, source: LabFormat, raw: &str) -> LabResult {
        LabResult {
            name: name.to_string(),
            value: parsed.value,
            unit: parsed.unit,
            ref_range: parsed.ref_range,
            flag: parsed.flag,
            collected: None,
            source,
            raw: raw.to_string(),
        }
    }

    /// Parse `value [unit] [refRange] [flag]`, taking the last value of a
    /// leading run of values (one per reporting date).
    fn parse_value(&self, rest: &str) -> Option<ParsedValue> {
        let rest = rest.trim();
        let lowered = rest.to_lowercase();
        if let Some(word) = QUALITATIVE.iter().find(|q| lowered.starts_with(*q)) {
            return Some(ParsedValue {
                value: LabValue::Text(word.to_string()),
                unit: None,
                ref_range: None,
                flag: None,
                prose_after: false,
            });
        }

        let mut ref_range = self
            .bound
            .captures(rest)
            .map(|c| c["bound"].replace(' ', ""));
        let text = self.bound.replace_all(rest, " ");

        let text = match self.range.captures(&text) {
            Some(c) => {
                ref_range.get_or_insert_with(|| format!("{}-{}", &c["lo"], &c["hi"]));
                self.range.replace_all(&text, " ").to_string()
            }
            None => text.to_string(),
        };
        // Bare `lo-hi` only at the end of the line; elsewhere it is two columns
        let text = text.trim_end().to_string();
        let text = match self.trailing_range.captures(&text) {
            Some(c) if is_ascending(&c["lo"], &c["hi"]) => {
                ref_range.get_or_insert_with(|| format!("{}-{}", &c["lo"], &c["hi"]));
                self.trailing_range.replace_all(&text, " ").to_string()
            }
            _ => text,
        };
        let text = self.paren_flag.replace_all(&text, " $flag ");
        let text = self.parenthetical.replace_all(&text, " ");

        let tokens: Vec<Token> = text.split_whitespace().map(|t| self.token(t)).collect();
        let start = tokens
            .iter()
            .position(|t| matches!(t, Token::Number { .. } | Token::Compared(_)))?;

        let mut chosen = start;
        let mut flag = None;
        let mut unit = None;
        let mut prose_after = false;
        for (offset, token) in tokens[start..].iter().enumerate() {
            let idx = start + offset;
            match token {
                Token::Number { .. } if idx > start => {
                    chosen = idx;
                    flag = None;
                }
                Token::Number { .. } => {}
                Token::Compared(_) => break,
                Token::Flag(f) => flag = Some(*f),
                Token::Unit(u) => {
                    unit.get_or_insert_with(|| u.clone());
                }
                Token::Placeholder => {}
                Token::Other => {
                    prose_after = true;
                    break;
                }
            }
        }

        let value = match &tokens[chosen] {
            Token::Number {
                value,
                flag: attached,
                unit: attached_unit,
            } => {
                if flag.is_none() {
                    flag = *attached;
                }
                if let Some(u) = attached_unit {
                    unit.get_or_insert_with(|| u.clone());
                }
                LabValue::Number(*value)
            }
            Token::Compared(text) => LabValue::Text(text.clone()),
            _ => return None,
        };

        Some(ParsedValue {
            value,
            unit,
            ref_range,
            flag,
            prose_after,
        })
    }

    fn token(&self, raw: &str) -> Token {
        let token = raw.trim_end_matches([',', ';']);
        if let Some(flag) = LabFlag::from_token(token) {
            return Token::Flag(flag);
        }
        if token.starts_with(['<', '>']) {
            let digits = token.trim_start_matches(['<', '>', '=']);
            if parse_number(digits.trim_end_matches('.')).is_some() {
                return Token::Compared(token.trim_end_matches('.').to_string());
            }
        }

        let split = token
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
            .unwrap_or(token.len());
        let (number, suffix) = token.split_at(split);
        if let Some(value) = parse_number(number.trim_end_matches(['.', ','])) {
            if suffix.is_empty() {
                return Token::Number {
                    value,
                    flag: None,
                    unit: None,
                };
            }
            if let Some(flag) = LabFlag::from_token(suffix) {
                return Token::Number {
                    value,
                    flag: Some(flag),
                    unit: None,
                };
            }
            if self.unit.is_match(suffix) {
                return Token::Number {
                    value,
                    flag: None,
                    unit: Some(suffix.to_string()),
                };
            }
            return Token::Other;
        }

        let unit = token.trim_end_matches('.');
        if self.unit.is_match(unit) {
            return Token::Unit(unit.to_string());
        }
        let lowered = token.to_lowercase();
        if PLACEHOLDERS.contains(&lowered.as_str()) || QUALITATIVE.contains(&lowered.as_str()) {
            return Token::Placeholder;
        }
        Token::Other
    }
}

/// Keep the first result per `(name, value)`; also return the duplicates.
pub fn dedup_labs(candidates: Vec<LabResult>) -> (Vec<LabResult>, Vec<LabResult>) {
    let mut kept: Vec<LabResult> = Vec::new();
    let mut dropped = Vec::new();
    for candidate in candidates {
        let key = candidate.dedup_key();
        if kept.iter().any(|k| k.dedup_key() == key) {
            dropped.push(candidate);
        } else {
            kept.push(candidate);
        }
    }
    (kept, dropped)
}

/// Split a line at `;` and at `, ` followed by a letter.
fn split_segments(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    for (idx, c) in line.char_indices() {
        let split = match c {
            ';' => true,
            ',' => {
                bytes.get(idx + 1) == Some(&b' ')
                    && bytes.get(idx + 2).map_or(false, |b| b.is_ascii_alphabetic())
            }
            _ => false,
        };
        if split {
            segments.push(line[start..idx].trim());
            start = idx + 1;
        }
    }
    segments.push(line[start..].trim());
    segments.into_iter().filter(|s| !s.is_empty()).collect()
}

fn is_ascending(lo: &str, hi: &str) -> bool {
    matches!((parse_number(lo), parse_number(hi)), (Some(lo), Some(hi)) if lo < hi)
}

fn parse_date(token: &str) -> Option<NaiveDate> {
    if token.contains('-') {
        return NaiveDate::parse_from_str(token, "%Y-%m-%d").ok();
    }
    let year_len = token.rsplit('/').next().map_or(0, str::len);
    let format = if year_len == 2 { "%m/%d/%y" } else { "%m/%d/%Y" };
    NaiveDate::parse_from_str(token, format).ok()
}
