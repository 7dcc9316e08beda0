//! Vital sign extraction.
//!
//! Strategies, most structured first:
//! - Table: `BP Pulse Resp Temp SpO2` header followed by a data row
//! - MinMax: `Pulse Min: 70 Max: 110 88` (rightmost value is current)
//! - Inline: `BP: 140/85`, `HR 92`, `Temp 98.6F`
//!
//! Every strategy runs; each contributes at most one reading per vital.
//! [`select_vitals`] then keeps the most structured reading per vital.

use regex::Regex;

use crate::config::{compile, ConfigResult};
use crate::models::{VitalName, VitalReading, VitalSource, VitalValue};

/// Pounds to kilograms.
const LB_TO_KG: f64 = 0.45359237;

/// Inches to centimetres.
const IN_TO_CM: f64 = 2.54;

/// Unitless temperatures at or below this are Celsius.
const CELSIUS_CUTOFF: f64 = 45.0;

/// Unitless heights below this are inches.
const INCH_CUTOFF: f64 = 100.0;

/// Minimum share of header tokens that must name a vital column.
const TABLE_HEADER_RATIO: f64 = 0.8;

/// Header tokens that neither count for nor against a table header.
const NEUTRAL_HEADER_TOKENS: [&str; 7] =
    ["date", "time", "initial", "vitals", "vital", "signs", "recorded"];

/// A cell in a vitals table data row.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Pressure(u32, u32),
    Number { value: f64, unit: Option<String> },
    Blank,
}

/// Multi-strategy vital sign extractor.
pub struct VitalsExtractor {
    cell: Regex,
    minmax_line: Regex,
    pressure: Regex,
    number: Regex,
    inline: Vec<(VitalName, Regex)>,
    spo2_percent: Vec<Regex>,
    spo2_room_air: Regex,
}

impl VitalsExtractor {
    pub fn new() -> ConfigResult<Self> {
        let verb = r"(?: ?(?:is|was|of|at))?";
        Ok(Self {
            cell: compile(
                r"(?P<sys>\d{2,3}) ?/ ?(?P<dia>\d{2,3})|(?P<blank>--?)(?: |$)|(?P<num>\d+(?:\.\d+)?) ?(?:° ?)?(?P<unit>[FC]\b)?(?: ?\([^)]*\))?(?: ?%)?",
            )?,
            minmax_line: compile(
                r"(?i)^(?P<name>blood pressure|bp|heart rate|pulse|hr|respirations|resp|rr|temperature|temp|spo2|o2 sat|sao2)\b ?:? ?min\b ?:? ?(?P<rest>.+)$",
            )?,
            pressure: compile(r"(\d{2,3}) ?/ ?(\d{2,3})")?,
            number: compile(r"\d+(?:\.\d+)?")?,
            inline: vec![
                (
                    VitalName::Bp,
                    compile(&format!(
                        r"(?i)\b(?:bp|b/p|blood pressure){verb} ?[:=]? ?(?P<sys>\d{{2,3}}) ?/ ?(?P<dia>\d{{2,3}})"
                    ))?,
                ),
                (
                    VitalName::Hr,
                    compile(&format!(
                        r"(?i)\b(?:hr|heart rate|pulse(?: rate)?){verb} ?[:=]? ?(?P<num>\d{{2,3}})\b"
                    ))?,
                ),
                (
                    VitalName::Rr,
                    compile(&format!(
                        r"(?i)\b(?:rr|respiratory rate|resp(?:irations|s)?){verb} ?[:=]? ?(?P<num>\d{{1,2}})\b"
                    ))?,
                ),
                (
                    VitalName::Temp,
                    compile(&format!(
                        r"(?i)\b(?:(?:temperature|temp|tmax){verb} ?[:=]?|t ?:) ?(?P<num>\d{{2,3}}(?:\.\d+)?) ?(?:° ?)?(?P<unit>[fc]\b)?"
                    ))?,
                ),
                (
                    VitalName::Weight,
                    compile(&format!(
                        r"(?i)\b(?:weight|wt){verb} ?[:=]? ?(?P<num>\d{{1,3}}(?:\.\d+)?) ?(?P<unit>kgs?\b|kilograms?\b|lbs?\b|pounds?\b|#)?"
                    ))?,
                ),
                (
                    VitalName::Height,
                    compile(&format!(
                        r#"(?i)\b(?:height|ht){verb} ?[:=]? ?(?:(?P<ft>\d)' ?(?P<inch>\d{{1,2}}) ?(?:"|'')?|(?P<num>\d{{2,3}}(?:\.\d+)?) ?(?P<unit>cm\b|inches\b|in\b|")?)"#
                    ))?,
                ),
            ],
            spo2_percent: vec![
                compile(&format!(
                    r"(?i)\b(?:spo2|sp02|sao2|o2 ?sats?|o2 saturation|saturation|saturating|sats?|pulse ox(?:imetry)?){verb} ?[:=]? ?(?P<num>\d{{2,3}}) ?%"
                ))?,
                compile(r"(?i)\b(?P<num>\d{2,3}) ?% ?(?:on )?(?:ra|room air)\b")?,
            ],
            spo2_room_air: compile(r"(?i)\b(?P<num>\d{2,3}) on (?:ra|room air)\b")?,
        })
    }

    /// Run every strategy in priority order and return all candidates.
    pub fn extract(&self, text: &str) -> Vec<VitalReading> {
        VitalSource::PRIORITY
            .iter()
            .flat_map(|strategy| self.extract_with(*strategy, text))
            .collect()
    }

    /// Run a single strategy.
    pub fn extract_with(&self, strategy: VitalSource, text: &str) -> Vec<VitalReading> {
        let readings = match strategy {
            VitalSource::Table => self.extract_table(text),
            VitalSource::MinMax => self.extract_minmax(text),
            VitalSource::Inline => self.extract_inline(text),
        };
        tracing::debug!(strategy = strategy.label(), count = readings.len(), "vitals strategy");
        readings
    }

    fn extract_table(&self, text: &str) -> Vec<VitalReading> {
        let lines: Vec<&str> = text.lines().collect();
        let mut readings: Vec<VitalReading> = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let columns = match table_columns(line) {
                Some(columns) => columns,
                None => continue,
            };
            let data = match lines[idx + 1..].iter().find(|l| !l.trim().is_empty()) {
                Some(data) => *data,
                None => continue,
            };

            let mut cells = self.cells(data);
            if cells.len() > columns.len() {
                // Leading date/time cells fall off the left edge
                cells.drain(..cells.len() - columns.len());
            }

            for (name, cell) in columns.iter().zip(cells) {
                if readings.iter().any(|r| r.name == *name) {
                    continue;
                }
                if let Some(value) = cell_value(*name, cell) {
                    readings.push(VitalReading::new(*name, value, VitalSource::Table, data));
                }
            }
        }

        readings
    }

    fn cells(&self, data: &str) -> Vec<Cell> {
        self.cell
            .captures_iter(data)
            .filter_map(|caps| {
                if let (Some(sys), Some(dia)) = (caps.name("sys"), caps.name("dia")) {
                    return Some(Cell::Pressure(
                        sys.as_str().parse().ok()?,
                        dia.as_str().parse().ok()?,
                    ));
                }
                if caps.name("blank").is_some() {
                    return Some(Cell::Blank);
                }
                let value = caps.name("num")?.as_str().parse().ok()?;
                Some(Cell::Number {
                    value,
                    unit: caps.name("unit").map(|u| u.as_str().to_string()),
                })
            })
            .collect()
    }

    fn extract_minmax(&self, text: &str) -> Vec<VitalReading> {
        let mut readings: Vec<VitalReading> = Vec::new();

        for line in text.lines() {
            let caps = match self.minmax_line.captures(line.trim()) {
                Some(caps) => caps,
                None => continue,
            };
            let name = match minmax_name(&caps["name"]) {
                Some(name) => name,
                None => continue,
            };
            let rest = &caps["rest"];
            if readings.iter().any(|r| r.name == name) || !rest.to_lowercase().contains("max") {
                continue;
            }

            // min, max, then the current value
            let value = if name == VitalName::Bp {
                let pairs: Vec<(u32, u32)> = self
                    .pressure
                    .captures_iter(rest)
                    .filter_map(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?)))
                    .collect();
                if pairs.len() < 3 {
                    continue;
                }
                pairs
                    .last()
                    .and_then(|(sys, dia)| VitalValue::pressure(*sys, *dia))
            } else {
                let numbers: Vec<f64> = self
                    .number
                    .find_iter(rest)
                    .filter_map(|m| m.as_str().parse().ok())
                    .collect();
                if numbers.len() < 3 {
                    continue;
                }
                numbers
                    .last()
                    .and_then(|last| number_value(name, *last, None))
            };

            if let Some(value) = value {
                readings.push(VitalReading::new(name, value, VitalSource::MinMax, line));
            }
        }

        readings
    }

    fn extract_inline(&self, text: &str) -> Vec<VitalReading> {
        let mut readings = Vec::new();

        for (name, pattern) in &self.inline {
            let found = pattern.captures_iter(text).find_map(|caps| {
                let value = match name {
                    VitalName::Bp => VitalValue::pressure(
                        caps["sys"].parse().ok()?,
                        caps["dia"].parse().ok()?,
                    ),
                    VitalName::Height => height_value(&caps),
                    _ => {
                        let num = caps.name("num")?.as_str().parse().ok()?;
                        number_value(*name, num, caps.name("unit").map(|u| u.as_str()))
                    }
                }?;
                Some(VitalReading::new(*name, value, VitalSource::Inline, &caps[0]))
            });
            readings.extend(found);
        }

        readings.extend(self.extract_spo2(text));
        readings
    }

    /// `NN%` forms first; `NN on room air` only when no percent form matched.
    fn extract_spo2(&self, text: &str) -> Option<VitalReading> {
        let percent_hits: Vec<_> = self
            .spo2_percent
            .iter()
            .flat_map(|p| p.captures_iter(text))
            .collect();

        let candidates = if percent_hits.is_empty() {
            self.spo2_room_air.captures_iter(text).collect()
        } else {
            percent_hits
        };

        candidates.into_iter().find_map(|caps| {
            let num = caps["num"].parse().ok()?;
            let value = VitalValue::number(VitalName::SpO2, num)?;
            Some(VitalReading::new(
                VitalName::SpO2,
                value,
                VitalSource::Inline,
                &caps[0],
            ))
        })
    }
}

/// Pick one reading per vital, preferring table over minmax over inline.
pub fn select_vitals(candidates: &[VitalReading]) -> Vec<VitalReading> {
    VitalName::ALL
        .iter()
        .filter_map(|name| {
            candidates
                .iter()
                .filter(|c| c.name == *name)
                .max_by_key(|c| c.source)
                .cloned()
        })
        .collect()
}

/// Map a vitals table header line to its columns.
fn table_columns(line: &str) -> Option<Vec<VitalName>> {
    let mut columns = Vec::new();
    let mut counted = 0usize;
    for token in line.split_whitespace() {
        let key: String = token
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '/')
            .collect();
        if NEUTRAL_HEADER_TOKENS.contains(&key.as_str()) {
            continue;
        }
        counted += 1;
        if let Some(name) = column_name(&key) {
            columns.push(name);
        }
    }

    let enough = columns.len() >= 3 && columns.len() as f64 / counted as f64 >= TABLE_HEADER_RATIO;
    enough.then_some(columns)
}

fn column_name(key: &str) -> Option<VitalName> {
    match key {
        "bp" | "b/p" => Some(VitalName::Bp),
        "pulse" | "hr" => Some(VitalName::Hr),
        "resp" | "rr" | "respirations" => Some(VitalName::Rr),
        "temp" | "temperature" | "tmp" => Some(VitalName::Temp),
        "spo2" | "sp02" | "o2sat" | "sao2" | "sat" => Some(VitalName::SpO2),
        "wt" | "weight" => Some(VitalName::Weight),
        "ht" | "height" => Some(VitalName::Height),
        _ => None,
    }
}

fn minmax_name(name: &str) -> Option<VitalName> {
    match name.to_lowercase().as_str() {
        "bp" | "blood pressure" => Some(VitalName::Bp),
        "pulse" | "hr" | "heart rate" => Some(VitalName::Hr),
        "resp" | "rr" | "respirations" => Some(VitalName::Rr),
        "temp" | "temperature" => Some(VitalName::Temp),
        "spo2" | "o2 sat" | "sao2" => Some(VitalName::SpO2),
        _ => None,
    }
}

fn cell_value(name: VitalName, cell: Cell) -> Option<VitalValue> {
    match (name, cell) {
        (VitalName::Bp, Cell::Pressure(sys, dia)) => VitalValue::pressure(sys, dia),
        (VitalName::Bp, _) | (_, Cell::Pressure(..)) | (_, Cell::Blank) => None,
        (name, Cell::Number { value, unit }) => number_value(name, value, unit.as_deref()),
    }
}

/// Normalize units and range-check a single-number vital.
fn number_value(name: VitalName, value: f64, unit: Option<&str>) -> Option<VitalValue> {
    let unit = unit.map(|u| u.to_lowercase());
    let normalized = match name {
        VitalName::Temp => {
            let celsius = match unit.as_deref() {
                Some("c") => true,
                Some(_) => false,
                None => value <= CELSIUS_CUTOFF,
            };
            if celsius {
                round1(value * 9.0 / 5.0 + 32.0)
            } else {
                value
            }
        }
        VitalName::Weight => match unit.as_deref() {
            Some(u) if u.starts_with("lb") || u.starts_with("pound") || u == "#" => {
                round1(value * LB_TO_KG)
            }
            _ => value,
        },
        VitalName::Height => match unit.as_deref() {
            Some("cm") => value,
            Some(_) => round1(value * IN_TO_CM),
            None if value < INCH_CUTOFF => round1(value * IN_TO_CM),
            None => value,
        },
        _ => value,
    };
    VitalValue::number(name, normalized)
}

fn height_value(caps: &regex::Captures<'_>) -> Option<VitalValue> {
    if let (Some(ft), Some(inch)) = (caps.name("ft"), caps.name("inch")) {
        let ft: f64 = ft.as_str().parse().ok()?;
        let inch: f64 = inch.as_str().parse().ok()?;
        return VitalValue::number(VitalName::Height, round1((ft * 12.0 + inch) * IN_TO_CM));
    }
    let num = caps.name("num")?.as_str().parse().ok()?;
    let unit = caps.name("unit").map(|u| match u.as_str() {
        "\"" => "in",
        other => other,
    });
    number_value(VitalName::Height, num, unit)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
