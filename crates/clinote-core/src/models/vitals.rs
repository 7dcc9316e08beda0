//! Vital sign readings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The vital signs the extractor recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VitalName {
    #[serde(rename = "BP")]
    Bp,
    #[serde(rename = "HR")]
    Hr,
    #[serde(rename = "RR")]
    Rr,
    Temp,
    #[serde(rename = "SpO2")]
    SpO2,
    Weight,
    Height,
}

impl VitalName {
    pub const ALL: [VitalName; 7] = [
        VitalName::Bp,
        VitalName::Hr,
        VitalName::Rr,
        VitalName::Temp,
        VitalName::SpO2,
        VitalName::Weight,
        VitalName::Height,
    ];

    /// Display label, e.g. `"SpO2"`.
    pub fn label(&self) -> &'static str {
        match self {
            VitalName::Bp => "BP",
            VitalName::Hr => "HR",
            VitalName::Rr => "RR",
            VitalName::Temp => "Temp",
            VitalName::SpO2 => "SpO2",
            VitalName::Weight => "Weight",
            VitalName::Height => "Height",
        }
    }

    /// Canonical unit after normalization.
    pub fn canonical_unit(&self) -> &'static str {
        match self {
            VitalName::Bp => "mmHg",
            VitalName::Hr => "bpm",
            VitalName::Rr => "breaths/min",
            VitalName::Temp => "°F",
            VitalName::SpO2 => "%",
            VitalName::Weight => "kg",
            VitalName::Height => "cm",
        }
    }

    /// Inclusive plausible range for single-number vitals.
    ///
    /// Blood pressure is checked component-wise by [`VitalValue::pressure`].
    pub fn plausible_range(&self) -> (f64, f64) {
        match self {
            VitalName::Bp => (20.0, 300.0),
            VitalName::Hr => (20.0, 300.0),
            VitalName::Rr => (4.0, 80.0),
            VitalName::Temp => (86.0, 113.0),
            VitalName::SpO2 => (50.0, 100.0),
            VitalName::Weight => (0.5, 500.0),
            VitalName::Height => (30.0, 250.0),
        }
    }
}

impl fmt::Display for VitalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a reading came from. Ordered from least to most structured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VitalSource {
    Inline,
    #[serde(rename = "minmax")]
    MinMax,
    Table,
}

impl VitalSource {
    /// Strategies in the order they are attempted.
    pub const PRIORITY: [VitalSource; 3] =
        [VitalSource::Table, VitalSource::MinMax, VitalSource::Inline];

    pub fn label(&self) -> &'static str {
        match self {
            VitalSource::Inline => "inline",
            VitalSource::MinMax => "minmax",
            VitalSource::Table => "table",
        }
    }
}

/// A vital sign value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VitalValue {
    Pressure { systolic: u32, diastolic: u32 },
    Number(f64),
}

impl VitalValue {
    /// Build a blood pressure value, rejecting implausible pairs.
    pub fn pressure(systolic: u32, diastolic: u32) -> Option<Self> {
        let plausible = (50..=300).contains(&systolic)
            && (20..=200).contains(&diastolic)
            && systolic > diastolic;
        plausible.then_some(VitalValue::Pressure {
            systolic,
            diastolic,
        })
    }

    /// Build a numeric value, rejecting values outside the vital's range.
    pub fn number(name: VitalName, value: f64) -> Option<Self> {
        let (min, max) = name.plausible_range();
        (value.is_finite() && value >= min && value <= max).then_some(VitalValue::Number(value))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VitalValue::Number(n) => Some(*n),
            VitalValue::Pressure { .. } => None,
        }
    }
}

impl fmt::Display for VitalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VitalValue::Pressure {
                systolic,
                diastolic,
            } => write!(f, "{}/{}", systolic, diastolic),
            VitalValue::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            VitalValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A single vital sign reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalReading {
    pub name: VitalName,
    pub value: VitalValue,
    pub unit: String,
    pub source: VitalSource,
    /// Text the reading was captured from.
    pub raw: String,
}

impl VitalReading {
    pub fn new(name: VitalName, value: VitalValue, source: VitalSource, raw: &str) -> Self {
        Self {
            name,
            value,
            unit: name.canonical_unit().to_string(),
            source,
            raw: raw.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_guard() {
        assert!(VitalValue::pressure(141, 76).is_some());
        assert!(VitalValue::pressure(76, 141).is_none());
        assert!(VitalValue::pressure(400, 90).is_none());
    }

    #[test]
    fn test_number_guard() {
        assert!(VitalValue::number(VitalName::SpO2, 99.0).is_some());
        assert!(VitalValue::number(VitalName::SpO2, 150.0).is_none());
        assert!(VitalValue::number(VitalName::Hr, 5.0).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(VitalValue::Number(82.0).to_string(), "82");
        assert_eq!(VitalValue::Number(98.6).to_string(), "98.6");
        assert_eq!(
            VitalValue::Pressure {
                systolic: 141,
                diastolic: 76
            }
            .to_string(),
            "141/76"
        );
    }

    #[test]
    fn test_source_ordering() {
        assert!(VitalSource::Table > VitalSource::MinMax);
        assert!(VitalSource::MinMax > VitalSource::Inline);
    }
}
