//! Field extractors.
//!
//! Each extractor owns its compiled patterns, built once from a
//! [`ParserConfig`](crate::config::ParserConfig), and is a pure function of
//! its input text afterwards.

mod allergies;
mod demographics;
mod diagnoses;
mod labs;
pub mod lines;
mod medications;
mod vitals;

pub use allergies::AllergyExtractor;
pub use demographics::DemographicsExtractor;
pub use diagnoses::{dedup_diagnoses, DiagnosisExtractor, DiagnosisHit, DiagnosisStrategy};
pub use labs::{dedup_labs, LabExtractor};
pub use medications::MedicationExtractor;
pub use vitals::{select_vitals, VitalsExtractor};
