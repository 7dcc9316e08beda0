//! Domain models for clinical note extraction.

mod allergy;
mod labs;
mod note;
mod vitals;

pub use allergy::*;
pub use labs::*;
pub use note::*;
pub use vitals::*;
