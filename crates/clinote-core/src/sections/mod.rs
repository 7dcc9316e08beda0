//! Section segmentation.
//!
//! Pipeline: NormalizedText → header detection → synonym lookup → Segmentation

mod segmenter;
mod vocabulary;

pub use segmenter::*;
pub use vocabulary::*;
