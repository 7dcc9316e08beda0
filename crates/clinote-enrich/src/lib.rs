//! Enrichment collaborator contract.
//!
//! The parser's assessment and plan can be supplemented by an external
//! analysis service. This crate defines the request/response contract,
//! tolerant response parsing, the client seam, and the merge policy that
//! decides when enrichment output may replace parser output. It makes no
//! network calls itself.

pub mod client;
pub mod contract;
pub mod merge;

pub use client::*;
pub use contract::*;
pub use merge::*;
