//! Client seam for the enrichment service.

use crate::contract::{EnrichError, EnrichResult, EnrichmentRequest, EnrichmentResponse};

/// Anything that can analyze a note: an HTTP client in the host app, or a
/// mock in tests.
pub trait EnrichmentClient {
    fn analyze(&self, request: &EnrichmentRequest) -> EnrichResult<EnrichmentResponse>;
}

/// Canned responses for testing without the real service.
pub enum MockEnricher {
    Respond(EnrichmentResponse),
    Fail(String),
}

impl MockEnricher {
    pub fn responding(assessment: &[&str], plan: &[&str]) -> Self {
        MockEnricher::Respond(EnrichmentResponse {
            assessment: assessment.iter().map(|s| s.to_string()).collect(),
            plan: plan.iter().map(|s| s.to_string()).collect(),
            citations: Vec::new(),
        })
    }

    pub fn failing(message: &str) -> Self {
        MockEnricher::Fail(message.to_string())
    }
}

impl EnrichmentClient for MockEnricher {
    fn analyze(&self, _request: &EnrichmentRequest) -> EnrichResult<EnrichmentResponse> {
        match self {
            MockEnricher::Respond(response) => Ok(response.clone()),
            MockEnricher::Fail(message) => Err(EnrichError::Service(message.clone())),
        }
    }
}
