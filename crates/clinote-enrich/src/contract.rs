//! Request and response types for the enrichment service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Enrichment errors.
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Enrichment service error: {0}")]
    Service(String),
}

pub type EnrichResult<T> = Result<T, EnrichError>;

/// Body posted to the analysis endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub note: String,
}

impl EnrichmentRequest {
    pub fn new(note: impl Into<String>) -> Self {
        Self { note: note.into() }
    }
}

/// Analysis returned by the service. Missing arrays default to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentResponse {
    pub assessment: Vec<String>,
    pub plan: Vec<String>,
    pub citations: Vec<Citation>,
}

impl EnrichmentResponse {
    pub fn is_empty(&self) -> bool {
        self.assessment.is_empty() && self.plan.is_empty()
    }
}

/// Reference backing an enrichment statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Parse a service response body into an [`EnrichmentResponse`].
pub fn parse_enrichment_response(body: &str) -> EnrichResult<EnrichmentResponse> {
    // The service may wrap the JSON in prose
    let start = body
        .find('{')
        .ok_or_else(|| EnrichError::InvalidFormat("No JSON object found in response".into()))?;
    let end = body
        .rfind('}')
        .ok_or_else(|| EnrichError::InvalidFormat("No closing brace found in response".into()))?;
    if end < start {
        return Err(EnrichError::InvalidFormat(
            "Closing brace precedes opening brace".into(),
        ));
    }

    let response: EnrichmentResponse = serde_json::from_str(&body[start..=end])?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_string(&EnrichmentRequest::new("Plan: rest")).unwrap();
        assert_eq!(json, r#"{"note":"Plan: rest"}"#);
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"assessment":["NSTEMI"],"plan":["Heparin drip","Cardiology consult"],"citations":[{"source":"ACC/AHA 2014","url":"https://example.org/nstemi"}]}"#;

        let response = parse_enrichment_response(body).unwrap();
        assert_eq!(response.assessment, vec!["NSTEMI"]);
        assert_eq!(response.plan.len(), 2);
        assert_eq!(response.citations[0].source, "ACC/AHA 2014");
        assert_eq!(response.citations[0].title, None);
    }

    #[test]
    fn test_parse_response_with_prose() {
        let body = "Here is the analysis:\n{\"assessment\":[\"CAP\"]}\nLet me know if you need more.";

        let response = parse_enrichment_response(body).unwrap();
        assert_eq!(response.assessment, vec!["CAP"]);
        assert!(response.plan.is_empty());
        assert!(response.citations.is_empty());
    }

    #[test]
    fn test_parse_response_without_json() {
        assert!(matches!(
            parse_enrichment_response("service unavailable"),
            Err(EnrichError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_enrichment_response("} oops {"),
            Err(EnrichError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_response_bad_json() {
        assert!(matches!(
            parse_enrichment_response(r#"{"assessment": "not a list"}"#),
            Err(EnrichError::JsonParse(_))
        ));
    }
}
