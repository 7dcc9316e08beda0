//! Merge policy for enrichment output.
//!
//! Enrichment only fills gaps: a section is replaced when the parser's own
//! content is thin, and is never replaced when the parser found something
//! substantial.

use clinote_core::parser::MISSING_ASSESSMENT_PLAN_WARNING;
use clinote_core::sections::{ASSESSMENT, PLAN};
use clinote_core::ParseResult;
use serde::{Deserialize, Serialize};

use crate::client::EnrichmentClient;
use crate::contract::{Citation, EnrichmentRequest, EnrichmentResponse};

/// Sections with fewer non-whitespace characters than this are thin.
pub const THIN_SECTION_CHARS: usize = 40;

/// Where a section's final content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionSource {
    Parser,
    Enrichment,
}

/// Parser result with enrichment merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedNote {
    pub result: ParseResult,
    pub assessment_source: SectionSource,
    pub plan_source: SectionSource,
    pub citations: Vec<Citation>,
}

impl EnrichedNote {
    fn unchanged(result: ParseResult) -> Self {
        Self {
            result,
            assessment_source: SectionSource::Parser,
            plan_source: SectionSource::Parser,
            citations: Vec::new(),
        }
    }

    pub fn was_enriched(&self) -> bool {
        self.assessment_source == SectionSource::Enrichment
            || self.plan_source == SectionSource::Enrichment
    }
}

/// True when a section is missing or has little content.
pub fn is_thin(content: Option<&str>) -> bool {
    let chars = content
        .map(|c| c.chars().filter(|ch| !ch.is_whitespace()).count())
        .unwrap_or(0);
    chars < THIN_SECTION_CHARS
}

/// Consult the enrichment service when assessment or plan is thin.
///
/// A missing client or a failing call leaves the parser result as it was,
/// plus a warning.
pub fn enrich(
    result: ParseResult,
    raw: &str,
    client: Option<&dyn EnrichmentClient>,
) -> EnrichedNote {
    let thin_assessment = is_thin(result.section(ASSESSMENT));
    let thin_plan = is_thin(result.section(PLAN));
    if !thin_assessment && !thin_plan {
        return EnrichedNote::unchanged(result);
    }

    let client = match client {
        Some(client) => client,
        None => return unavailable(result, "no enrichment client configured"),
    };

    match client.analyze(&EnrichmentRequest::new(raw)) {
        Ok(response) => merge(result, response, thin_assessment, thin_plan),
        Err(e) => {
            tracing::warn!(error = %e, "enrichment call failed");
            unavailable(result, &e.to_string())
        }
    }
}

fn unavailable(mut result: ParseResult, reason: &str) -> EnrichedNote {
    result
        .warnings
        .push(format!("enrichment unavailable: {}", reason));
    EnrichedNote::unchanged(result)
}

fn merge(
    mut result: ParseResult,
    response: EnrichmentResponse,
    thin_assessment: bool,
    thin_plan: bool,
) -> EnrichedNote {
    let assessment_source =
        replace_section(&mut result, ASSESSMENT, &response.assessment, thin_assessment);
    let plan_source = replace_section(&mut result, PLAN, &response.plan, thin_plan);

    if assessment_source == SectionSource::Enrichment || plan_source == SectionSource::Enrichment {
        result.warnings.retain(|w| w != MISSING_ASSESSMENT_PLAN_WARNING);
    }

    tracing::info!(
        assessment = ?assessment_source,
        plan = ?plan_source,
        citations = response.citations.len(),
        "merged enrichment"
    );

    EnrichedNote {
        result,
        assessment_source,
        plan_source,
        citations: response.citations,
    }
}

fn replace_section(
    result: &mut ParseResult,
    section: &str,
    lines: &[String],
    thin: bool,
) -> SectionSource {
    let content = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if !thin || content.is_empty() {
        return SectionSource::Parser;
    }

    result.sections.insert(section.to_string(), content);
    SectionSource::Enrichment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockEnricher;
    use clinote_core::Parser;

    const THIN_NOTE: &str = "HPI: 62 yo M with fever and productive cough x 3 days\nVitals: Temp 101.2F, HR 104";

    const RICH_NOTE: &str = "\
HPI: 62 yo M with fever and productive cough
Assessment: Community-acquired pneumonia, right lower lobe, CURB-65 score of 1
Plan: Ceftriaxone and azithromycin, chest x-ray in six weeks, return precautions";

    fn parse(note: &str) -> ParseResult {
        Parser::new().parse(note).unwrap()
    }

    #[test]
    fn test_is_thin() {
        assert!(is_thin(None));
        assert!(is_thin(Some("f/u 2 weeks")));
        assert!(!is_thin(Some(&"x".repeat(THIN_SECTION_CHARS))));
    }

    #[test]
    fn test_thin_sections_replaced() {
        let result = parse(THIN_NOTE);
        assert!(result.has_critical_warning());

        let mock = MockEnricher::responding(
            &["Community-acquired pneumonia"],
            &["Start ceftriaxone", "Blood cultures"],
        );
        let enriched = enrich(result, THIN_NOTE, Some(&mock));

        assert_eq!(enriched.assessment_source, SectionSource::Enrichment);
        assert_eq!(enriched.plan_source, SectionSource::Enrichment);
        assert_eq!(enriched.result.section(ASSESSMENT), Some("Community-acquired pneumonia"));
        assert_eq!(enriched.result.section(PLAN), Some("Start ceftriaxone\nBlood cultures"));
        assert!(!enriched.result.has_critical_warning());
        assert!(enriched.was_enriched());
    }

    #[test]
    fn test_rich_sections_never_overwritten() {
        let result = parse(RICH_NOTE);
        let before = result.clone();

        let mock = MockEnricher::responding(&["Something else"], &["Other plan"]);
        let enriched = enrich(result, RICH_NOTE, Some(&mock));

        assert_eq!(enriched.result, before);
        assert_eq!(enriched.assessment_source, SectionSource::Parser);
        assert_eq!(enriched.plan_source, SectionSource::Parser);
    }

    #[test]
    fn test_only_thin_section_replaced() {
        let note = "HPI: cough\nAssessment: Community-acquired pneumonia, right lower lobe, moderate severity\nPlan: abx";
        let result = parse(note);

        let mock =
            MockEnricher::responding(&["Different assessment"], &["Ceftriaxone 1 g IV daily"]);
        let enriched = enrich(result, note, Some(&mock));

        assert_eq!(enriched.assessment_source, SectionSource::Parser);
        assert_eq!(enriched.plan_source, SectionSource::Enrichment);
        assert!(enriched
            .result
            .section(ASSESSMENT)
            .unwrap()
            .starts_with("Community-acquired pneumonia"));
        assert_eq!(enriched.result.section(PLAN), Some("Ceftriaxone 1 g IV daily"));
    }

    #[test]
    fn test_failing_client_keeps_parser_result() {
        let result = parse(THIN_NOTE);
        let sections = result.sections.clone();

        let mock = MockEnricher::failing("timeout");
        let enriched = enrich(result, THIN_NOTE, Some(&mock));

        assert_eq!(enriched.result.sections, sections);
        assert!(!enriched.was_enriched());
        assert!(enriched
            .result
            .warnings
            .iter()
            .any(|w| w.starts_with("enrichment unavailable:") && w.contains("timeout")));
        assert!(enriched.result.has_critical_warning());
    }

    #[test]
    fn test_missing_client_warns() {
        let enriched = enrich(parse(THIN_NOTE), THIN_NOTE, None);
        assert!(enriched
            .result
            .warnings
            .iter()
            .any(|w| w == "enrichment unavailable: no enrichment client configured"));
    }

    #[test]
    fn test_empty_response_keeps_parser_sections() {
        let mock = MockEnricher::Respond(EnrichmentResponse::default());
        let enriched = enrich(parse(THIN_NOTE), THIN_NOTE, Some(&mock));
        assert!(!enriched.was_enriched());
        assert!(enriched.result.section(ASSESSMENT).is_none());
    }

    #[test]
    fn test_citations_carried() {
        let mock = MockEnricher::Respond(EnrichmentResponse {
            assessment: vec!["Pneumonia".to_string()],
            plan: Vec::new(),
            citations: vec![Citation {
                source: "IDSA/ATS 2019".to_string(),
                title: Some("CAP guideline".to_string()),
                url: None,
            }],
        });
        let enriched = enrich(parse(THIN_NOTE), THIN_NOTE, Some(&mock));

        assert_eq!(enriched.assessment_source, SectionSource::Enrichment);
        assert_eq!(enriched.plan_source, SectionSource::Parser);
        assert_eq!(enriched.citations.len(), 1);
        assert_eq!(enriched.citations[0].source, "IDSA/ATS 2019");
    }
}
