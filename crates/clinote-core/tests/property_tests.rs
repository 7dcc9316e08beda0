//! Property tests for normalization and parsing.

use std::sync::OnceLock;

use clinote_core::{normalize, Parser};
use proptest::prelude::*;

fn parser() -> &'static Parser {
    static PARSER: OnceLock<Parser> = OnceLock::new();
    PARSER.get_or_init(Parser::new)
}

proptest! {
    #[test]
    fn normalize_is_idempotent(input in any::<String>()) {
        let once = normalize(&input);
        let twice = normalize(once.as_str());
        prop_assert_eq!(once.as_str(), twice.as_str());
    }

    #[test]
    fn normalize_handles_clinical_whitespace(input in "[A-Za-z0-9:/%. \t\r\n]{0,200}") {
        let normalized = normalize(&input);
        prop_assert!(!normalized.as_str().contains('\r'));
        prop_assert!(!normalized.as_str().contains("\n\n\n"));
    }

    #[test]
    fn parse_never_fails_on_non_blank_input(input in "[A-Za-z0-9:/%.,()\\- \n]{1,300}") {
        prop_assume!(!input.trim().is_empty());
        let result = parser().parse(&input);
        prop_assert!(result.is_ok());
        let result = result.unwrap();
        prop_assert!((0.0..=1.0).contains(&result.confidence));
        prop_assert!(result.sections.contains_key("__full"));
    }

    #[test]
    fn unknown_names_never_become_labs(name in "[Qq][xz]{3,8}", value in 0u32..1000) {
        let line = format!("{}: {}", name, value);
        let result = parser().parse(&line).unwrap();
        prop_assert!(result.labs.is_empty());
    }
}
