//! Line-level helpers shared by the extractors.

use crate::sections::SectionVocabulary;

/// Strip a leading bullet (`-`, `*`, `•`) or list number (`1.`, `2)`).
pub fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed
        .strip_prefix(['-', '*', '•', '·', '+'])
        .filter(|rest| rest.starts_with(' '))
    {
        return rest.trim_start();
    }

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if (1..=2).contains(&digits) {
        let rest = &trimmed[digits..];
        if let Some(after) = rest.strip_prefix(['.', ')']) {
            if after.starts_with(' ') {
                return after.trim_start();
            }
        }
    }
    trimmed
}

/// Whether a line carries a bullet or list number.
pub fn is_list_item(line: &str) -> bool {
    strip_bullet(line).len() != line.trim_start().len()
}

/// Whether a line ends a list block that started under a header.
pub fn is_block_boundary(line: &str, vocabulary: &SectionVocabulary) -> bool {
    let line = line.trim();
    line.is_empty() || line.ends_with(':') || vocabulary.is_section_start(line)
}

/// Parse a number token, accepting thousands separators (`3,030`).
pub fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() || !token.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if token.contains(',') {
        let (int_part, frac) = match token.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (token, None),
        };
        let mut groups = int_part.split(',');
        let head = groups.next()?;
        if head.is_empty() || head.len() > 3 {
            return None;
        }
        let mut digits = head.to_string();
        for group in groups {
            if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            digits.push_str(group);
        }
        if let Some(frac) = frac {
            digits.push('.');
            digits.push_str(frac);
        }
        return digits.parse().ok();
    }
    token.parse().ok().filter(|n: &f64| n.is_finite())
}

/// Title-case each word, leaving acronyms (`ACE`) and mixed-case words (`NSAIDs`) alone.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            let first = match chars.next() {
                Some(c) => c,
                None => return String::new(),
            };
            let rest: String = chars.collect();
            let all_caps = word.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase);
            let acronym = all_caps && word.chars().count() <= 4;
            let mixed = !all_caps && rest.chars().any(char::is_uppercase);
            if acronym || mixed {
                return word.to_string();
            }
            first.to_uppercase().chain(rest.to_lowercase().chars()).collect()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sentence case: capitalize the first letter; fully upper-case phrases are lowered first.
pub fn sentence_case(text: &str) -> String {
    let text = text.trim().trim_end_matches(['.', ';', ',']).trim();
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    let shouted = text.split_whitespace().count() > 1
        && letters.len() > 4
        && letters.iter().all(|c| c.is_uppercase());
    let base = if shouted {
        text.to_lowercase()
    } else {
        text.to_string()
    };

    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split a list on commas and semicolons outside parentheses.
pub fn split_list(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' | ';' if depth == 0 => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bullet() {
        assert_eq!(strip_bullet("- Penicillin"), "Penicillin");
        assert_eq!(strip_bullet("• Sulfa"), "Sulfa");
        assert_eq!(strip_bullet("1. Chest pain"), "Chest pain");
        assert_eq!(strip_bullet("12) CKD"), "CKD");
        assert_eq!(strip_bullet("-5 degrees"), "-5 degrees");
        assert_eq!(strip_bullet("140/85"), "140/85");
        assert_eq!(strip_bullet("3.5 mg"), "3.5 mg");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("3,030"), Some(3030.0));
        assert_eq!(parse_number("12,345.6"), Some(12345.6));
        assert_eq!(parse_number("6.99"), Some(6.99));
        assert_eq!(parse_number("1,2"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("-4"), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("penicillin"), "Penicillin");
        assert_eq!(title_case("sulfa drugs"), "Sulfa Drugs");
        assert_eq!(title_case("ACE inhibitors"), "ACE Inhibitors");
        assert_eq!(title_case("NSAIDs"), "NSAIDs");
        assert_eq!(title_case("CODEINE"), "Codeine");
        assert_eq!(title_case("PCN"), "PCN");
    }

    #[test]
    fn test_sentence_case() {
        assert_eq!(sentence_case("chest pain, likely angina."), "Chest pain, likely angina");
        assert_eq!(sentence_case("CHEST PAIN"), "Chest pain");
        assert_eq!(sentence_case("HFrEF exacerbation"), "HFrEF exacerbation");
        assert_eq!(sentence_case("CKD"), "CKD");
        assert_eq!(sentence_case("NSTEMI"), "NSTEMI");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("Penicillin (rash, hives), Sulfa; Codeine"),
            vec!["Penicillin (rash, hives)", "Sulfa", "Codeine"]
        );
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_block_boundary() {
        let vocab = SectionVocabulary::default();
        assert!(is_block_boundary("", &vocab));
        assert!(is_block_boundary("Social History:", &vocab));
        assert!(is_block_boundary("Medications: none", &vocab));
        assert!(!is_block_boundary("- Penicillin (rash)", &vocab));
    }
}
