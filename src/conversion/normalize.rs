//! Numeric text normalization for values copied out of the study report
//!
//! Study tools print numbers with thousands separators, unit suffixes and
//! stray non-breaking spaces. Everything here reduces such text to the first
//! plain number it contains, or to an empty string when there is none.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STANDALONE_INF: Regex = Regex::new(r"\bINF\b").unwrap();
    static ref FIRST_NUMBER: Regex = Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").unwrap();
}

/// Reduce report text to a clean numeric string, or "" when it has no number.
///
/// Infinite fault quantities ("INFINITE", "INFINITY", a standalone "INF" or
/// "∞") are reported as "0" instead of being propagated as a sentinel.
pub fn normalize(text: &str) -> String {
    let cleaned = text.replace('\u{00A0}', " ").replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return String::new();
    }

    if is_infinite(cleaned) {
        return "0".to_string();
    }

    FIRST_NUMBER
        .find(cleaned)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn is_infinite(text: &str) -> bool {
    let upper = text.to_uppercase();
    upper.contains("INFINITE")
        || upper.contains("INFINITY")
        || STANDALONE_INF.is_match(&upper)
        || text.contains('∞')
}

/// Parse a value for a numeric cell write; only finite numbers qualify
pub fn parse_cell_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1,234.5", "1234.5")]
    #[case("abc", "")]
    #[case("", "")]
    #[case("   ", "")]
    #[case("\u{00A0}42\u{00A0}", "42")]
    #[case("12.5 A", "12.5")]
    #[case("-3.25@-84.1", "-3.25")]
    #[case("1.5E+03 ohms", "1.5E+03")]
    #[case(".75", ".75")]
    #[case("+7", "+7")]
    #[case("Z = 0.0421 pu", "0.0421")]
    fn test_normalize_extracts_first_number(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[rstest]
    #[case("infinite")]
    #[case("INFINITY")]
    #[case("inf")]
    #[case("Mag = INF A")]
    #[case("∞")]
    #[case("12 Infinite")]
    fn test_infinite_readings_become_zero(#[case] input: &str) {
        assert_eq!(normalize(input), "0");
    }

    #[test]
    fn test_inf_inside_a_word_is_not_infinite() {
        assert_eq!(normalize("INFEED 12"), "12");
        assert_eq!(normalize("info"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "1,234.5", "abc", "", "INF", "∞", "-0.5e-3 kA", "12.5 A", "3-4", "..5", "1e",
            "\u{00A0}", "5586-YANDELL-22",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_parse_cell_number() {
        assert_eq!(parse_cell_number("1234.5"), Some(1234.5));
        assert_eq!(parse_cell_number(" 7 "), Some(7.0));
        assert_eq!(parse_cell_number("1.5E+03"), Some(1500.0));
        assert_eq!(parse_cell_number("YANDELL-22"), None);
        assert_eq!(parse_cell_number("NaN"), None);
        assert_eq!(parse_cell_number("inf"), None);
        assert_eq!(parse_cell_number(""), None);
    }
}
