//! Helpers for reading text and numbers out of statement table cells.

use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)%").expect("valid percent regex"));
static SIGNED_DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[\d.]+").expect("valid decimal regex"));
static SIGNED_INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+").expect("valid integer regex"));
static COUNT_BEFORE_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\(").expect("valid count regex"));

/// Concatenated, trimmed text content of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Remove every whitespace character, including the non-breaking spaces used
/// as thousands separators ("2 904.80").
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Parse a whole cell as a float after removing whitespace.
pub fn parse_compact_f64(text: &str) -> Option<f64> {
    strip_whitespace(text).parse::<f64>().ok().and_then(finite)
}

/// First `<number>%` in the text. "4.89% (2 904.80)" yields 4.89.
pub fn percent_value(text: &str) -> Option<f64> {
    PERCENT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .and_then(finite)
        .filter(|v| (0.0..=100.0).contains(v))
}

/// First signed decimal token once whitespace is removed.
/// "2 904.80 (4.89%)" yields 2904.80.
pub fn decimal_value(text: &str) -> Option<f64> {
    let compact = strip_whitespace(text);
    SIGNED_DECIMAL_RE
        .find(&compact)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .and_then(finite)
}

/// First signed integer token once whitespace is removed.
pub fn integer_value(text: &str) -> Option<i64> {
    let compact = strip_whitespace(text);
    SIGNED_INTEGER_RE
        .find(&compact)
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// Integer immediately preceding an opening parenthesis once whitespace is
/// removed: "57 (61.29%)" yields 57, "1 057 (96.71%)" yields 1057.
pub fn count_before_paren(text: &str) -> Option<i64> {
    let compact = strip_whitespace(text);
    COUNT_BEFORE_PAREN_RE
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_takes_first_percentage_not_parenthesised_amount() {
        assert_eq!(percent_value("4.89% (2 904.80)"), Some(4.89));
        assert_eq!(percent_value("4.89% (2 904.80)"), Some(4.89));
        assert_eq!(percent_value("4.17%"), Some(4.17));
        assert_eq!(percent_value("2 904.80"), None);
        assert_eq!(percent_value(""), None);
    }

    #[test]
    fn percent_rejects_out_of_range_and_garbage() {
        assert_eq!(percent_value("250.00%"), None);
        assert_eq!(percent_value("1.2.3%"), None);
        assert_eq!(percent_value(".%"), None);
    }

    #[test]
    fn decimal_strips_thousands_separators() {
        assert_eq!(decimal_value("2 904.80 (4.89%)"), Some(2904.80));
        assert_eq!(decimal_value("-1 234.56"), Some(-1234.56));
        assert_eq!(decimal_value("12\u{a0}345.00"), Some(12345.0));
        assert_eq!(decimal_value("n/a"), None);
    }

    #[test]
    fn integer_and_count_extraction() {
        assert_eq!(integer_value("1 093"), Some(1093));
        assert_eq!(integer_value("none"), None);
        assert_eq!(count_before_paren("57 (61.29%)"), Some(57));
        assert_eq!(count_before_paren("57"), None);
        assert_eq!(count_before_paren("1 057 (96.71%)"), Some(1057));
        assert_eq!(count_before_paren("1\u{a0}057\u{a0}(96.71%)"), Some(1057));
    }

    #[test]
    fn compact_float_requires_whole_cell() {
        assert_eq!(parse_compact_f64(" 1 500.25 "), Some(1500.25));
        assert_eq!(parse_compact_f64("-0.70"), Some(-0.7));
        assert_eq!(parse_compact_f64("abc"), None);
        assert_eq!(parse_compact_f64(""), None);
        assert_eq!(parse_compact_f64("NaN"), None);
    }
}
