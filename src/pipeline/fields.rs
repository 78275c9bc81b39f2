//! Parsers for the text-encoded fields of the raw listing table
//!
//! Every parser maps malformed or absent input to `None` instead of
//! failing; the caller decides how a missing value is recorded.

use std::sync::OnceLock;

use regex::Regex;

/// Tokens the raw export uses for "no value".
const MISSING_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Whether a raw text cell should be treated as missing.
pub fn is_missing_token(value: &str) -> bool {
    MISSING_TOKENS.contains(&value.trim())
}

/// Normalize a raw cell: trimmed text, or `None` for missing tokens.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !is_missing_token(v))
}

/// Parse a plain finite number.
pub fn parse_number(value: Option<&str>) -> Option<f64> {
    present(value)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a percentage such as `"45%"` into a fraction in `[0, 1]`.
///
/// Values without a trailing `%`, non-numeric bodies, and results outside
/// `[0, 1]` are all treated as missing.
pub fn percent_to_fraction(value: Option<&str>) -> Option<f64> {
    let body = present(value)?.strip_suffix('%')?;
    let fraction = body.trim().parse::<f64>().ok()? / 100.0;
    (fraction.is_finite() && (0.0..=1.0).contains(&fraction)).then_some(fraction)
}

/// Parse a currency amount such as `"$1,250.00"`.
///
/// Currency symbols and thousands separators are stripped before parsing.
pub fn parse_currency(value: Option<&str>) -> Option<f64> {
    let cleaned: String = present(value)?
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '€' | '£' | ' '))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn number_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"(\d+\.?\d*)").expect("numeric token pattern is valid"))
}

/// Extract the first unsigned numeric token from free text (`"2.5 baths"` -> 2.5).
pub fn first_number(text: &str) -> Option<f64> {
    number_token()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Reconstruct a count from a numeric column with a free-text fallback.
///
/// The numeric column wins when it holds a value; otherwise the first
/// number in the text column is used.
pub fn numeric_with_text_fallback(numeric: Option<&str>, text: Option<&str>) -> Option<f64> {
    parse_number(numeric).or_else(|| present(text).and_then(first_number))
}

/// Parse a `t`/`f` flag.
pub fn parse_flag(value: Option<&str>) -> Option<bool> {
    match present(value)? {
        "t" | "true" | "True" | "TRUE" => Some(true),
        "f" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}
