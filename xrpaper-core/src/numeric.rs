//! NumericNormalizer: parses user-entered numbers typed with either decimal convention.
//!
//! Values are usually pasted from a broker or charting screen, so both
//! `1.234,56` (pt-BR) and `1,234.56` (en-US) must resolve to the same number.

/// Parse a raw numeric string into a finite `f64`.
///
/// Rules:
/// - all whitespace and `%` signs are removed;
/// - if both `.` and `,` occur, whichever occurs **last** is the decimal point and
///   the other is a thousands separator (stripped);
/// - if only `,` occurs, it is the decimal point;
/// - if only `.` occurs, the string is left as is.
///
/// Returns `None` for empty input, unparseable input, or non-finite results.
/// Never panics.
pub fn normalize_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let canonical = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    // Rust's float parser also accepts "inf"/"nan" spellings; keep input numeric.
    if !canonical
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }

    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalize an optional raw field; `None` and blank strings are missing data.
pub fn normalize_opt(raw: Option<&str>) -> Option<f64> {
    raw.and_then(normalize_number)
}

/// Number from a loosely-typed JSON field: a JSON number or a numeric string.
pub fn normalize_json(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        serde_json::Value::String(s) => normalize_number(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_and_strings() {
        assert_eq!(normalize_json(&json!(12.5)), Some(12.5));
        assert_eq!(normalize_json(&json!("12,5")), Some(12.5));
        assert_eq!(normalize_json(&json!(null)), None);
        assert_eq!(normalize_json(&json!(true)), None);
    }

    #[test]
    fn brazilian_grouping() {
        assert_eq!(normalize_number("1.234,56"), Some(1234.56));
    }

    #[test]
    fn us_grouping() {
        assert_eq!(normalize_number("1,234.56"), Some(1234.56));
    }

    #[test]
    fn comma_only_is_decimal() {
        assert_eq!(normalize_number("47,94"), Some(47.94));
    }

    #[test]
    fn dot_only_left_as_is() {
        assert_eq!(normalize_number("89.74"), Some(89.74));
        assert_eq!(normalize_number("112863"), Some(112863.0));
    }

    #[test]
    fn strips_whitespace_and_percent() {
        assert_eq!(normalize_number("  0,85 % "), Some(0.85));
        assert_eq!(normalize_number("1 234,5"), Some(1234.5));
    }

    #[test]
    fn negative_sign_preserved() {
        assert_eq!(normalize_number("-1.234,5"), Some(-1234.5));
        assert_eq!(normalize_number("-0,5"), Some(-0.5));
    }

    #[test]
    fn multiple_thousands_separators() {
        assert_eq!(normalize_number("1.234.567,89"), Some(1234567.89));
        assert_eq!(normalize_number("1,234,567.89"), Some(1234567.89));
    }

    #[test]
    fn ambiguous_repeated_single_separator_is_rejected() {
        // Only dots: left as is, which is not a valid number.
        assert_eq!(normalize_number("1.234.567"), None);
        // Only commas: all become decimal points.
        assert_eq!(normalize_number("1,234,567"), None);
    }

    #[test]
    fn empty_and_separator_only() {
        assert_eq!(normalize_number(""), None);
        assert_eq!(normalize_number("   "), None);
        assert_eq!(normalize_number("%"), None);
        assert_eq!(normalize_number(".,"), None);
        assert_eq!(normalize_number(","), None);
    }

    #[test]
    fn non_numeric_and_non_finite() {
        assert_eq!(normalize_number("abc"), None);
        assert_eq!(normalize_number("inf"), None);
        assert_eq!(normalize_number("NaN"), None);
        assert_eq!(normalize_number("1e999"), None);
    }

    #[test]
    fn optional_wrapper() {
        assert_eq!(normalize_opt(None), None);
        assert_eq!(normalize_opt(Some("2,5")), Some(2.5));
    }
}
