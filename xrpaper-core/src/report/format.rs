//! Number and date formatting for reports (pt-BR conventions).

use chrono::{DateTime, Utc};

pub const MISSING: &str = "—";

/// Group the integer part with `.` and join the fraction with `,`.
fn pt_br(abs_fixed: &str, negative: bool) -> String {
    let (int_part, frac_part) = abs_fixed.split_once('.').unwrap_or((abs_fixed, ""));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac_part.is_empty() {
        out.push(',');
        out.push_str(frac_part);
    }
    out
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Up to two decimals, trailing zeros dropped: `1234.5` → `1.234,5`.
pub fn format_num(value: Option<f64>) -> String {
    let Some(v) = finite(value) else {
        return MISSING.to_string();
    };
    let fixed = format!("{:.2}", v.abs());
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    let negative = v < 0.0 && trimmed.chars().any(|c| c != '0' && c != '.');
    pt_br(trimmed, negative)
}

/// Exactly two decimals: `1234.5` → `1.234,50`.
pub fn format_price(value: Option<f64>) -> String {
    let Some(v) = finite(value) else {
        return MISSING.to_string();
    };
    let fixed = format!("{:.2}", v.abs());
    let negative = v < 0.0 && fixed != "0.00";
    pt_br(&fixed, negative)
}

/// Two decimals with a comma and a percent sign, no grouping: `0.8` → `0,80%`.
pub fn format_pct(value: Option<f64>) -> String {
    match finite(value) {
        Some(v) => format!("{}%", format!("{v:.2}").replace('.', ",")),
        None => MISSING.to_string(),
    }
}

/// `dd/mm/yyyy, HH:MM:SS` in UTC.
pub fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    match value {
        Some(at) => at.format("%d/%m/%Y, %H:%M:%S").to_string(),
        None => MISSING.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn num_groups_and_trims() {
        assert_eq!(format_num(Some(112043.0)), "112.043");
        assert_eq!(format_num(Some(1234.567)), "1.234,57");
        assert_eq!(format_num(Some(0.5)), "0,5");
        assert_eq!(format_num(Some(-1234.5)), "-1.234,5");
        assert_eq!(format_num(Some(999.0)), "999");
        assert_eq!(format_num(Some(1_000_000.0)), "1.000.000");
    }

    #[test]
    fn num_missing() {
        assert_eq!(format_num(None), MISSING);
        assert_eq!(format_num(Some(f64::NAN)), MISSING);
        assert_eq!(format_num(Some(f64::INFINITY)), MISSING);
    }

    #[test]
    fn tiny_negative_has_no_sign() {
        assert_eq!(format_num(Some(-0.001)), "0");
        assert_eq!(format_price(Some(-0.001)), "0,00");
    }

    #[test]
    fn price_keeps_two_decimals() {
        assert_eq!(format_price(Some(112000.0)), "112.000,00");
        assert_eq!(format_price(Some(0.5)), "0,50");
    }

    #[test]
    fn pct() {
        assert_eq!(format_pct(Some(1.5)), "1,50%");
        assert_eq!(format_pct(Some(12345.678)), "12345,68%");
        assert_eq!(format_pct(None), MISSING);
    }

    #[test]
    fn timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 9, 1, 8, 5, 0).unwrap();
        assert_eq!(format_timestamp(Some(at)), "01/09/2025, 08:05:00");
        assert_eq!(format_timestamp(None), MISSING);
    }
}
