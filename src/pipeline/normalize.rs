//! Normalization of Brazilian-formatted scalar values.
//!
//! OCR text and LLM answers carry amounts like `R$ 1.234,56` and dates
//! like `15/03/2024`; the XML path carries ISO timestamps. Everything
//! funnels through here so the rest of the pipeline only sees canonical
//! values.

use chrono::NaiveDate;

/// Parse a Brazilian-formatted monetary amount.
///
/// Handles the `R$` prefix, thousands dots and decimal comma
/// (`1.234,56`). A value with a single dot and at most two trailing
/// digits is treated as an already-decimal amount (`1234.56`); more than
/// two trailing digits means the dot was a thousands separator
/// (`1.234` → 1234). Anything unparseable or negative collapses to 0.0.
pub fn parse_currency(raw: &str) -> f64 {
    let cleaned = raw.replace("R$", "").replace(' ', "").replace('\u{a0}', "");
    if cleaned.is_empty() {
        return 0.0;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if cleaned.matches('.').count() == 1 {
        let (_, frac) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), ""));
        if frac.len() <= 2 {
            cleaned
        } else {
            cleaned.replace('.', "")
        }
    } else {
        cleaned.replace('.', "")
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y/%m/%d", "%Y-%m-%d", "%d-%m-%Y"];

/// Normalize a date string to ISO `YYYY-MM-DD`.
///
/// Tries the formats seen in fiscal documents, day-first before
/// year-first. An unrecognized value passes through untouched — a raw
/// date in the output beats a silently blanked field.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    trimmed.to_string()
}

/// Extract the date part from an NF-e issue timestamp
/// (`2024-03-15T10:30:00-03:00` → `2024-03-15`).
pub fn datetime_to_date(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once('T') {
        Some((date, _)) => date.to_string(),
        None => normalize_date(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_brazilian_format() {
        assert_eq!(parse_currency("R$ 1.234,56"), 1234.56);
        assert_eq!(parse_currency("1.234,56"), 1234.56);
        assert_eq!(parse_currency("0,99"), 0.99);
        assert_eq!(parse_currency("750,00"), 750.0);
        assert_eq!(parse_currency("1.234.567,89"), 1234567.89);
    }

    #[test]
    fn single_dot_disambiguation() {
        // Two or fewer trailing digits: decimal separator.
        assert_eq!(parse_currency("1234.56"), 1234.56);
        assert_eq!(parse_currency("99.9"), 99.9);
        // Three trailing digits: thousands separator.
        assert_eq!(parse_currency("1.234"), 1234.0);
        assert_eq!(parse_currency("3.000"), 3000.0);
    }

    #[test]
    fn multiple_dots_without_comma_are_thousands() {
        assert_eq!(parse_currency("1.234.567"), 1234567.0);
    }

    #[test]
    fn plain_integer_passes_through() {
        assert_eq!(parse_currency("150"), 150.0);
        assert_eq!(parse_currency("R$150"), 150.0);
    }

    #[test]
    fn garbage_and_negatives_collapse_to_zero() {
        assert_eq!(parse_currency(""), 0.0);
        assert_eq!(parse_currency("abc"), 0.0);
        assert_eq!(parse_currency("R$"), 0.0);
        assert_eq!(parse_currency("-10,00"), 0.0);
    }

    #[test]
    fn normalizes_day_first_dates() {
        assert_eq!(normalize_date("15/03/2024"), "2024-03-15");
        assert_eq!(normalize_date("01-02-2023"), "2023-02-01");
    }

    #[test]
    fn normalizes_year_first_dates() {
        assert_eq!(normalize_date("2024/03/15"), "2024-03-15");
        assert_eq!(normalize_date("2024-03-15"), "2024-03-15");
    }

    #[test]
    fn unparseable_date_passes_through_verbatim() {
        assert_eq!(normalize_date("15 de março de 2024"), "15 de março de 2024");
        assert_eq!(normalize_date("32/13/2024"), "32/13/2024");
    }

    #[test]
    fn datetime_keeps_only_the_date_part() {
        assert_eq!(datetime_to_date("2024-03-15T10:30:00-03:00"), "2024-03-15");
        assert_eq!(datetime_to_date("2024-03-15"), "2024-03-15");
        assert_eq!(datetime_to_date("15/03/2024"), "2024-03-15");
    }
}
