//! Output field formatting.
//!
//! Applies data-type formatting (dates, fixed decimals) and then fits the
//! value to the field length by padding or truncation.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Write;

use crate::models::parse_number;
use crate::transform::dsl::{FieldMapping, PadDirection};

/// Layouts tried, in order, when reading a date value.
const DATE_INPUTS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y", "%d-%b-%Y", "%Y/%m/%d"];
const DATETIME_INPUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Format a raw engine value for output.
pub fn format_field(value: &str, mapping: &FieldMapping) -> String {
    let typed = match (mapping.data_type.as_deref(), mapping.format.as_deref()) {
        (Some(t), Some(f)) if is_date_type(t) => format_date(value, f),
        (Some(t), Some(f)) if is_numeric_type(t) => format_decimal(value, f),
        _ => value.to_string(),
    };

    if mapping.length == 0 {
        return typed;
    }

    let numeric = mapping.data_type.as_deref().is_some_and(is_numeric_type);
    let pad = mapping.pad.unwrap_or(if numeric { PadDirection::Left } else { PadDirection::Right });
    let pad_char = mapping.pad_char.unwrap_or(if numeric && pad == PadDirection::Left { '0' } else { ' ' });

    fit(&typed, mapping.length, pad, pad_char)
}

/// Pad or truncate `value` to exactly `length` characters.
///
/// Zero left-padding keeps a leading minus sign in front.
pub fn fit(value: &str, length: usize, pad: PadDirection, pad_char: char) -> String {
    let count = value.chars().count();
    if count >= length {
        return value.chars().take(length).collect();
    }

    let fill: String = std::iter::repeat(pad_char).take(length - count).collect();
    match pad {
        PadDirection::Right => format!("{}{}", value, fill),
        PadDirection::Left => match value.strip_prefix('-') {
            Some(rest) if pad_char == '0' => format!("-{}{}", fill, rest),
            _ => format!("{}{}", fill, value),
        },
    }
}

fn is_date_type(data_type: &str) -> bool {
    matches!(data_type.trim().to_lowercase().as_str(), "date" | "datetime" | "timestamp")
}

fn is_numeric_type(data_type: &str) -> bool {
    matches!(
        data_type.trim().to_lowercase().as_str(),
        "number" | "numeric" | "decimal" | "integer" | "int" | "float"
    )
}

// =============================================================================
// Dates
// =============================================================================

/// Re-render a date in `format`. Unparsable input passes through.
fn format_date(value: &str, format: &str) -> String {
    let trimmed = value.trim();
    let Some(parsed) = parse_datetime(trimmed) else {
        return value.to_string();
    };

    let pattern = strftime_pattern(format);
    let mut out = String::new();
    match write!(out, "{}", parsed.format(&pattern)) {
        Ok(()) => out,
        Err(_) => value.to_string(),
    }
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUTS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            DATE_INPUTS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Translate a `yyyyMMdd`-style pattern to strftime. Patterns that already
/// contain `%` are used as-is.
pub fn strftime_pattern(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }

    let chars: Vec<char> = format.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let token = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1 | 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', _) => Some("%d"),
            ('H', _) => Some("%H"),
            ('m', _) => Some("%M"),
            ('s', _) => Some("%S"),
            _ => None,
        };
        match token {
            Some(t) => out.push_str(t),
            None => out.extend(std::iter::repeat(c).take(run)),
        }
        i += run;
    }
    out
}

// =============================================================================
// Numbers
// =============================================================================

/// Round to the number of decimals in `format` (`"0.00"` → 2).
fn format_decimal(value: &str, format: &str) -> String {
    let Some(number) = parse_number(value) else {
        return value.to_string();
    };
    let decimals = format.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0);
    format!("{:.*}", decimals, number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_pads_right_by_default() {
        let mapping = FieldMapping::constant("x", "").at(1, 5);
        assert_eq!(format_field("ab", &mapping), "ab   ");
    }

    #[test]
    fn test_truncation() {
        let mapping = FieldMapping::constant("x", "").at(1, 3);
        assert_eq!(format_field("abcdef", &mapping), "abc");
    }

    #[test]
    fn test_zero_length_passes_through() {
        let mapping = FieldMapping::constant("x", "");
        assert_eq!(format_field("  untouched ", &mapping), "  untouched ");
    }

    #[test]
    fn test_numeric_pads_left_with_zeros() {
        let mapping = FieldMapping::constant("x", "").typed("decimal", Some("0.00")).at(1, 8);
        assert_eq!(format_field("12.5", &mapping), "00012.50");
        assert_eq!(format_field("-3", &mapping), "-0003.00");
    }

    #[test]
    fn test_explicit_pad_overrides_defaults() {
        let mapping = FieldMapping::constant("x", "").at(1, 6).padded(PadDirection::Left, '*');
        assert_eq!(format_field("ab", &mapping), "****ab");
    }

    #[test]
    fn test_non_numeric_passes_decimal_format() {
        let mapping = FieldMapping::constant("x", "").typed("number", Some("0.0"));
        assert_eq!(format_field("n/a", &mapping), "n/a");
    }

    #[test]
    fn test_date_reformat() {
        let mapping = FieldMapping::constant("x", "").typed("date", Some("yyyyMMdd"));
        assert_eq!(format_field("2024-03-07", &mapping), "20240307");
        assert_eq!(format_field("03/07/2024", &mapping), "20240307");
        assert_eq!(format_field("2024-03-07T10:11:12", &mapping), "20240307");
        assert_eq!(format_field("not a date", &mapping), "not a date");
    }

    #[test]
    fn test_strftime_translation() {
        assert_eq!(strftime_pattern("dd-MMM-yyyy"), "%d-%b-%Y");
        assert_eq!(strftime_pattern("yyyy-MM-dd HH:mm:ss"), "%Y-%m-%d %H:%M:%S");
        assert_eq!(strftime_pattern("%Y/%m"), "%Y/%m");
    }
}
