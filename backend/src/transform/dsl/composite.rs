//! Composite aggregation: reduce several source fields to one value.
//!
//! Numeric operators parse each source as a double; string operators work on
//! the resolved text. Nothing here fails: bad input degrades to sentinels or
//! the mapping's default.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::resolver::resolve;
use crate::models::{format_number, Row};

/// Reference to one source column of a composite mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    /// Column name in the input row
    #[serde(alias = "source_field", alias = "field")]
    pub source_field: String,
}

impl SourceRef {
    pub fn new(field: impl Into<String>) -> Self {
        Self { source_field: field.into() }
    }
}

/// Composite operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositeOp {
    Sum,
    Avg,
    Min,
    Max,
    Concat,
    Upper,
    Lower,
    Trim,
    /// Unrecognized name; always yields the default value
    Unknown(String),
}

impl CompositeOp {
    /// Parse an operator name, case-insensitively, accepting long synonyms.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "sum" => Self::Sum,
            "avg" | "average" => Self::Avg,
            "min" | "minimum" => Self::Min,
            "max" | "maximum" => Self::Max,
            "concat" => Self::Concat,
            "upper" | "uppercase" => Self::Upper,
            "lower" | "lowercase" => Self::Lower,
            "trim" => Self::Trim,
            _ => Self::Unknown(name.to_string()),
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Concat => "concat",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Trim => "trim",
            Self::Unknown(name) => name,
        }
    }

    /// Operators that only look at the first source.
    pub fn first_source_only(&self) -> bool {
        matches!(self, Self::Upper | Self::Lower | Self::Trim)
    }
}

impl fmt::Display for CompositeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reduce `sources` with `op`.
///
/// - empty `sources` → `default`, whatever the operator
/// - `sum` / `avg`: unparsable values count as `0`
/// - `min` / `max`: unparsable values are skipped; if none parse the result
///   is `default`, or `"0"` when there is no default
/// - `concat`: join resolved values (missing → empty) with `delimiter`
/// - `upper` / `lower` / `trim`: first source only; absent → `default`
/// - unknown operator → `default`
pub fn aggregate(
    sources: &[SourceRef],
    row: &Row,
    op: &CompositeOp,
    delimiter: &str,
    default: &str,
) -> String {
    if sources.is_empty() {
        return default.to_string();
    }

    match op {
        CompositeOp::Sum => format_number(numbers(sources, row).map(|n| n.unwrap_or(0.0)).sum()),
        CompositeOp::Avg => {
            let total: f64 = numbers(sources, row).map(|n| n.unwrap_or(0.0)).sum();
            format_number(total / sources.len() as f64)
        }
        CompositeOp::Min => extreme(sources, row, default, f64::INFINITY, f64::min),
        CompositeOp::Max => extreme(sources, row, default, f64::NEG_INFINITY, f64::max),
        CompositeOp::Concat => sources
            .iter()
            .map(|s| resolve(&s.source_field, row, ""))
            .collect::<Vec<_>>()
            .join(delimiter),
        CompositeOp::Upper => first_value(sources, row)
            .map(|v| v.to_uppercase())
            .unwrap_or_else(|| default.to_string()),
        CompositeOp::Lower => first_value(sources, row)
            .map(|v| v.to_lowercase())
            .unwrap_or_else(|| default.to_string()),
        CompositeOp::Trim => first_value(sources, row)
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| default.to_string()),
        CompositeOp::Unknown(_) => default.to_string(),
    }
}

fn numbers<'a>(sources: &'a [SourceRef], row: &'a Row) -> impl Iterator<Item = Option<f64>> + 'a {
    sources.iter().map(move |s| {
        if s.source_field.is_empty() {
            return None;
        }
        row.lookup(&s.source_field).and_then(|v| v.as_f64())
    })
}

fn extreme(
    sources: &[SourceRef],
    row: &Row,
    default: &str,
    seed: f64,
    pick: fn(f64, f64) -> f64,
) -> String {
    let parsed: Vec<f64> = numbers(sources, row).flatten().collect();
    if parsed.is_empty() {
        return if default.is_empty() { "0".to_string() } else { default.to_string() };
    }
    format_number(parsed.into_iter().fold(seed, pick))
}

fn first_value(sources: &[SourceRef], row: &Row) -> Option<String> {
    let first = sources.first()?;
    if first.source_field.is_empty() {
        return None;
    }
    row.lookup(&first.source_field).map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(names: &[&str]) -> Vec<SourceRef> {
        names.iter().map(|n| SourceRef::new(*n)).collect()
    }

    fn sample_row() -> Row {
        Row::new().with("a", "100").with("b", "invalid").with("c", "80")
    }

    #[test]
    fn test_avg_counts_invalid_as_zero() {
        let out = aggregate(&refs(&["a", "b", "c"]), &sample_row(), &CompositeOp::parse("avg"), "", "");
        assert_eq!(out, "60.0");
    }

    #[test]
    fn test_sum() {
        let out = aggregate(&refs(&["a", "b", "c", "missing"]), &sample_row(), &CompositeOp::Sum, "", "");
        assert_eq!(out, "180.0");
    }

    #[test]
    fn test_min_max_skip_unparsable() {
        let row = sample_row();
        let sources = refs(&["a", "b", "c"]);
        assert_eq!(aggregate(&sources, &row, &CompositeOp::parse("MINIMUM"), "", ""), "80.0");
        assert_eq!(aggregate(&sources, &row, &CompositeOp::parse("maximum"), "", ""), "100.0");
    }

    #[test]
    fn test_min_max_all_unparsable_use_default() {
        let row = Row::new().with("x", "n/a");
        let sources = refs(&["x", "y"]);
        assert_eq!(aggregate(&sources, &row, &CompositeOp::Min, "", "-1"), "-1");
        assert_eq!(aggregate(&sources, &row, &CompositeOp::Max, "", ""), "0");
    }

    #[test]
    fn test_empty_sources_return_default() {
        let row = sample_row();
        for op in ["sum", "avg", "concat", "upper", "bogus"] {
            assert_eq!(aggregate(&[], &row, &CompositeOp::parse(op), ",", "0"), "0");
        }
    }

    #[test]
    fn test_concat_with_delimiter_and_missing() {
        let row = Row::new().with("first", "Jane").with("last", "Doe");
        assert_eq!(aggregate(&refs(&["first", "last"]), &row, &CompositeOp::Concat, " ", ""), "Jane Doe");
        assert_eq!(aggregate(&refs(&["first", "middle", "last"]), &row, &CompositeOp::Concat, "|", ""), "Jane||Doe");
        assert_eq!(aggregate(&refs(&["first", "last"]), &row, &CompositeOp::Concat, "", ""), "JaneDoe");
    }

    #[test]
    fn test_string_ops_use_first_source_only() {
        let row = Row::new().with("a", "  Mixed Case  ").with("b", "other");
        let sources = refs(&["a", "b"]);
        assert_eq!(aggregate(&sources, &row, &CompositeOp::parse("uppercase"), "", ""), "  MIXED CASE  ");
        assert_eq!(aggregate(&sources, &row, &CompositeOp::parse("lowercase"), "", ""), "  mixed case  ");
        assert_eq!(aggregate(&sources, &row, &CompositeOp::Trim, "", ""), "Mixed Case");
    }

    #[test]
    fn test_string_ops_absent_first_source() {
        let row = Row::new().with("b", "present");
        assert_eq!(aggregate(&refs(&["a", "b"]), &row, &CompositeOp::Upper, "", "N/A"), "N/A");
    }

    #[test]
    fn test_unknown_operator() {
        let op = CompositeOp::parse("median");
        assert_eq!(op, CompositeOp::Unknown("median".to_string()));
        assert_eq!(aggregate(&refs(&["a"]), &sample_row(), &op, "", "dflt"), "dflt");
    }
}
