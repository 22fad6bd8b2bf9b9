//! DSL Executor
//!
//! Entry point of the engine: compute one output field from one row.
//! Pure functions only. Nothing here logs, allocates shared state or fails.

use super::composite::aggregate;
use super::conditional::evaluate_conditional;
use super::mapping::{FieldMapping, MappingSet, Transformation};
use super::resolver::resolve;
use crate::models::Row;

/// Compute the raw (unformatted) value of `mapping` for `row`.
///
/// | Type          | Result                                        |
/// |---------------|-----------------------------------------------|
/// | `constant`    | `value` if non-blank, else the default        |
/// | `source`      | resolved `sourceField`, else the default      |
/// | `composite`   | [`aggregate`] over the sources                |
/// | `conditional` | [`evaluate_conditional`] over the conditions  |
/// | `blank`/other | the default                                   |
///
/// The default is `defaultValue`, or `""` when unset. Padding is the
/// formatter's job.
pub fn transform_field(row: &Row, mapping: &FieldMapping) -> String {
    let default = mapping.default_or_empty();

    match &mapping.transformation {
        Transformation::Constant { value } => match value.as_deref() {
            Some(v) if !v.trim().is_empty() => v.to_string(),
            _ => default.to_string(),
        },
        Transformation::Source { source_field } => {
            resolve(source_field.as_deref().unwrap_or(""), row, default)
        }
        Transformation::Composite { sources, operator, delimiter } => {
            aggregate(sources, row, operator, delimiter.as_deref().unwrap_or(""), default)
        }
        Transformation::Conditional { conditions } => evaluate_conditional(conditions, row, default),
        Transformation::Blank | Transformation::Unrecognized(_) => default.to_string(),
    }
}

/// Raw values of every field of `set`, in field order, paired with their
/// target names.
pub fn transform_row(row: &Row, set: &MappingSet) -> Vec<(String, String)> {
    set.fields
        .iter()
        .map(|field| (field.target_field.clone(), transform_field(row, field)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dsl::conditional::Condition;

    #[test]
    fn test_constant_is_pure() {
        let mapping = FieldMapping::constant("rec", "D");
        let rows = [
            Row::new(),
            Row::new().with("rec", "X"),
            Row::new().with_null("anything"),
        ];
        for row in &rows {
            assert_eq!(transform_field(row, &mapping), "D");
        }
    }

    #[test]
    fn test_blank_constant_uses_default() {
        let mapping = FieldMapping::constant("rec", "   ").with_default("Z");
        assert_eq!(transform_field(&Row::new(), &mapping), "Z");
    }

    #[test]
    fn test_source_resolution() {
        let mapping = FieldMapping::source("id", "Acct_No").with_default("none");
        assert_eq!(transform_field(&Row::new().with("acct_no", "42"), &mapping), "42");
        assert_eq!(transform_field(&Row::new(), &mapping), "none");
    }

    #[test]
    fn test_end_to_end_concat() {
        let mapping = FieldMapping::composite("full_name", "concat", &["first_name", "last_name"])
            .with_delimiter(" ");
        let row = Row::new().with("first_name", "Jane").with("last_name", "Doe");
        assert_eq!(transform_field(&row, &mapping), "Jane Doe");
    }

    #[test]
    fn test_conditional_dispatch() {
        let mapping = FieldMapping::conditional(
            "class",
            Condition::when("balance >= 1000", "GOLD").otherwise("STANDARD"),
        );
        assert_eq!(transform_field(&Row::new().with("balance", "1500"), &mapping), "GOLD");
        assert_eq!(transform_field(&Row::new().with("balance", "10"), &mapping), "STANDARD");
    }

    #[test]
    fn test_blank_and_unknown_yield_default() {
        let blank = FieldMapping::blank("filler").with_default("-");
        assert_eq!(transform_field(&Row::new(), &blank), "-");

        let json = r#"{"fields": [{"targetField": "x", "transformationType": "lookup",
            "sourceField": "a", "defaultValue": "?"}]}"#;
        let set = MappingSet::from_json(json).unwrap();
        assert_eq!(transform_field(&Row::new().with("a", "1"), &set.fields[0]), "?");
    }

    #[test]
    fn test_never_null() {
        let mapping = FieldMapping::source("x", "");
        assert_eq!(transform_field(&Row::new(), &mapping), "");
    }

    #[test]
    fn test_transform_row_pairs_in_order() {
        let set = MappingSet::new("t")
            .with_field(FieldMapping::constant("a", "1"))
            .with_field(FieldMapping::source("b", "col"));
        let pairs = transform_row(&Row::new().with("col", "v"), &set);
        assert_eq!(
            pairs,
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "v".to_string())]
        );
    }
}
