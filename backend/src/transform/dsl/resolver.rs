//! Value resolution: named lookup in a row with default fallback.

use crate::models::Row;

/// Resolve `field` in `row`, falling back to `default` when the name is
/// empty, the field is absent, or its value is null.
///
/// Lookup is case-insensitive (see [`Row::lookup`]).
pub fn resolve(field: &str, row: &Row, default: &str) -> String {
    if field.is_empty() {
        return default.to_string();
    }
    match row.lookup(field) {
        Some(value) => value.to_string(),
        None => default.to_string(),
    }
}

/// Resolve a reference that may name a field or be a literal: if `reference`
/// is a field in the row its value is returned, otherwise the text itself.
pub fn resolve_reference(reference: &str, row: &Row) -> String {
    resolve(reference, row, reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scalar;

    #[test]
    fn test_case_insensitive_resolution() {
        let row = Row::new().with("name", "X");
        assert_eq!(resolve("Name", &row, "fallback"), "X");
    }

    #[test]
    fn test_default_on_missing_or_null() {
        let row = Row::new().with_null("a");
        assert_eq!(resolve("a", &row, "dflt"), "dflt");
        assert_eq!(resolve("b", &row, "dflt"), "dflt");
        assert_eq!(resolve("b", &row, ""), "");
    }

    #[test]
    fn test_empty_field_name_uses_default() {
        let row = Row::new().with("", "value");
        assert_eq!(resolve("", &row, "dflt"), "dflt");
    }

    #[test]
    fn test_numbers_render_as_text() {
        let row = Row::new()
            .with("count", Scalar::Integer(42))
            .with("ratio", Scalar::Float(2.0));
        assert_eq!(resolve("count", &row, ""), "42");
        assert_eq!(resolve("ratio", &row, ""), "2.0");
    }

    #[test]
    fn test_reference_literal_or_field() {
        let row = Row::new().with("branch", "NYC");
        assert_eq!(resolve_reference("BRANCH", &row), "NYC");
        assert_eq!(resolve_reference("DEFAULT-CODE", &row), "DEFAULT-CODE");
    }
}
