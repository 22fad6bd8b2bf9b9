//! If / else-if / else dispatch over [`Predicate`]s.

use serde::{Deserialize, Serialize};

use super::expression::Predicate;
use super::resolver::resolve_reference;
use crate::models::Row;

/// One branch of a conditional mapping.
///
/// `then` and `else_expr` are references: a field name in the row, or a
/// literal when no such field exists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawCondition", into = "RawCondition")]
pub struct Condition {
    pub if_expr: Option<Predicate>,
    pub then: String,
    pub else_if: Vec<Condition>,
    pub else_expr: Option<String>,
}

impl Condition {
    /// Create a branch from an expression and a result reference.
    pub fn when(expr: &str, then: impl Into<String>) -> Self {
        Self {
            if_expr: Predicate::parse(expr),
            then: then.into(),
            ..Self::default()
        }
    }

    /// Append an else-if branch.
    pub fn or_when(mut self, expr: &str, then: impl Into<String>) -> Self {
        self.else_if.push(Condition::when(expr, then));
        self
    }

    /// Set the fallback reference.
    pub fn otherwise(mut self, reference: impl Into<String>) -> Self {
        self.else_expr = Some(reference.into());
        self
    }

    fn matches(&self, row: &Row) -> bool {
        self.if_expr.as_ref().is_some_and(|p| p.matches(row))
    }
}

/// Walk the chain carried by the first condition and return the first
/// matching branch's resolved value.
///
/// Only `conditions[0]` is consulted; an empty list yields `default`.
pub fn evaluate_conditional(conditions: &[Condition], row: &Row, default: &str) -> String {
    let Some(head) = conditions.first() else {
        return default.to_string();
    };

    if head.matches(row) {
        return resolve_reference(&head.then, row);
    }

    if let Some(branch) = head.else_if.iter().find(|c| c.matches(row)) {
        return resolve_reference(&branch.then, row);
    }

    match head.else_expr.as_deref() {
        Some(reference) if !reference.is_empty() => resolve_reference(reference, row),
        _ => default.to_string(),
    }
}

/// Document shape of a condition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCondition {
    #[serde(default, alias = "if", deserialize_with = "super::mapping::lenient_predicate", skip_serializing_if = "Option::is_none")]
    if_expr: Option<Predicate>,
    #[serde(default, deserialize_with = "super::mapping::lenient_string", skip_serializing_if = "Option::is_none")]
    then: Option<String>,
    #[serde(default, alias = "elseIf", alias = "else_if", skip_serializing_if = "Vec::is_empty")]
    else_if_exprs: Vec<Condition>,
    #[serde(default, alias = "else", deserialize_with = "super::mapping::lenient_string", skip_serializing_if = "Option::is_none")]
    else_expr: Option<String>,
}

impl From<RawCondition> for Condition {
    fn from(raw: RawCondition) -> Self {
        Self {
            if_expr: raw.if_expr,
            then: raw.then.unwrap_or_default(),
            else_if: raw.else_if_exprs,
            else_expr: raw.else_expr,
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(c: Condition) -> Self {
        Self {
            if_expr: c.if_expr,
            then: Some(c.then),
            else_if_exprs: c.else_if,
            else_expr: c.else_expr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<Condition> {
        vec![Condition::when("x == 1", "A").or_when("x == 2", "B").otherwise("C")]
    }

    #[test]
    fn test_else_if_short_circuit() {
        let row = Row::new().with("x", "2");
        assert_eq!(evaluate_conditional(&chain(), &row, "D"), "B");
    }

    #[test]
    fn test_if_and_else_branches() {
        assert_eq!(evaluate_conditional(&chain(), &Row::new().with("x", "1"), "D"), "A");
        assert_eq!(evaluate_conditional(&chain(), &Row::new().with("x", "3"), "D"), "C");
    }

    #[test]
    fn test_first_matching_else_if_wins() {
        let conditions = vec![Condition::when("x == 0", "zero")
            .or_when("x > 1", "big")
            .or_when("x > 5", "huge")];
        let row = Row::new().with("x", "9");
        assert_eq!(evaluate_conditional(&conditions, &row, ""), "big");
    }

    #[test]
    fn test_no_else_uses_default() {
        let conditions = vec![Condition::when("x == 1", "A")];
        assert_eq!(evaluate_conditional(&conditions, &Row::new(), "dflt"), "dflt");
        assert_eq!(evaluate_conditional(&[], &Row::new(), "dflt"), "dflt");
    }

    #[test]
    fn test_then_resolves_field_reference() {
        let conditions = vec![Condition::when("type == 'CHK'", "checking_no").otherwise("savings_no")];
        let row = Row::new()
            .with("type", "CHK")
            .with("checking_no", "111")
            .with("savings_no", "222");
        assert_eq!(evaluate_conditional(&conditions, &row, ""), "111");
        let row = row.with("type", "SAV");
        assert_eq!(evaluate_conditional(&conditions, &row, ""), "222");
    }

    #[test]
    fn test_only_first_condition_is_active() {
        let conditions = vec![Condition::when("x == 1", "A"), Condition::when("x == 2", "B")];
        let row = Row::new().with("x", "2");
        assert_eq!(evaluate_conditional(&conditions, &row, "dflt"), "dflt");
    }

    #[test]
    fn test_empty_if_expr_is_skipped() {
        let conditions = vec![Condition::when("", "A").or_when("x == 2", "B")];
        let row = Row::new().with("x", "2");
        assert_eq!(evaluate_conditional(&conditions, &row, ""), "B");
    }

    #[test]
    fn test_deserialize_with_aliases() {
        let yaml = "if: \"code IN ('A', 'B')\"\nthen: LETTER\nelse_if:\n  - if: code == 1\n    then: 1\nelse: OTHER\n";
        let condition: Condition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(condition.then, "LETTER");
        assert_eq!(condition.else_if.len(), 1);
        assert_eq!(condition.else_if[0].then, "1");
        assert_eq!(condition.else_expr.as_deref(), Some("OTHER"));
        assert!(condition.if_expr.unwrap().check().is_ok());
    }
}
