//! Mapping set validation.
//!
//! Two layers:
//!
//! - **Schema**: a mapping document (YAML or JSON, as a JSON value) is checked
//!   against the embedded JSON Schema (Draft 7) before it is loaded.
//! - **Lint**: a loaded [`MappingSet`] is inspected for rules that load fine
//!   but will silently produce defaults at run time. Findings are warnings;
//!   the engine accepts every mapping.
//!
//! # Embedded Schema
//!
//! `schemas/mapping-set.json` is embedded at compile time.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use etlmap::validation::validate_mapping_document;
//!
//! let doc = json!({ "fields": [{ "targetField": "id", "transformationType": "source", "sourceField": "ID" }] });
//! assert!(validate_mapping_document(&doc).is_ok());
//! ```

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

use crate::error::{ValidationError, ValidationResult};
use crate::transform::dsl::{read_document, CompositeOp, FieldMapping, MappingSet, OutputLayout, Predicate, Transformation};

const MAPPING_SCHEMA: &str = include_str!("../../schemas/mapping-set.json");

static MAPPING_VALIDATOR: Lazy<Result<jsonschema::Validator, String>> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(MAPPING_SCHEMA).map_err(|e| e.to_string())?;
    jsonschema::draft7::new(&schema).map_err(|e| e.to_string())
});

/// Validate a mapping document against the embedded mapping schema.
pub fn validate_mapping_document(document: &Value) -> ValidationResult<()> {
    let validator = MAPPING_VALIDATOR
        .as_ref()
        .map_err(|e| ValidationError::InvalidSchema(e.clone()))?;

    let errors: Vec<String> = validator.iter_errors(document).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::SchemaError { errors })
    }
}

/// Read a mapping file, validate it, and load it.
pub fn load_validated(path: &Path) -> ValidationResult<MappingSet> {
    let document = read_document(path)?;
    validate_mapping_document(&document)?;
    Ok(MappingSet::from_value(&document)?)
}

// =============================================================================
// Lint
// =============================================================================

/// A rule that loads but will likely not do what its author meant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintFinding {
    /// Target field of the offending mapping
    pub field: String,
    pub message: String,
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Inspect a mapping set and report suspicious rules.
pub fn lint_mapping_set(set: &MappingSet) -> Vec<LintFinding> {
    let mut findings = Vec::new();

    for field in &set.fields {
        let mut report = |message: String| {
            findings.push(LintFinding { field: field.target_field.clone(), message });
        };

        match &field.transformation {
            Transformation::Unrecognized(name) => {
                report(format!("unknown transformation type '{}', the default value will be used", name))
            }
            Transformation::Source { source_field } if source_field.as_deref().unwrap_or("").is_empty() => {
                report("source mapping has no sourceField".to_string())
            }
            Transformation::Composite { sources, operator, .. } => {
                if sources.is_empty() {
                    report("composite mapping has no sources".to_string());
                }
                if let CompositeOp::Unknown(name) = operator {
                    report(format!("unknown composite operator '{}'", name));
                }
                if operator.first_source_only() && sources.len() > 1 {
                    report(format!("'{}' only reads the first of {} sources", operator, sources.len()));
                }
            }
            Transformation::Conditional { conditions } => {
                if conditions.len() > 1 {
                    report(format!("only the first of {} conditions is evaluated", conditions.len()));
                }
                for predicate in conditional_predicates(field) {
                    if let Err(err) = predicate.check() {
                        report(format!("expression '{}' has a {}", predicate, err));
                    }
                }
            }
            _ => {}
        }
    }

    if set.layout == OutputLayout::Fixed {
        findings.extend(overlaps(set));
    }

    findings
}

fn conditional_predicates(field: &FieldMapping) -> Vec<&Predicate> {
    let Transformation::Conditional { conditions } = &field.transformation else {
        return Vec::new();
    };
    conditions
        .iter()
        .flat_map(|c| std::iter::once(c).chain(c.else_if.iter()))
        .filter_map(|c| c.if_expr.as_ref())
        .collect()
}

/// Fields whose fixed-layout span starts inside the previous span.
fn overlaps(set: &MappingSet) -> Vec<LintFinding> {
    let mut spans: Vec<(usize, usize, &str)> = Vec::new();
    let mut cursor = 0;
    for field in &set.fields {
        let start = if field.target_position > 0 { field.target_position - 1 } else { cursor };
        let end = start + field.length;
        cursor = end;
        if field.length > 0 {
            spans.push((start, end, &field.target_field));
        }
    }
    spans.sort_by_key(|(start, _, _)| *start);

    spans
        .windows(2)
        .filter(|pair| pair[1].0 < pair[0].1)
        .map(|pair| LintFinding {
            field: pair[1].2.to_string(),
            message: format!(
                "columns {}-{} overlap '{}' ({}-{})",
                pair[1].0 + 1,
                pair[1].1,
                pair[0].2,
                pair[0].0 + 1,
                pair[0].1
            ),
        })
        .collect()
}
