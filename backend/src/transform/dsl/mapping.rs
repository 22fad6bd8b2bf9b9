//! Mapping set definition
//!
//! A mapping set describes how to build one output record from one input row:
//! an ordered list of [`FieldMapping`]s plus the output layout. Documents are
//! YAML or JSON in camelCase; on load each field is compiled into a closed
//! [`Transformation`] and its expressions are parsed once.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

use super::composite::{CompositeOp, SourceRef};
use super::conditional::Condition;
use super::expression::Predicate;
use crate::error::{MappingError, MappingResult};

// =============================================================================
// Mapping Set
// =============================================================================

/// A complete set of field mappings for one load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSet {
    /// Name of the load (e.g. target table)
    #[serde(default)]
    pub name: String,

    /// Version of the mapping document
    #[serde(default = "default_version", deserialize_with = "lenient_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Variant selector when one load has several record types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,

    /// Output record layout
    #[serde(default)]
    pub layout: OutputLayout,

    /// Field mappings, ordered by target position after loading
    #[serde(alias = "mappings")]
    pub fields: Vec<FieldMapping>,
}

/// Shape of the assembled output record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputLayout {
    /// Values placed at fixed character positions
    #[default]
    Fixed,
    /// Values joined by a delimiter
    Delimited {
        #[serde(default = "default_output_delimiter")]
        delimiter: String,
    },
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_output_delimiter() -> String {
    "|".to_string()
}

impl MappingSet {
    /// Create an empty set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: String::new(),
            transaction_type: None,
            layout: OutputLayout::default(),
            fields: Vec::new(),
        }
    }

    /// Builder: append a field.
    pub fn with_field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }

    /// Builder: set the layout.
    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> MappingResult<Self> {
        let set: Self = serde_yaml::from_str(yaml)?;
        Ok(set.normalized())
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> MappingResult<Self> {
        let set: Self = serde_json::from_str(json)?;
        Ok(set.normalized())
    }

    /// Parse from an already-decoded JSON value.
    pub fn from_value(value: &Value) -> MappingResult<Self> {
        let set: Self = serde_json::from_value(value.clone())?;
        Ok(set.normalized())
    }

    /// Load a document, choosing the format from the file extension.
    pub fn from_path(path: &Path) -> MappingResult<Self> {
        let content = std::fs::read_to_string(path)?;
        match document_format(path)? {
            DocumentFormat::Yaml => Self::from_yaml(&content),
            DocumentFormat::Json => Self::from_json(&content),
        }
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> MappingResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> MappingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Order fields by target position; equal positions keep document order.
    /// A field at position 0 ("after the previous field") stays behind its
    /// predecessor.
    fn normalized(mut self) -> Self {
        let mut carried = 0;
        let mut keyed: Vec<(usize, FieldMapping)> = self
            .fields
            .into_iter()
            .map(|f| {
                if f.target_position > 0 {
                    carried = f.target_position;
                }
                (carried, f)
            })
            .collect();
        keyed.sort_by_key(|(key, _)| *key);
        self.fields = keyed.into_iter().map(|(_, f)| f).collect();
        self
    }

    /// All input columns referenced by the set.
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.fields.iter().flat_map(|f| f.source_columns()).collect();
        columns.sort();
        columns.dedup();
        columns
    }

    /// Names of the output fields, in order.
    pub fn target_fields(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.target_field.clone()).collect()
    }

    /// Check that every referenced column exists in `headers`
    /// (case-insensitive). Returns the missing ones.
    pub fn validate_headers(&self, headers: &[String]) -> Result<(), Vec<String>> {
        let missing: Vec<String> = self
            .source_columns()
            .into_iter()
            .filter(|col| !headers.iter().any(|h| h.eq_ignore_ascii_case(col)))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Width of a fixed-layout record: the furthest position + length.
    pub fn record_width(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| f.target_position > 0)
            .map(|f| f.target_position - 1 + f.length)
            .max()
            .unwrap_or(0)
    }
}

/// Serialization format of a mapping document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

/// Infer the document format from a path's extension.
pub fn document_format(path: &Path) -> MappingResult<DocumentFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "yaml" | "yml" => Ok(DocumentFormat::Yaml),
        "json" => Ok(DocumentFormat::Json),
        _ => Err(MappingError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Read a mapping document as a generic JSON value (for schema validation).
pub fn read_document(path: &Path) -> MappingResult<Value> {
    let content = std::fs::read_to_string(path)?;
    match document_format(path)? {
        DocumentFormat::Yaml => Ok(serde_yaml::from_str(&content)?),
        DocumentFormat::Json => Ok(serde_json::from_str(&content)?),
    }
}

// =============================================================================
// Field Mapping
// =============================================================================

/// How one output field is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFieldMapping", into = "RawFieldMapping")]
pub struct FieldMapping {
    /// Output field name
    pub target_field: String,
    /// 1-based start column in a fixed layout; 0 = after the previous field
    pub target_position: usize,
    /// Fixed width; 0 = no padding or truncation
    pub length: usize,
    pub data_type: Option<String>,
    pub format: Option<String>,
    pub pad: Option<PadDirection>,
    pub pad_char: Option<char>,
    pub default_value: Option<String>,
    pub transformation: Transformation,
}

/// The value-producing rule of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformation {
    Constant { value: Option<String> },
    Source { source_field: Option<String> },
    Composite { sources: Vec<SourceRef>, operator: CompositeOp, delimiter: Option<String> },
    Conditional { conditions: Vec<Condition> },
    Blank,
    /// Type name not recognized; behaves as [`Transformation::Blank`]
    Unrecognized(String),
}

impl Transformation {
    /// Document name of the transformation type.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Constant { .. } => "constant",
            Self::Source { .. } => "source",
            Self::Composite { .. } => "composite",
            Self::Conditional { .. } => "conditional",
            Self::Blank => "blank",
            Self::Unrecognized(name) => name,
        }
    }
}

/// Side on which the formatter pads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadDirection {
    Left,
    Right,
}

impl PadDirection {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "left" | "l" | "lpad" => Some(Self::Left),
            "right" | "r" | "rpad" => Some(Self::Right),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl FieldMapping {
    fn with_transformation(target: &str, transformation: Transformation) -> Self {
        Self {
            target_field: target.to_string(),
            target_position: 0,
            length: 0,
            data_type: None,
            format: None,
            pad: None,
            pad_char: None,
            default_value: None,
            transformation,
        }
    }

    /// A constant field.
    pub fn constant(target: &str, value: &str) -> Self {
        Self::with_transformation(target, Transformation::Constant { value: Some(value.to_string()) })
    }

    /// A field copied from one input column.
    pub fn source(target: &str, column: &str) -> Self {
        Self::with_transformation(target, Transformation::Source { source_field: Some(column.to_string()) })
    }

    /// A field reduced from several columns.
    pub fn composite(target: &str, operator: &str, columns: &[&str]) -> Self {
        Self::with_transformation(
            target,
            Transformation::Composite {
                sources: columns.iter().map(|c| SourceRef::new(*c)).collect(),
                operator: CompositeOp::parse(operator),
                delimiter: None,
            },
        )
    }

    /// A field chosen by a condition chain.
    pub fn conditional(target: &str, condition: Condition) -> Self {
        Self::with_transformation(target, Transformation::Conditional { conditions: vec![condition] })
    }

    /// A field that always takes its default.
    pub fn blank(target: &str) -> Self {
        Self::with_transformation(target, Transformation::Blank)
    }

    /// Builder: place at a fixed position and width.
    pub fn at(mut self, position: usize, length: usize) -> Self {
        self.target_position = position;
        self.length = length;
        self
    }

    /// Builder: set the default value.
    pub fn with_default(mut self, default: &str) -> Self {
        self.default_value = Some(default.to_string());
        self
    }

    /// Builder: set the concat delimiter (composite only).
    pub fn with_delimiter(mut self, delimiter: &str) -> Self {
        if let Transformation::Composite { delimiter: d, .. } = &mut self.transformation {
            *d = Some(delimiter.to_string());
        }
        self
    }

    /// Builder: set data type and format.
    pub fn typed(mut self, data_type: &str, format: Option<&str>) -> Self {
        self.data_type = Some(data_type.to_string());
        self.format = format.map(str::to_string);
        self
    }

    /// Builder: set padding.
    pub fn padded(mut self, pad: PadDirection, pad_char: char) -> Self {
        self.pad = Some(pad);
        self.pad_char = Some(pad_char);
        self
    }

    /// Default value, empty when unset.
    pub fn default_or_empty(&self) -> &str {
        self.default_value.as_deref().unwrap_or("")
    }

    /// Input columns this field may read. Conditional `then`/`else`
    /// references are not included because they may be literals.
    pub fn source_columns(&self) -> Vec<String> {
        match &self.transformation {
            Transformation::Source { source_field: Some(f) } if !f.is_empty() => vec![f.clone()],
            Transformation::Composite { sources, .. } => sources
                .iter()
                .filter(|s| !s.source_field.is_empty())
                .map(|s| s.source_field.clone())
                .collect(),
            Transformation::Conditional { conditions } => conditions
                .first()
                .map(|head| {
                    std::iter::once(head)
                        .chain(head.else_if.iter())
                        .filter_map(|c| c.if_expr.as_ref())
                        .flat_map(|p| p.expr().fields())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// Document Shape
// =============================================================================

/// Field mapping as it appears in a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFieldMapping {
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    transformation_type: Option<String>,
    #[serde(default)]
    target_field: String,
    #[serde(default, alias = "position")]
    target_position: usize,
    #[serde(default)]
    length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pad: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pad_char: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, alias = "default", deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transform: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    conditions: Vec<Condition>,
}

impl From<RawFieldMapping> for FieldMapping {
    fn from(raw: RawFieldMapping) -> Self {
        let type_name = raw.transformation_type.as_deref().unwrap_or("").trim().to_lowercase();
        let transformation = match type_name.as_str() {
            "constant" => Transformation::Constant { value: raw.value },
            "source" => Transformation::Source { source_field: raw.source_field },
            "composite" => Transformation::Composite {
                sources: raw.sources,
                operator: CompositeOp::parse(raw.transform.as_deref().unwrap_or("")),
                delimiter: raw.delimiter,
            },
            "conditional" => Transformation::Conditional { conditions: raw.conditions },
            "blank" | "" => Transformation::Blank,
            _ => Transformation::Unrecognized(raw.transformation_type.unwrap_or_default()),
        };

        Self {
            target_field: raw.target_field,
            target_position: raw.target_position,
            length: raw.length,
            data_type: raw.data_type,
            format: raw.format,
            pad: raw.pad.as_deref().and_then(PadDirection::parse),
            pad_char: raw.pad_char.and_then(|s| s.chars().next()),
            default_value: raw.default_value,
            transformation,
        }
    }
}

impl From<FieldMapping> for RawFieldMapping {
    fn from(field: FieldMapping) -> Self {
        let mut raw = RawFieldMapping {
            transformation_type: Some(field.transformation.type_name().to_string()),
            target_field: field.target_field,
            target_position: field.target_position,
            length: field.length,
            data_type: field.data_type,
            format: field.format,
            pad: field.pad.map(|p| p.name().to_string()),
            pad_char: field.pad_char.map(String::from),
            default_value: field.default_value,
            ..RawFieldMapping::default()
        };
        match field.transformation {
            Transformation::Constant { value } => raw.value = value,
            Transformation::Source { source_field } => raw.source_field = source_field,
            Transformation::Composite { sources, operator, delimiter } => {
                raw.sources = sources;
                raw.transform = Some(operator.name().to_string());
                raw.delimiter = delimiter;
            }
            Transformation::Conditional { conditions } => raw.conditions = conditions,
            Transformation::Blank | Transformation::Unrecognized(_) => {}
        }
        raw
    }
}

/// Accept strings, numbers and booleans where a document expects text.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("expected a scalar, found {}", other))),
    }
}

/// `version` may be written as a number (`1.0`) or text.
fn lenient_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_else(default_version))
}

/// Parse an expression field; blank text means "no expression".
pub(crate) fn lenient_predicate<'de, D>(deserializer: D) -> Result<Option<Predicate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.and_then(|s| Predicate::parse(&s)))
}

// =============================================================================
// Example
// =============================================================================

/// Example mapping set for documentation and `etlmap example-mapping`.
pub fn example_mapping_set() -> MappingSet {
    MappingSet {
        name: "customer_accounts".to_string(),
        version: "1.0".to_string(),
        description: "Customer account extract for the nightly accounts load".to_string(),
        transaction_type: Some("DAILY".to_string()),
        layout: OutputLayout::Fixed,
        fields: vec![
            FieldMapping::constant("record_type", "D").at(1, 1),
            FieldMapping::source("account_id", "acct_no")
                .at(2, 10)
                .padded(PadDirection::Left, '0'),
            FieldMapping::composite("customer_name", "concat", &["first_name", "last_name"])
                .with_delimiter(" ")
                .at(12, 30),
            FieldMapping::conditional(
                "account_class",
                Condition::when("acct_type IN ('CHK', 'DDA')", "CHECKING")
                    .or_when("acct_type == 'SAV' && balance >= 10000", "PREMIUM_SAVINGS")
                    .or_when("acct_type LIKE 'SAV%'", "SAVINGS")
                    .otherwise("OTHER"),
            )
            .at(42, 16),
            FieldMapping::composite("total_balance", "sum", &["balance", "pending"])
                .with_default("0")
                .typed("decimal", Some("0.00"))
                .at(58, 12),
            FieldMapping::source("open_date", "opened")
                .typed("date", Some("yyyyMMdd"))
                .at(70, 8),
            FieldMapping::blank("filler").with_default("").at(78, 3),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: payments
transactionType: ACH
layout:
  type: delimited
  delimiter: ","
fields:
  - targetField: amount
    targetPosition: 2
    transformationType: source
    sourceField: amt
    defaultValue: 0
  - targetField: kind
    targetPosition: 1
    transformationType: CONSTANT
    value: P
  - targetField: routing
    targetPosition: 3
    transformationType: conditional
    conditions:
      - ifExpr: "bank LIKE '0%'"
        then: bank
        elseIfExprs:
          - ifExpr: "bank == null"
            then: "000000000"
        elseExpr: UNKNOWN
  - targetField: mystery
    targetPosition: 4
    transformationType: lookup
  - targetField: untyped
    targetPosition: 5
    defaultValue: X
"#;

    #[test]
    fn test_yaml_load_sorts_and_compiles() {
        let set = MappingSet::from_yaml(SAMPLE).unwrap();
        assert_eq!(set.name, "payments");
        assert_eq!(set.transaction_type.as_deref(), Some("ACH"));
        assert_eq!(set.layout, OutputLayout::Delimited { delimiter: ",".to_string() });
        assert_eq!(set.target_fields(), vec!["kind", "amount", "routing", "mystery", "untyped"]);

        assert_eq!(set.fields[0].transformation, Transformation::Constant { value: Some("P".to_string()) });
        assert_eq!(set.fields[1].default_value.as_deref(), Some("0"));
        assert!(matches!(set.fields[2].transformation, Transformation::Conditional { .. }));
        assert_eq!(set.fields[3].transformation, Transformation::Unrecognized("lookup".to_string()));
        assert_eq!(set.fields[4].transformation, Transformation::Blank);
    }

    #[test]
    fn test_source_columns_include_expression_fields() {
        let set = MappingSet::from_yaml(SAMPLE).unwrap();
        assert_eq!(set.source_columns(), vec!["amt", "bank"]);
        assert!(set.validate_headers(&["AMT".to_string(), "Bank".to_string()]).is_ok());
        assert_eq!(set.validate_headers(&["amt".to_string()]), Err(vec!["bank".to_string()]));
    }

    #[test]
    fn test_json_round_trip_preserves_rules() {
        let set = example_mapping_set();
        let json = set.to_json().unwrap();
        let parsed = MappingSet::from_json(&json).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{"fields": [{"targetField": "a", "transformationType": "constant",
            "value": "v", "sourceField": "ignored", "conditions": []}]}"#;
        let set = MappingSet::from_json(json).unwrap();
        assert_eq!(set.fields[0].transformation, Transformation::Constant { value: Some("v".to_string()) });
        assert_eq!(set.version, "1.0");
        assert_eq!(set.layout, OutputLayout::Fixed);
    }

    #[test]
    fn test_numeric_version_accepted() {
        let json = r#"{"name": "gl", "version": 2.1, "fields": []}"#;
        let doc: Value = serde_json::from_str(json).unwrap();
        assert!(crate::validation::validate_mapping_document(&doc).is_ok());
        assert_eq!(MappingSet::from_json(json).unwrap().version, "2.1");

        let set = MappingSet::from_yaml("version: 3\nfields: []\n").unwrap();
        assert_eq!(set.version, "3");
        let set = MappingSet::from_json(r#"{"version": null, "fields": []}"#).unwrap();
        assert_eq!(set.version, "1.0");
    }

    #[test]
    fn test_record_width() {
        assert_eq!(example_mapping_set().record_width(), 80);
    }

    #[test]
    fn test_document_format_from_extension() {
        assert_eq!(document_format(Path::new("a.YML")).unwrap(), DocumentFormat::Yaml);
        assert_eq!(document_format(Path::new("a.json")).unwrap(), DocumentFormat::Json);
        assert!(document_format(Path::new("a.txt")).is_err());
    }
}
