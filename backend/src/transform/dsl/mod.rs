//! DSL (Domain Specific Language) for field transformation
//!
//! This module provides:
//! - `resolver`: case-insensitive field lookup with default fallback
//! - `composite`: SUM/AVG/MIN/MAX/CONCAT/UPPER/LOWER/TRIM over several sources
//! - `expression`: the conditional expression language (comparison, IN,
//!   BETWEEN, LIKE, `&&`, `||`, `!`)
//! - `conditional`: if / else-if / else chains
//! - `mapping`: mapping set documents
//! - `executor`: dispatch a field mapping against a row
//! - `reference`: operator and grammar reference text
//!
//! ## Usage Flow
//!
//! ```text
//! Row + FieldMapping → executor::transform_field → raw value → format::format_field
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use etlmap::transform::dsl::{transform_field, FieldMapping};
//! use etlmap::models::Row;
//!
//! let mapping = FieldMapping::composite("name", "concat", &["first", "last"]).with_delimiter(" ");
//! let row = Row::new().with("first", "Jane").with("last", "Doe");
//! assert_eq!(transform_field(&row, &mapping), "Jane Doe");
//! ```
//!
//! Nothing in this module returns an error: malformed expressions, missing
//! fields and unknown operators degrade to `false` or the default value.

pub mod composite;
pub mod conditional;
pub mod executor;
pub mod expression;
pub mod mapping;
pub mod reference;
pub mod resolver;

// Re-exports for convenience
pub use composite::{aggregate, CompositeOp, SourceRef};
pub use conditional::{evaluate_conditional, Condition};
pub use executor::{transform_field, transform_row};
pub use expression::{evaluate, parse, parse_strict, CompareOp, Expr, LikePattern, Operand, Predicate};
pub use mapping::{
    document_format, example_mapping_set, read_document, DocumentFormat, FieldMapping, MappingSet,
    OutputLayout, PadDirection, Transformation,
};
pub use reference::operators_description;
pub use resolver::{resolve, resolve_reference};
