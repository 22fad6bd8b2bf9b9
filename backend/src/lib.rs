//! # etlmap - declarative field transformation for batch ETL loads
//!
//! etlmap turns delimited input files into fixed-width or delimited load files
//! using mapping sets: one rule per output field, written in YAML or JSON.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Input file  │────▶│   Parser    │────▶│   Engine    │────▶│ Load file   │
//! │ (ISO/UTF8)  │     │ (auto-enc)  │     │ (DSL+format)│     │ (fixed/csv) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use etlmap::{run_file, BatchOptions, MappingSet};
//! use std::{path::Path, sync::Arc};
//!
//! #[tokio::main]
//! async fn main() {
//!     let set = Arc::new(MappingSet::from_path(Path::new("accounts.yaml")).unwrap());
//!     let report = run_file(Path::new("accounts.csv"), set, None, &BatchOptions::default()).await.unwrap();
//!     println!("{}", report.summary());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Rows and scalar values
//! - [`parser`] - Input parsing with auto-detection
//! - [`transform`] - Engine, formatter, assembler and batch runner
//! - [`validation`] - Mapping schema validation and lint
//! - [`registry`] - Stored mapping sets
//! - [`logs`] - Progress logging

// Core modules
pub mod error;
pub mod models;

// Logging
pub mod logs;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Mapping storage
pub mod registry;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExpressionError, InputError, MappingError, PipelineError, RegistryError, ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{format_number, parse_number, Row, Scalar};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_file_auto, parse_str,
    rows_from_json, ParseResult,
};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use transform::dsl::{
    aggregate, evaluate, evaluate_conditional, example_mapping_set, operators_description, resolve,
    transform_field, transform_row, CompositeOp, Condition, Expr, FieldMapping, MappingSet,
    OutputLayout, PadDirection, Predicate, SourceRef, Transformation,
};

// =============================================================================
// Re-exports - Output
// =============================================================================

pub use transform::{assemble, format_field, preview_row, ExecutionResult};

// =============================================================================
// Re-exports - Batch
// =============================================================================

pub use transform::pipeline::{run_batch, run_file, BatchOptions, BatchReport};

// =============================================================================
// Re-exports - Validation & Registry
// =============================================================================

pub use validation::{lint_mapping_set, load_validated, validate_mapping_document, LintFinding};
pub use registry::{MappingRegistry, StoredMapping};
