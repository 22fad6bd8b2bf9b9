//! Error types for the etlmap loader, registry and batch runner.
//!
//! - [`InputError`] - input file reading and decoding
//! - [`ExpressionError`] - strict expression parsing (lint only)
//! - [`MappingError`] - mapping document loading
//! - [`RegistryError`] - mapping registry errors
//! - [`ValidationError`] - schema validation
//! - [`PipelineError`] - top-level batch orchestration
//!
//! The transformation engine itself never returns errors: malformed rules and
//! rows degrade to default values. These types cover the layers around it.

use thiserror::Error;

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while reading an input file.
#[derive(Debug, Error)]
pub enum InputError {
    /// Failed to read file.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed record.
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Empty file.
    #[error("Input file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in input")]
    NoHeaders,

    /// Delimiter cannot be used by the reader.
    #[error("Unsupported delimiter '{0}' (must be a single ASCII character)")]
    InvalidDelimiter(char),

    /// JSON input element is not an object.
    #[error("Record {0} is not a JSON object")]
    NotAnObject(usize),
}

// =============================================================================
// Expression Errors
// =============================================================================

/// A clause the expression grammar does not accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed clause '{clause}': {reason}")]
pub struct ExpressionError {
    /// Offending clause text.
    pub clause: String,
    /// What is wrong with it.
    pub reason: String,
}

// =============================================================================
// Mapping Errors
// =============================================================================

/// Errors while loading a mapping document.
#[derive(Debug, Error)]
pub enum MappingError {
    /// IO error.
    #[error("Failed to read mapping: {0}")]
    Io(#[from] std::io::Error),

    /// YAML syntax or shape error.
    #[error("Invalid mapping YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error.
    #[error("Invalid mapping JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension is neither YAML nor JSON.
    #[error("Unsupported mapping format: {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the mapping registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Mapping not found.
    #[error("Mapping not found: {0}")]
    NotFound(String),

    /// Mapping document failed schema validation.
    #[error("Invalid mapping: {}", .0.join("; "))]
    InvalidMapping(Vec<String>),

    /// Mapping could not be loaded.
    #[error("Registry mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// IO error.
    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors during mapping validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Document does not match the mapping schema.
    #[error("Validation failed: {errors:?}")]
    SchemaError { errors: Vec<String> },

    /// Embedded schema could not be compiled.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Document could not be read.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level batch errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_file`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input reading error.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Mapping loading error.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Output writing error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker task panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// No records to transform.
    #[error("No records to transform")]
    EmptyInput,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input reading.
pub type InputResult<T> = Result<T, InputError>;

/// Result type for mapping loading.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // InputError -> PipelineError
        let input_err = InputError::EmptyFile;
        let pipeline_err: PipelineError = input_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // RegistryError -> PipelineError
        let registry_err = RegistryError::NotFound("payments".into());
        let pipeline_err: PipelineError = registry_err.into();
        assert!(pipeline_err.to_string().contains("payments"));
    }

    #[test]
    fn test_invalid_mapping_joins_messages() {
        let err = RegistryError::InvalidMapping(vec!["a missing".into(), "b wrong".into()]);
        assert_eq!(err.to_string(), "Invalid mapping: a missing; b wrong");
    }

    #[test]
    fn test_expression_error_format() {
        let err = ExpressionError {
            clause: "amount BETWEEN x AND 5".into(),
            reason: "BETWEEN bounds must be numeric".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("amount BETWEEN x AND 5"));
        assert!(msg.contains("numeric"));
    }
}
