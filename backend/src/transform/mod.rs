//! Transformation module.
//!
//! - DSL: the field-transformation engine and mapping documents
//! - Format: data-type formatting, padding and truncation
//! - Assembler: fixed-width and delimited record building
//! - Pipeline: batch runner

pub mod assembler;
pub mod dsl;
pub mod format;
pub mod pipeline;

pub use assembler::{assemble, execute, preview_row, ExecutionResult};
pub use dsl::*;
pub use format::format_field;
pub use pipeline::*;
