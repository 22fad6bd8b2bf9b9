//! Batch runner: apply a mapping set to many rows.
//!
//! Rows are split into contiguous chunks, each chunk is assembled on a
//! blocking worker, and the results are joined back in input order. The
//! mapping set is shared read-only through an [`Arc`].
//!
//! # Example
//!
//! ```rust,ignore
//! use etlmap::transform::pipeline::{run_file, BatchOptions};
//! use etlmap::transform::dsl::MappingSet;
//! use std::{path::Path, sync::Arc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let set = Arc::new(MappingSet::from_path(Path::new("accounts.yaml"))?);
//!     let report = run_file(Path::new("accounts.csv"), set, Some(Path::new("accounts.dat")), &BatchOptions::default()).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::assembler::{execute, ExecutionResult};
use super::dsl::{MappingSet, OutputLayout};
use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::Row;
use crate::parser::parse_file_auto;
use crate::validation::lint_mapping_set;

/// Environment variable for the worker count
pub const WORKERS_ENV: &str = "ETLMAP_WORKERS";

/// Options for a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchOptions {
    /// Number of blocking workers
    pub workers: usize,

    /// Replace the mapping set's own layout
    pub layout: Option<OutputLayout>,

    /// Check input headers and lint the mapping before running
    pub validate: bool,

    /// Rows shown by `etlmap preview`
    pub preview_rows: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            layout: None,
            validate: true,
            preview_rows: 5,
        }
    }
}

impl BatchOptions {
    /// Defaults, with `ETLMAP_WORKERS` applied when set and valid.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(workers) = std::env::var(WORKERS_ENV).ok().as_deref().and_then(parse_workers) {
            options.workers = workers;
        }
        options
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn parse_workers(text: &str) -> Option<usize> {
    text.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

/// Outcome of a batch run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub job_id: Uuid,
    /// Name of the mapping set applied
    pub mapping: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows_read: usize,
    pub lines_written: usize,
    /// Per target field, rows where the value fell back to empty
    pub empty_fields: BTreeMap<String, usize>,
    /// Output lines, in input order
    #[serde(skip)]
    pub records: Vec<String>,
}

impl BatchReport {
    /// Get summary statistics
    pub fn summary(&self) -> String {
        let elapsed = self.finished_at - self.started_at;
        format!(
            "Job {}: {} rows read, {} lines written in {} ms",
            self.job_id,
            self.rows_read,
            self.lines_written,
            elapsed.num_milliseconds()
        )
    }
}

/// Assemble every row with `set`, sharded across `options.workers`.
pub async fn run_batch(rows: Vec<Row>, set: Arc<MappingSet>, options: &BatchOptions) -> PipelineResult<BatchReport> {
    let started_at = Utc::now();
    let job_id = Uuid::new_v4();

    let set = match &options.layout {
        Some(layout) if *layout != set.layout => Arc::new(set.as_ref().clone().with_layout(layout.clone())),
        _ => set,
    };

    let rows_read = rows.len();
    let workers = options.workers.max(1);
    let chunk_size = rows_read.div_ceil(workers).max(1);

    log_info(format!("⚙️  Job {}: {} rows, {} worker(s)", job_id, rows_read, workers));

    let mut chunks: Vec<Vec<Row>> = Vec::new();
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        chunks.push(rows.by_ref().take(chunk_size).collect());
    }

    let handles = chunks.into_iter().map(|chunk| {
        let set = Arc::clone(&set);
        tokio::task::spawn_blocking(move || execute(&chunk, &set))
    });

    let mut result = ExecutionResult::new();
    for (i, joined) in join_all(handles).await.into_iter().enumerate() {
        let part = joined.map_err(|e| PipelineError::Worker(e.to_string()))?;
        log_info_indent(format!("chunk {}: {} records", i + 1, part.records.len()), 1);
        result.merge(part);
    }

    let report = BatchReport {
        job_id,
        mapping: set.name.clone(),
        started_at,
        finished_at: Utc::now(),
        rows_read,
        lines_written: result.records.len(),
        empty_fields: result.empty_fields,
        records: result.records,
    };
    log_success(report.summary());
    Ok(report)
}

/// Read `input`, run the batch, and write the output lines to `output`
/// when given.
pub async fn run_file(
    input: &Path,
    set: Arc<MappingSet>,
    output: Option<&Path>,
    options: &BatchOptions,
) -> PipelineResult<BatchReport> {
    log_info(format!("📖 Reading {}...", input.display()));
    let parsed = parse_file_auto(input)?;
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!("Read {} rows, {} columns", parsed.rows.len(), parsed.headers.len()));

    if parsed.rows.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    if options.validate {
        check_inputs(&set, &parsed.headers);
    }

    let report = run_batch(parsed.rows, set, options).await?;

    for (field, count) in report.empty_fields.iter().filter(|(_, c)| **c == report.rows_read) {
        log_warning(format!("Field '{}' was empty in all {} rows", field, count));
    }

    if let Some(path) = output {
        let mut content = report.records.join("\n");
        content.push('\n');
        tokio::fs::write(path, content).await?;
        log_success(format!("Wrote {} lines to {}", report.lines_written, path.display()));
    }

    Ok(report)
}

fn check_inputs(set: &MappingSet, headers: &[String]) {
    if let Err(missing) = set.validate_headers(headers) {
        log_warning(format!("Columns referenced by the mapping but missing from input: {}", missing.join(", ")));
    }
    for finding in lint_mapping_set(set) {
        log_warning(finding.to_string());
    }
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dsl::FieldMapping;

    fn numbered_rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| Row::new().with("id", i.to_string())).collect()
    }

    fn id_set() -> Arc<MappingSet> {
        Arc::new(
            MappingSet::new("ids")
                .with_field(FieldMapping::constant("rec", "R").at(1, 1))
                .with_field(FieldMapping::source("id", "id").at(2, 4).padded(crate::transform::dsl::PadDirection::Left, '0'))
                .with_field(FieldMapping::source("note", "note").at(6, 2)),
        )
    }

    #[test]
    fn test_default_options() {
        let opts = BatchOptions::default();
        assert!(opts.workers >= 1);
        assert!(opts.validate);
        assert!(opts.layout.is_none());
        assert_eq!(opts.preview_rows, 5);
    }

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers(" 4 "), Some(4));
        assert_eq!(parse_workers("0"), None);
        assert_eq!(parse_workers("many"), None);
    }

    #[tokio::test]
    async fn test_run_batch_preserves_order() {
        let options = BatchOptions::default().with_workers(3);
        let report = run_batch(numbered_rows(10), id_set(), &options).await.unwrap();

        assert_eq!(report.rows_read, 10);
        assert_eq!(report.lines_written, 10);
        for (i, line) in report.records.iter().enumerate() {
            assert_eq!(line, &format!("R{:04}  ", i));
        }
        assert_eq!(report.empty_fields.get("note"), Some(&10));
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn test_run_batch_more_workers_than_rows() {
        let options = BatchOptions::default().with_workers(16);
        let report = run_batch(numbered_rows(2), id_set(), &options).await.unwrap();
        assert_eq!(report.records, vec!["R0000  ", "R0001  "]);
    }

    #[tokio::test]
    async fn test_run_batch_layout_override() {
        let options = BatchOptions::default()
            .with_workers(1)
            .with_layout(OutputLayout::Delimited { delimiter: "|".to_string() });
        let report = run_batch(numbered_rows(1), id_set(), &options).await.unwrap();
        assert_eq!(report.records[0], "R|0000|  ");
    }

    #[tokio::test]
    async fn test_run_batch_empty() {
        let report = run_batch(Vec::new(), id_set(), &BatchOptions::default()).await.unwrap();
        assert_eq!(report.rows_read, 0);
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn test_run_file_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.dat");
        std::fs::write(&input, "id;note\n7;ok\n8;\n").unwrap();

        let report = run_file(&input, id_set(), Some(&output), &BatchOptions::default())
            .await
            .unwrap();

        assert_eq!(report.lines_written, 2);
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, "R0007ok\nR0008  \n");
        assert_eq!(report.empty_fields.get("note"), Some(&1));
    }

    #[tokio::test]
    async fn test_run_file_header_only_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "id;note\n").unwrap();

        let err = run_file(&input, id_set(), None, &BatchOptions::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }

    #[test]
    fn test_report_serializes_without_records() {
        let report = BatchReport {
            job_id: Uuid::new_v4(),
            mapping: "m".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            rows_read: 1,
            lines_written: 1,
            empty_fields: BTreeMap::new(),
            records: vec!["line".to_string()],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rowsRead"], 1);
        assert!(json.get("records").is_none());
    }
}
