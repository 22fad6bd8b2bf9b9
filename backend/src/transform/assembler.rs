//! Record assembly
//!
//! Builds one output line per input row from a [`MappingSet`]: every field is
//! computed by the engine, formatted, and placed according to the layout.

use serde::Serialize;
use std::collections::BTreeMap;

use super::dsl::{transform_field, MappingSet, OutputLayout};
use super::format::format_field;
use crate::models::Row;

/// Result of assembling a slice of rows
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    /// One output line per input row, in input order
    pub records: Vec<String>,
    /// Per target field, number of rows where the raw value was empty
    pub empty_fields: BTreeMap<String, usize>,
    /// Rows processed
    pub rows: usize,
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append another result (from the next chunk).
    pub fn merge(&mut self, other: ExecutionResult) {
        self.records.extend(other.records);
        self.rows += other.rows;
        for (field, count) in other.empty_fields {
            *self.empty_fields.entry(field).or_insert(0) += count;
        }
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        let empty: usize = self.empty_fields.values().sum();
        format!("Assembled: {} records from {} rows, {} empty values", self.records.len(), self.rows, empty)
    }
}

/// Assemble the output line for one row.
pub fn assemble(row: &Row, set: &MappingSet) -> String {
    let values: Vec<String> = set
        .fields
        .iter()
        .map(|field| format_field(&transform_field(row, field), field))
        .collect();
    render(set, &values)
}

/// Assemble every row, counting empty raw values per field.
pub fn execute(rows: &[Row], set: &MappingSet) -> ExecutionResult {
    let mut result = ExecutionResult::new();

    for row in rows {
        let mut values = Vec::with_capacity(set.fields.len());
        for field in &set.fields {
            let raw = transform_field(row, field);
            if raw.is_empty() {
                *result.empty_fields.entry(field.target_field.clone()).or_insert(0) += 1;
            }
            values.push(format_field(&raw, field));
        }
        result.records.push(render(set, &values));
        result.rows += 1;
    }

    result
}

/// Formatted values of each field for `row`, paired with their target names.
pub fn preview_row(row: &Row, set: &MappingSet) -> Vec<(String, String)> {
    set.fields
        .iter()
        .map(|field| (field.target_field.clone(), format_field(&transform_field(row, field), field)))
        .collect()
}

fn render(set: &MappingSet, values: &[String]) -> String {
    match &set.layout {
        OutputLayout::Delimited { delimiter } => values.join(delimiter),
        OutputLayout::Fixed => {
            let mut line: Vec<char> = Vec::new();
            let mut cursor = 0;
            for (field, value) in set.fields.iter().zip(values) {
                let start = if field.target_position > 0 { field.target_position - 1 } else { cursor };
                let chars: Vec<char> = value.chars().collect();
                let end = start + chars.len();
                if line.len() < end {
                    line.resize(end, ' ');
                }
                line[start..end].copy_from_slice(&chars);
                cursor = end;
            }
            line.into_iter().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dsl::{example_mapping_set, FieldMapping};

    fn fixed_set() -> MappingSet {
        MappingSet::new("fixed")
            .with_field(FieldMapping::constant("type", "H").at(1, 1))
            .with_field(FieldMapping::source("name", "name").at(3, 5))
            .with_field(FieldMapping::source("code", "code").at(0, 3))
    }

    #[test]
    fn test_fixed_layout_positions_and_gaps() {
        let row = Row::new().with("name", "Bob").with("code", "XY");
        assert_eq!(assemble(&row, &fixed_set()), "H Bob  XY ");
    }

    #[test]
    fn test_fixed_layout_overlap_overwrites() {
        let set = MappingSet::new("overlap")
            .with_field(FieldMapping::constant("a", "AAAA").at(1, 4))
            .with_field(FieldMapping::constant("b", "BB").at(3, 2));
        assert_eq!(assemble(&Row::new(), &set), "AABB");
    }

    #[test]
    fn test_delimited_layout() {
        let set = fixed_set().with_layout(OutputLayout::Delimited { delimiter: ",".to_string() });
        let row = Row::new().with("name", "Bob").with("code", "XY");
        assert_eq!(assemble(&row, &set), "H,Bob  ,XY ");
    }

    #[test]
    fn test_example_set_width() {
        let row = Row::new()
            .with("acct_no", "123")
            .with("first_name", "Jane")
            .with("last_name", "Doe")
            .with("acct_type", "CHK")
            .with("balance", "10")
            .with("pending", "2.5")
            .with("opened", "2023-01-31");
        let set = example_mapping_set();
        let line = assemble(&row, &set);
        assert_eq!(line.chars().count(), set.record_width());
        assert!(line.starts_with("D0000000123Jane Doe"));
        assert_eq!(&line[41..57], "CHECKING        ");
        assert_eq!(&line[57..69], "000000012.50");
        assert_eq!(&line[69..77], "20230131");
    }

    #[test]
    fn test_execute_counts_empty_values() {
        let rows = vec![Row::new().with("name", "Al"), Row::new()];
        let result = execute(&rows, &fixed_set());
        assert_eq!(result.rows, 2);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.empty_fields.get("code"), Some(&2));
        assert_eq!(result.empty_fields.get("name"), Some(&1));
        assert_eq!(result.empty_fields.get("type"), None);
    }

    #[test]
    fn test_merge_keeps_order() {
        let set = fixed_set();
        let mut first = execute(&[Row::new().with("name", "A")], &set);
        first.merge(execute(&[Row::new().with("name", "B")], &set));
        assert_eq!(first.rows, 2);
        assert!(first.records[0].contains('A'));
        assert!(first.records[1].contains('B'));
        assert_eq!(first.empty_fields.get("code"), Some(&2));
    }
}
