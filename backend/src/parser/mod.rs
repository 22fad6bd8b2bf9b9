//! Input reader with encoding and delimiter auto-detection.
//!
//! Turns delimited text into ordered [`Row`]s. Cells are trimmed; an empty
//! cell is the empty string, never null. No mapping logic here.

use serde_json::Value;
use std::path::Path;

use crate::error::{InputError, InputResult};
use crate::models::{Row, Scalar};

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub rows: Vec<Row>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers, as written
    pub headers: Vec<String>,
}

impl ParseResult {
    /// Rows as JSON objects, for `etlmap parse`.
    pub fn to_json(&self) -> Vec<Value> {
        self.rows.iter().map(Row::to_json).collect()
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _confidence, _language) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the given encoding. Unknown encodings and invalid
/// UTF-8 fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let text = match encoding.to_lowercase().as_str() {
        // windows-1252 agrees with Latin-1 on every printable byte
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    // A UTF-8 byte-order mark would end up in the first header name
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

/// Detect the delimiter by counting occurrences in the header line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use etlmap::parser::parse_str;
///
/// let rows = parse_str("name;age\nAlice;30", ';').unwrap();
/// assert_eq!(rows[0].lookup("age").unwrap().to_string(), "30");
/// ```
pub fn parse_str(content: &str, delimiter: char) -> InputResult<Vec<Row>> {
    Ok(parse_with_metadata(content, delimiter, "utf-8".to_string())?.rows)
}

/// Parse a file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> InputResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> InputResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_with_metadata(&content, delimiter, encoding)
}

/// Parse decoded text and return rows with metadata.
pub fn parse_with_metadata(content: &str, delimiter: char, encoding: String) -> InputResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(InputError::EmptyFile);
    }
    if !delimiter.is_ascii() {
        return Err(InputError::InvalidDelimiter(delimiter));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(e, 1))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(InputError::NoHeaders);
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(e, idx + 2))?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), Some(Scalar::Text(record.get(i).unwrap_or("").to_string()))))
            .collect();
        rows.push(row);
    }

    Ok(ParseResult { rows, encoding, delimiter, headers })
}

/// Build rows from a JSON array of objects. `null` becomes an absent value.
pub fn rows_from_json(value: &Value) -> InputResult<Vec<Row>> {
    let items = value.as_array().ok_or(InputError::NotAnObject(0))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| Row::from_json(item).ok_or(InputError::NotAnObject(i)))
        .collect()
}

fn csv_error(err: csv::Error, fallback_line: usize) -> InputError {
    let line = err
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback_line);
    InputError::Parse { line, message: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(row: &Row, field: &str) -> String {
        row.lookup(field).map(|v| v.to_string()).unwrap_or_default()
    }

    #[test]
    fn test_simple_csv() {
        let rows = parse_str("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(text(&rows[0], "name"), "Alice");
        assert_eq!(text(&rows[0], "age"), "30");
        assert_eq!(text(&rows[1], "name"), "Bob");
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let csv = "name,comment\n\"Doe, Jane\",\"said \"\"hi\"\"\"";
        let rows = parse_str(csv, ',').unwrap();

        assert_eq!(text(&rows[0], "name"), "Doe, Jane");
        assert_eq!(text(&rows[0], "comment"), "said \"hi\"");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let rows = parse_str("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_missing_values_are_empty_not_null() {
        let rows = parse_str("a;b;c\n1;;3\n4", ';').unwrap();

        assert_eq!(rows[0].lookup("b"), Some(&Scalar::Text(String::new())));
        assert_eq!(text(&rows[1], "a"), "4");
        assert_eq!(rows[1].lookup("c"), Some(&Scalar::Text(String::new())));
    }

    #[test]
    fn test_cells_trimmed_and_order_kept() {
        let rows = parse_str("z , a\n  1 ,2  ", ',').unwrap();
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(text(&rows[0], "z"), "1");
        assert_eq!(text(&rows[0], "a"), "2");
    }

    #[test]
    fn test_extra_columns_ignored() {
        let rows = parse_str("a;b\n1;2;3;4", ';').unwrap();
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn test_empty_input_error() {
        assert!(matches!(parse_str("", ';'), Err(InputError::EmptyFile)));
        assert!(matches!(parse_str("a", 'é'), Err(InputError::InvalidDelimiter('é'))));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto(b"name,age\nAlice,30\nBob,25").unwrap();

        assert_eq!(result.delimiter, ',');
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.headers, vec!["name", "age"]);
        assert_eq!(result.to_json()[1], json!({"name": "Bob", "age": "25"}));
    }

    #[test]
    fn test_bom_stripped() {
        let result = parse_bytes_auto("\u{feff}id;v\n1;2".as_bytes()).unwrap();
        assert_eq!(result.headers[0], "id");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_latin1_currency_and_broken_bar() {
        // 0xA4 and 0xA6 differ between Latin-1 and Latin-9
        let bytes: &[u8] = &[0xA4, 0x20, 0xA6, 0x20, 0xBD];
        assert_eq!(decode_content(bytes, "ISO-8859-1"), "\u{a4} \u{a6} \u{bd}");
    }

    #[test]
    fn test_rows_from_json_null_is_absent() {
        let rows = rows_from_json(&json!([{"a": "x", "b": null, "n": 5}])).unwrap();
        assert_eq!(text(&rows[0], "a"), "x");
        assert!(rows[0].lookup("b").is_none());
        assert!(rows[0].contains("b"));
        assert_eq!(rows[0].lookup("n"), Some(&Scalar::Integer(5)));

        assert!(matches!(rows_from_json(&json!([{"a": 1}, 3])), Err(InputError::NotAnObject(1))));
        assert!(rows_from_json(&json!({"a": 1})).is_err());
    }
}
