//! Delimited-text loader with encoding and delimiter auto-detection.
//!
//! Turns the raw bytes of a dataset export into header names plus rows of
//! JSON cells. Empty cells become `null` so that missing values stay
//! distinguishable from real text all the way through joins and reductions.

use serde_json::Value;
use std::path::Path;

use crate::error::TableResult;
use crate::table::Table;

/// CSV parsing error with its line
#[derive(Debug, Clone, PartialEq)]
pub struct CsvError {
    /// 1-based line in the file; 0 when the error is not tied to a line
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            0 => write!(f, "{}", self.message),
            line => write!(f, "Line {}: {}", line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line() as usize).unwrap_or(0);
        CsvError::new(line, err.to_string())
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Column headers, as written in the file
    pub headers: Vec<String>,
    /// Parsed rows, one cell per header
    pub rows: Vec<Vec<Value>>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

impl ParseResult {
    /// Wrap the parsed rows into a named table.
    pub fn into_table(self, name: impl Into<String>) -> TableResult<Table> {
        Table::from_rows(name, self.headers, self.rows)
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unknown: lossy so a stray byte never aborts a load
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
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
/// Quoted fields may contain the delimiter and line breaks. Every record must
/// have exactly one cell per header.
///
/// # Example
/// ```ignore
/// let parsed = parse_str("order_id,price\no1,10.5\no2,", ',')?;
/// assert_eq!(parsed.rows.len(), 2);
/// assert!(parsed.rows[1][1].is_null());
/// ```
pub fn parse_str(content: &str, delimiter: char) -> Result<ParseResult, CsvError> {
    parse_with_encoding(content, delimiter, "utf-8".to_string())
}

fn parse_with_encoding(
    content: &str,
    delimiter: char,
    encoding: String,
) -> Result<ParseResult, CsvError> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::new(0, format!("Unsupported delimiter '{}'", delimiter)));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

        // Blank lines come through as a single empty field
        if record.len() == 1 && record.get(0).is_some_and(str::is_empty) && headers.len() > 1 {
            continue;
        }

        if record.len() != headers.len() {
            return Err(CsvError::new(
                line,
                format!("Expected {} fields, found {}", headers.len(), record.len()),
            ));
        }

        let row = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                }
            })
            .collect();
        rows.push(row);
    }

    Ok(ParseResult {
        headers,
        rows,
        encoding,
        delimiter,
    })
}

/// Parse bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    parse_with_encoding(&content, delimiter, encoding)
}

/// Parse a file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file: {}", e)))?;

    parse_bytes_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let parsed = parse_str("order_id,price\no1,10.50\no2,25", ',').unwrap();

        assert_eq!(parsed.headers, vec!["order_id", "price"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0][0], "o1");
        assert_eq!(parsed.rows[0][1], "10.50");
        assert_eq!(parsed.rows[1][1], "25");
    }

    #[test]
    fn test_empty_cells_are_null() {
        let parsed = parse_str("a,b,c\n1,,3", ',').unwrap();

        assert_eq!(parsed.rows[0][0], "1");
        assert!(parsed.rows[0][1].is_null());
        assert_eq!(parsed.rows[0][2], "3");
    }

    #[test]
    fn test_quoted_fields_keep_delimiters_and_newlines() {
        let csv = "review_id,review_comment_message\nr1,\"bom, mas\nchegou tarde\"";
        let parsed = parse_str(csv, ',').unwrap();

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0][1], "bom, mas\nchegou tarde");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let parsed = parse_str("a,b\n1,2\n\n3,4\n", ',').unwrap();
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn test_ragged_row_is_an_error() {
        let err = parse_str("a,b\n1,2\n1,2,3", ',').unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("Expected 2 fields"));
    }

    #[test]
    fn test_empty_csv_error() {
        let err = parse_str("", ',').unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_error_message_format() {
        let err = parse_str("order_id,price\no1,10\no2\n", ',').unwrap_err();
        assert_eq!(err.to_string(), "Line 3: Expected 2 fields, found 1");

        let unread = parse_file_auto("/nonexistent/orders_dataset.csv").unwrap_err();
        assert!(unread.to_string().starts_with("Cannot read file"));
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
        let csv = "customer_id;customer_city\nc1;sao paulo\nc2;campinas";
        let result = parse_bytes_auto(csv.as_bytes()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.headers, vec!["customer_id", "customer_city"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "São" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0xE3, 0x6F];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "São");
    }

    #[test]
    fn test_duplicate_headers_rejected_by_table() {
        let parsed = parse_str("a,a\n1,2", ',').unwrap();
        assert!(parsed.into_table("dup").is_err());
    }

    #[test]
    fn test_into_table() {
        let table = parse_str("a,b\n1,2", ',').unwrap().into_table("fixture").unwrap();
        assert_eq!(table.name(), "fixture");
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.len(), 1);
    }
}
