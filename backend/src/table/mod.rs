//! In-memory tables.
//!
//! A [`Table`] is an ordered list of column names plus rows of JSON cells.
//! `null` marks a missing value; everything loaded from disk is text until an
//! operation reads it as a number, and derived columns are written as JSON
//! numbers. Tables are never mutated in place by the pipeline: every
//! operation returns a new table and leaves its input untouched.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::{TableError, TableResult};

/// An ordered collection of rows sharing a fixed column schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new<S: Into<String>>(name: impl Into<String>, columns: Vec<S>) -> TableResult<Self> {
        Self::from_rows(name, columns, Vec::new())
    }

    /// Create a table from rows, checking the schema and every row's arity.
    pub fn from_rows<S: Into<String>>(
        name: impl Into<String>,
        columns: Vec<S>,
        rows: Vec<Vec<Value>>,
    ) -> TableResult<Self> {
        let name = name.into();
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn {
                    dataset: name,
                    column: column.clone(),
                });
            }
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RowArity {
                    dataset: name,
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }

        Ok(Self { name, columns, rows })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same table under another name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Index of a column the caller cannot proceed without.
    pub fn require_column(&self, column: &str) -> TableResult<usize> {
        self.column_index(column)
            .ok_or_else(|| TableError::MissingColumn {
                dataset: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Columns from `wanted` that this table lacks, in the order asked.
    pub fn missing_columns(&self, wanted: &[&str]) -> Vec<String> {
        wanted
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Cell at `row` in `column`; `None` when either is out of range.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Cell at `row` in `column` read as a number.
    pub fn f64_at(&self, row: usize, column: &str) -> Option<f64> {
        self.value(row, column).and_then(as_f64)
    }

    /// All cells of a column, in row order.
    pub fn column_values(&self, column: &str) -> TableResult<Vec<&Value>> {
        let idx = self.require_column(column)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// A column read as numbers; missing or non-numeric cells are `None`.
    pub fn f64_column(&self, column: &str) -> TableResult<Vec<Option<f64>>> {
        Ok(self.column_values(column)?.into_iter().map(as_f64).collect())
    }

    /// Keep only the named columns, in the order given.
    pub fn select(&self, columns: &[&str]) -> TableResult<Table> {
        let indices = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<TableResult<Vec<_>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Table::from_rows(self.name.clone(), columns.to_vec(), rows)
    }

    /// Keep the rows for which `keep` returns true.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Drop rows with a missing cell in `subset`, or in any column when
    /// `subset` is `None`.
    pub fn drop_missing(&self, subset: Option<&[&str]>) -> TableResult<Table> {
        let indices: Vec<usize> = match subset {
            Some(cols) => cols
                .iter()
                .map(|c| self.require_column(c))
                .collect::<TableResult<_>>()?,
            None => (0..self.columns.len()).collect(),
        };

        Ok(self.filter_rows(|row| indices.iter().all(|&i| !is_missing(&row[i]))))
    }

    /// New table with `column` set to `values`.
    ///
    /// An existing column of that name is replaced in place; otherwise the
    /// column is appended.
    pub fn with_column(&self, column: &str, values: Vec<Value>) -> TableResult<Table> {
        if values.len() != self.rows.len() {
            return Err(TableError::RowArity {
                dataset: self.name.clone(),
                row: values.len().min(self.rows.len()),
                expected: self.rows.len(),
                found: values.len(),
            });
        }

        let mut table = self.clone();
        match table.column_index(column) {
            Some(idx) => {
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                table.columns.push(column.to_string());
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(table)
    }

    /// New table with its columns renamed by `rename`.
    pub fn map_columns<F>(&self, rename: F) -> TableResult<Table>
    where
        F: Fn(&str) -> String,
    {
        let columns: Vec<String> = self.columns.iter().map(|c| rename(c)).collect();
        Table::from_rows(self.name.clone(), columns, self.rows.clone())
    }

    /// Deterministic random sample of at most `n` rows, kept in table order.
    pub fn sample(&self, n: usize, seed: u64) -> Table {
        if n >= self.rows.len() {
            return self.clone();
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut picked = rand::seq::index::sample(&mut rng, self.rows.len(), n).into_vec();
        picked.sort_unstable();

        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: picked.into_iter().map(|i| self.rows[i].clone()).collect(),
        }
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

// =============================================================================
// Cell helpers
// =============================================================================

/// Whether a cell counts as missing.
pub fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Read a cell as a finite number.
pub fn as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Read a cell as text. Numbers and booleans are rendered.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JSON cell for a number; non-finite values become `null`.
pub fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Canonical form of a join or group key.
///
/// Text is trimmed, and integer-looking text compares by integer value so
/// that `"01037"` and `"1037"` name the same zip prefix. Missing cells have
/// no key and never match anything.
pub fn key_of(value: &Value) -> Option<String> {
    if is_missing(value) {
        return None;
    }
    let text = as_text(value)?;
    let text = text.trim();
    match text.parse::<i64>() {
        Ok(n) => Some(n.to_string()),
        Err(_) => Some(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> Table {
        Table::from_rows(
            "orders",
            vec!["order_id", "order_status"],
            vec![
                vec![json!("o1"), json!("delivered")],
                vec![json!("o2"), Value::Null],
                vec![json!("o3"), json!("shipped")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Table::from_rows("t", vec!["a", "b"], vec![vec![json!(1)]]).unwrap_err();
        assert!(matches!(err, TableError::RowArity { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_require_column_names_dataset() {
        let err = orders().require_column("price").unwrap_err();
        assert_eq!(
            err,
            TableError::MissingColumn {
                dataset: "orders".into(),
                column: "price".into()
            }
        );
    }

    #[test]
    fn test_drop_missing_subset() {
        let table = orders();
        let kept = table.drop_missing(Some(&["order_status"])).unwrap();
        assert_eq!(kept.len(), 2);
        // input untouched
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_with_column_appends_then_replaces() {
        let table = orders();
        let added = table
            .with_column("flag", vec![json!(1), json!(2), json!(3)])
            .unwrap();
        assert_eq!(added.columns(), ["order_id", "order_status", "flag"]);

        let replaced = added
            .with_column("order_status", vec![json!("a"), json!("b"), json!("c")])
            .unwrap();
        assert_eq!(replaced.width(), 3);
        assert_eq!(replaced.rows()[1][1], "b");
    }

    #[test]
    fn test_with_column_length_mismatch() {
        assert!(orders().with_column("flag", vec![json!(1)]).is_err());
    }

    #[test]
    fn test_value_lookup() {
        let t = Table::from_rows(
            "payments",
            vec!["payment_type", "payment_value"],
            vec![vec![json!("boleto"), json!("39.99")], vec![json!("voucher"), Value::Null]],
        )
        .unwrap();

        assert_eq!(t.value(0, "payment_type"), Some(&json!("boleto")));
        assert_eq!(t.f64_at(0, "payment_value"), Some(39.99));
        assert_eq!(t.f64_at(1, "payment_value"), None);
        assert_eq!(t.value(2, "payment_type"), None);
        assert_eq!(t.value(0, "payment_sequential"), None);
    }

    #[test]
    fn test_select_orders_columns() {
        let selected = orders().select(&["order_status", "order_id"]).unwrap();
        assert_eq!(selected.columns(), ["order_status", "order_id"]);
        assert_eq!(selected.rows()[0][1], "o1");
    }

    #[test]
    fn test_sample_is_deterministic() {
        let rows = (0..100).map(|i| vec![json!(i)]).collect();
        let table = Table::from_rows("n", vec!["n"], rows).unwrap();

        let a = table.sample(10, 42);
        let b = table.sample(10, 42);
        assert_eq!(a.len(), 10);
        assert_eq!(a, b);
        assert_eq!(table.sample(500, 42).len(), 100);
    }

    #[test]
    fn test_cell_helpers() {
        assert_eq!(as_f64(&json!("25.50")), Some(25.5));
        assert_eq!(as_f64(&json!(3)), Some(3.0));
        assert_eq!(as_f64(&json!("abc")), None);
        assert_eq!(as_f64(&json!("NaN")), None);
        assert!(is_missing(&Value::Null));
        assert!(number(f64::NAN).is_null());
    }

    #[test]
    fn test_key_canonical_form() {
        assert_eq!(key_of(&json!("01037")), key_of(&json!(1037)));
        assert_eq!(key_of(&json!(" o1 ")), Some("o1".to_string()));
        assert_eq!(key_of(&Value::Null), None);
    }

    #[test]
    fn test_to_records() {
        let records = orders().to_records();
        assert_eq!(records[0]["order_id"], "o1");
        assert!(records[1]["order_status"].is_null());
    }
}
