//! Group-by / reduce and top-N rankings.
//!
//! ```text
//! category   price          category   price
//! ┌────────┬──────┐         ┌────────┬──────┐
//! │ toys   │ 10   │   sum   │ toys   │ 35   │
//! │ beauty │ 80   │  ────▶  │ beauty │ 80   │
//! │ toys   │ 25   │         └────────┴──────┘
//! └────────┴──────┘
//! ```
//!
//! Groups come out in first-seen key order. Rows with a missing key belong to
//! no group.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{TableError, TableResult};
use crate::table::{as_f64, as_text, is_missing, key_of, number, Table};

/// How a group's values collapse to one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    /// Sum of present values; `0` when none are present.
    Sum,
    /// Mean of present values; `null` when none are present.
    Mean,
    /// Number of present (non-missing) values.
    Count,
    /// Number of rows in the group, missing values included.
    Size,
}

/// One output column of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Input column; ignored by [`Reducer::Size`].
    pub column: Option<String>,
    pub reducer: Reducer,
    /// Output column name.
    pub output: String,
}

impl Aggregation {
    fn over(column: &str, reducer: Reducer) -> Self {
        Self {
            column: Some(column.to_string()),
            reducer,
            output: column.to_string(),
        }
    }

    pub fn sum(column: &str) -> Self {
        Self::over(column, Reducer::Sum)
    }

    pub fn mean(column: &str) -> Self {
        Self::over(column, Reducer::Mean)
    }

    pub fn count(column: &str) -> Self {
        Self::over(column, Reducer::Count)
    }

    pub fn size() -> Self {
        Self {
            column: None,
            reducer: Reducer::Size,
            output: "size".to_string(),
        }
    }

    /// Rename the output column.
    pub fn named(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

/// A group key and its reduced value, as ranked by [`top_n`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedGroup {
    pub key: String,
    pub value: f64,
}

struct Group {
    key_cell: Value,
    rows: Vec<usize>,
}

fn partition(table: &Table, key_idx: usize) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (i, row) in table.rows().iter().enumerate() {
        let Some(key) = key_of(&row[key_idx]) else {
            continue;
        };
        let pos = *positions.entry(key).or_insert_with(|| {
            groups.push(Group {
                key_cell: row[key_idx].clone(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[pos].rows.push(i);
    }

    groups
}

fn reduce(
    table: &Table,
    rows: &[usize],
    column: Option<(usize, &str)>,
    reducer: Reducer,
) -> TableResult<Value> {
    if reducer == Reducer::Size {
        return Ok(json!(rows.len()));
    }

    let Some((idx, name)) = column else {
        return Ok(Value::Null);
    };

    let present = rows
        .iter()
        .map(|&r| (r, &table.rows()[r][idx]))
        .filter(|(_, v)| !is_missing(v));

    if reducer == Reducer::Count {
        return Ok(json!(present.count()));
    }

    let mut total = 0.0;
    let mut n = 0usize;
    for (r, cell) in present {
        let x = as_f64(cell).ok_or_else(|| TableError::InvalidValue {
            dataset: table.name().to_string(),
            column: name.to_string(),
            row: r,
            value: as_text(cell).unwrap_or_default(),
            message: "expected a number".to_string(),
        })?;
        total += x;
        n += 1;
    }

    Ok(match reducer {
        Reducer::Mean if n == 0 => Value::Null,
        Reducer::Mean => number(total / n as f64),
        _ => number(total),
    })
}

/// Group `table` by `key` and compute every aggregation per group.
///
/// The result has the key column followed by one column per aggregation,
/// one row per distinct key, in first-seen key order. Sum and mean fail on
/// a present cell that is not a number.
pub fn aggregate(table: &Table, key: &str, aggregations: &[Aggregation]) -> TableResult<Table> {
    let key_idx = table.require_column(key)?;

    let inputs = aggregations
        .iter()
        .map(|agg| match (&agg.column, agg.reducer) {
            (_, Reducer::Size) => Ok(None),
            (Some(col), _) => table.require_column(col).map(|i| Some((i, col.as_str()))),
            (None, reducer) => Err(TableError::MissingColumn {
                dataset: table.name().to_string(),
                column: format!("<input for {:?} into '{}'>", reducer, agg.output),
            }),
        })
        .collect::<TableResult<Vec<_>>>()?;

    let mut columns = vec![key.to_string()];
    columns.extend(aggregations.iter().map(|a| a.output.clone()));

    let mut rows = Vec::new();
    for group in partition(table, key_idx) {
        let mut row = vec![group.key_cell];
        for (agg, input) in aggregations.iter().zip(&inputs) {
            row.push(reduce(table, &group.rows, *input, agg.reducer)?);
        }
        rows.push(row);
    }

    Table::from_rows(table.name(), columns, rows)
}

/// Group by one key with a single reducer.
///
/// `value` is the input column (ignored for [`Reducer::Size`]); the output
/// column is named `output`.
pub fn group_by(
    table: &Table,
    key: &str,
    value: Option<&str>,
    reducer: Reducer,
    output: &str,
) -> TableResult<Table> {
    let aggregation = Aggregation {
        column: value.map(str::to_string),
        reducer,
        output: output.to_string(),
    };
    aggregate(table, key, &[aggregation])
}

/// Group, reduce, sort descending by the reduced value and keep the first `n`.
///
/// The sort is stable: tied groups keep first-seen order. Fewer than `n`
/// groups returns all of them; groups whose reduced value is `null` (a mean
/// over no values) are left out.
pub fn top_n(
    table: &Table,
    key: &str,
    value: Option<&str>,
    reducer: Reducer,
    n: usize,
) -> TableResult<Vec<RankedGroup>> {
    let output = if key == "value" { "reduced_value" } else { "value" };
    let grouped = group_by(table, key, value, reducer, output)?;

    let mut ranked: Vec<RankedGroup> = grouped
        .rows()
        .iter()
        .filter_map(|row| {
            Some(RankedGroup {
                key: as_text(&row[0])?,
                value: as_f64(&row[1])?,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(n);
    Ok(ranked)
}

/// One bar of a [`histogram`]: values in `[lower, upper)`, the last bin
/// closed on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram over the range of `values`.
///
/// No values (or zero bins) gives no bins; a single distinct value gives one
/// zero-width bin holding everything.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Table {
        Table::from_rows(
            "sales",
            vec!["group", "value"],
            vec![
                vec![json!("A"), json!("50")],
                vec![json!("B"), json!("30")],
                vec![json!("C"), json!("30")],
                vec![json!("D"), json!("80")],
                vec![json!("B"), json!("50")],
                vec![Value::Null, json!("999")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_group_sum_first_seen_order() {
        let table = group_by(&sales(), "group", Some("value"), Reducer::Sum, "total").unwrap();

        assert_eq!(table.columns(), ["group", "total"]);
        let keys: Vec<_> = table.rows().iter().map(|r| r[0].clone()).collect();
        assert_eq!(keys, vec![json!("A"), json!("B"), json!("C"), json!("D")]);
        assert_eq!(table.rows()[1][1], json!(80.0));
    }

    #[test]
    fn test_top_n_ties_keep_first_seen_group() {
        // totals {A:50, B:80, C:30, D:80}
        let top = top_n(&sales(), "group", Some("value"), Reducer::Sum, 2).unwrap();

        assert_eq!(
            top,
            vec![
                RankedGroup { key: "B".into(), value: 80.0 },
                RankedGroup { key: "D".into(), value: 80.0 },
            ]
        );
    }

    #[test]
    fn test_top_n_fewer_groups_than_requested() {
        let top = top_n(&sales(), "group", Some("value"), Reducer::Sum, 10).unwrap();
        assert_eq!(top.len(), 4);
        assert_eq!(top[3].key, "C");

        let empty = Table::new("empty", vec!["group", "value"]).unwrap();
        assert!(top_n(&empty, "group", Some("value"), Reducer::Sum, 3).unwrap().is_empty());
    }

    #[test]
    fn test_size_counts_rows() {
        let top = top_n(&sales(), "group", None, Reducer::Size, 1).unwrap();
        assert_eq!(top, vec![RankedGroup { key: "B".into(), value: 2.0 }]);
    }

    #[test]
    fn test_count_skips_missing_values() {
        let table = Table::from_rows(
            "t",
            vec!["k", "v"],
            vec![vec![json!("a"), json!("1")], vec![json!("a"), Value::Null]],
        )
        .unwrap();

        let out = aggregate(
            &table,
            "k",
            &[
                Aggregation::count("v").named("present"),
                Aggregation::size().named("rows"),
                Aggregation::mean("v").named("mean"),
            ],
        )
        .unwrap();
        assert_eq!(out.columns(), ["k", "present", "rows", "mean"]);
        assert_eq!(out.rows()[0][1], json!(1));
        assert_eq!(out.rows()[0][2], json!(2));
        assert_eq!(out.rows()[0][3], json!(1.0));
    }

    #[test]
    fn test_mean_geolocation_centroid() {
        let geo = Table::from_rows(
            "geolocation",
            vec!["zip", "lat", "lng"],
            vec![
                vec![json!("01037"), json!("-23.0"), json!("-46.0")],
                vec![json!("01037"), json!("-24.0"), json!("-47.0")],
                vec![json!("02000"), json!("-10.0"), Value::Null],
            ],
        )
        .unwrap();

        let centroids = aggregate(
            &geo,
            "zip",
            &[Aggregation::mean("lat"), Aggregation::mean("lng")],
        )
        .unwrap();

        assert_eq!(centroids.len(), 2);
        assert_eq!(centroids.rows()[0][1], json!(-23.5));
        assert_eq!(centroids.rows()[0][2], json!(-46.5));
        assert!(centroids.rows()[1][2].is_null());
    }

    #[test]
    fn test_non_numeric_sum_is_error() {
        let table =
            Table::from_rows("t", vec!["k", "v"], vec![vec![json!("a"), json!("ten")]]).unwrap();
        let err = group_by(&table, "k", Some("v"), Reducer::Sum, "v").unwrap_err();
        assert!(matches!(err, TableError::InvalidValue { ref value, .. } if value == "ten"));
    }

    #[test]
    fn test_histogram_bins() {
        let values = [0.0, 1.0, 2.0, 3.0, 10.0];
        let bins = histogram(&values, 5);

        assert_eq!(bins.len(), 5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(bins[0].count, 2); // [0, 2)
        assert_eq!(bins[1].count, 2); // [2, 4)
        assert_eq!(bins[4].count, 1); // max lands in the last bin
        assert_eq!(bins[4].upper, 10.0);
    }

    #[test]
    fn test_histogram_degenerate() {
        assert!(histogram(&[], 30).is_empty());
        assert_eq!(
            histogram(&[7.0, 7.0], 30),
            vec![HistogramBin { lower: 7.0, upper: 7.0, count: 2 }]
        );
    }

    #[test]
    fn test_missing_group_key_column() {
        let err = group_by(&sales(), "category", Some("value"), Reducer::Sum, "v").unwrap_err();
        assert!(matches!(err, TableError::MissingColumn { .. }));
    }
}
