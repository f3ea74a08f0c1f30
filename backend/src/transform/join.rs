//! Key joins between two tables.
//!
//! ```text
//!  left (orders)              right (reviews)            inner          left
//! ┌────┬───────────┐        ┌────┬───────┐          ┌────┬───┐     ┌────┬──────┐
//! │ o1 │ delivered │        │ o1 │ 2     │          │ o1 │ 2 │     │ o1 │ 2    │
//! │ o2 │ shipped   │        │ o9 │ 5     │          └────┴───┘     │ o2 │ null │
//! └────┴───────────┘        └────┴───────┘                         └────┴──────┘
//! ```
//!
//! The join kind is always explicit. Dropping rows whose right side came back
//! empty is a separate step ([`Table::drop_missing`]), never fused into the
//! join. Rows an inner join discards are counted in [`JoinOutcome`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::{JoinSide, TableError, TableResult};
use crate::table::{key_of, Table};

/// How unmatched left rows are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Keep only rows whose key matches on both sides.
    Inner,
    /// Keep every left row; right-side cells are `null` when nothing matches.
    Left,
}

/// Which columns to join on, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub left_key: String,
    pub right_key: String,
    pub kind: JoinKind,
}

impl JoinSpec {
    /// Join on differently named key columns.
    pub fn on(left_key: impl Into<String>, right_key: impl Into<String>, kind: JoinKind) -> Self {
        Self {
            left_key: left_key.into(),
            right_key: right_key.into(),
            kind,
        }
    }

    /// Inner join on a key column both tables share.
    pub fn inner(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::on(key.clone(), key, JoinKind::Inner)
    }

    /// Left join on a key column both tables share.
    pub fn left(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::on(key.clone(), key, JoinKind::Left)
    }

    fn shared_key(&self) -> bool {
        self.left_key == self.right_key
    }
}

/// A joined table plus how many left rows found no partner.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub table: Table,
    /// Left rows with no match on the right. Dropped for inner joins, kept
    /// with `null` right cells for left joins.
    pub unmatched_left: usize,
}

impl JoinOutcome {
    pub fn into_table(self) -> Table {
        self.table
    }
}

/// Join `left` and `right` according to `spec`.
///
/// Output rows follow left row order, and for each left row its matches in
/// right row order (a key matching several right rows yields several output
/// rows). Output columns are every left column followed by every right column
/// except a shared key. Other names present on both sides get `_x` / `_y`
/// suffixes. Missing keys never match.
pub fn join(left: &Table, right: &Table, spec: &JoinSpec) -> TableResult<JoinOutcome> {
    let left_key = left
        .column_index(&spec.left_key)
        .ok_or_else(|| TableError::JoinKeyMissing {
            dataset: left.name().to_string(),
            side: JoinSide::Left,
            column: spec.left_key.clone(),
        })?;
    let right_key = right
        .column_index(&spec.right_key)
        .ok_or_else(|| TableError::JoinKeyMissing {
            dataset: right.name().to_string(),
            side: JoinSide::Right,
            column: spec.right_key.clone(),
        })?;

    // Right columns carried into the output
    let right_cols: Vec<usize> = (0..right.width())
        .filter(|&i| !(spec.shared_key() && i == right_key))
        .collect();

    let left_names: HashSet<&str> = left.columns().iter().map(String::as_str).collect();
    let right_names: HashSet<&str> = right_cols
        .iter()
        .map(|&i| right.columns()[i].as_str())
        .collect();

    let mut columns: Vec<String> = left
        .columns()
        .iter()
        .map(|c| {
            if right_names.contains(c.as_str()) {
                format!("{}_x", c)
            } else {
                c.clone()
            }
        })
        .collect();
    columns.extend(right_cols.iter().map(|&i| {
        let c = &right.columns()[i];
        if left_names.contains(c.as_str()) {
            format!("{}_y", c)
        } else {
            c.clone()
        }
    }));

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        if let Some(key) = key_of(&row[right_key]) {
            index.entry(key).or_default().push(i);
        }
    }

    let mut rows = Vec::with_capacity(left.len());
    let mut unmatched_left = 0;

    for left_row in left.rows() {
        let matches = key_of(&left_row[left_key]).and_then(|k| index.get(&k));

        match matches {
            Some(matches) => {
                for &r in matches {
                    let right_row = &right.rows()[r];
                    let mut row = left_row.clone();
                    row.extend(right_cols.iter().map(|&i| right_row[i].clone()));
                    rows.push(row);
                }
            }
            None => {
                unmatched_left += 1;
                if spec.kind == JoinKind::Left {
                    let mut row = left_row.clone();
                    row.extend(std::iter::repeat(Value::Null).take(right_cols.len()));
                    rows.push(row);
                }
            }
        }
    }

    let name = format!("{}+{}", left.name(), right.name());
    Ok(JoinOutcome {
        table: Table::from_rows(name, columns, rows)?,
        unmatched_left,
    })
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
                vec![json!("o2"), json!("shipped")],
                vec![json!("o3"), json!("canceled")],
                vec![Value::Null, json!("created")],
            ],
        )
        .unwrap()
    }

    fn reviews() -> Table {
        Table::from_rows(
            "order_reviews",
            vec!["order_id", "review_score"],
            vec![
                vec![json!("o1"), json!("2")],
                vec![json!("o3"), json!("5")],
                vec![json!("o9"), json!("4")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_inner_join_keeps_only_matches() {
        let outcome = join(&orders(), &reviews(), &JoinSpec::inner("order_id")).unwrap();
        let table = &outcome.table;

        assert_eq!(table.columns(), ["order_id", "order_status", "review_score"]);
        assert_eq!(table.len(), 2);
        assert!(table.len() <= orders().len().min(reviews().len()));
        assert_eq!(table.rows()[0], vec![json!("o1"), json!("delivered"), json!("2")]);
        assert_eq!(table.rows()[1][0], "o3");
        assert_eq!(outcome.unmatched_left, 2);
    }

    #[test]
    fn test_left_join_preserves_left_rows() {
        let left = orders();
        let outcome = join(&left, &reviews(), &JoinSpec::left("order_id")).unwrap();
        let table = &outcome.table;

        assert_eq!(table.len(), left.len());
        assert!(table.rows()[1][2].is_null());
        assert!(table.rows()[3][2].is_null());
        assert_eq!(outcome.unmatched_left, 2);
    }

    #[test]
    fn test_join_and_filter_are_separate_steps() {
        let joined = join(&orders(), &reviews(), &JoinSpec::left("order_id"))
            .unwrap()
            .into_table();
        let filtered = joined.drop_missing(Some(&["review_score"])).unwrap();
        assert_eq!(joined.len(), 4);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_missing_key_is_format_error() {
        let err = join(&orders(), &reviews(), &JoinSpec::inner("customer_id")).unwrap_err();
        assert_eq!(
            err,
            TableError::JoinKeyMissing {
                dataset: "orders".into(),
                side: JoinSide::Left,
                column: "customer_id".into(),
            }
        );

        let spec = JoinSpec::on("order_id", "id", JoinKind::Inner);
        let err = join(&orders(), &reviews(), &spec).unwrap_err();
        assert!(matches!(err, TableError::JoinKeyMissing { side: JoinSide::Right, .. }));
    }

    #[test]
    fn test_differently_named_keys_keep_both_columns() {
        let customers = Table::from_rows(
            "customers",
            vec!["customer_id", "customer_zip_code_prefix"],
            vec![vec![json!("c1"), json!("01037")], vec![json!("c2"), json!("99999")]],
        )
        .unwrap();
        let geo = Table::from_rows(
            "geo",
            vec!["geolocation_zip_code_prefix", "geolocation_lat"],
            vec![vec![json!(1037), json!(-23.5)]],
        )
        .unwrap();

        let spec = JoinSpec::on(
            "customer_zip_code_prefix",
            "geolocation_zip_code_prefix",
            JoinKind::Left,
        );
        let table = join(&customers, &geo, &spec).unwrap().into_table();

        assert_eq!(table.width(), 4);
        assert_eq!(table.rows()[0][3], json!(-23.5));
        assert!(table.rows()[1][3].is_null());
    }

    #[test]
    fn test_overlapping_columns_are_suffixed() {
        let a = Table::from_rows("a", vec!["k", "v"], vec![vec![json!(1), json!("a")]]).unwrap();
        let b = Table::from_rows("b", vec!["k", "v"], vec![vec![json!(1), json!("b")]]).unwrap();

        let table = join(&a, &b, &JoinSpec::inner("k")).unwrap().into_table();
        assert_eq!(table.columns(), ["k", "v_x", "v_y"]);
    }

    #[test]
    fn test_duplicate_right_keys_fan_out() {
        let items = Table::from_rows(
            "items",
            vec!["order_id", "price"],
            vec![vec![json!("o1"), json!("10")], vec![json!("o1"), json!("20")]],
        )
        .unwrap();

        let table = join(&orders(), &items, &JoinSpec::inner("order_id")).unwrap().into_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1][2], "20");
    }
}
