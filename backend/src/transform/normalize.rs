//! Column-name normalization.
//!
//! Source exports disagree on header casing and spacing. Every table goes
//! through [`normalize`] before it is joined so joins can name columns
//! reliably.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::TableResult;
use crate::table::Table;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize a single column name: trim, lowercase, and replace each run of
/// internal whitespace with one underscore.
pub fn normalize_column_name(name: &str) -> String {
    WHITESPACE_RUN
        .replace_all(name.trim(), "_")
        .to_lowercase()
}

/// Normalize every column name of a table.
///
/// Row data, row count and column order are untouched. Fails with a
/// duplicate-column error when two headers collapse to the same name
/// (`"Order Id"` and `"order_id"`).
pub fn normalize(table: &Table) -> TableResult<Table> {
    table.map_columns(normalize_column_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableError;
    use serde_json::json;

    fn messy() -> Table {
        Table::from_rows(
            "products",
            vec!["  Product ID ", "Product\tCategory   Name", "price"],
            vec![
                vec![json!("p1"), json!("beleza_saude"), json!("10.0")],
                vec![json!("p2"), json!(null), json!("4.49")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("  Order ID "), "order_id");
        assert_eq!(normalize_column_name("Review   Score"), "review_score");
        assert_eq!(normalize_column_name("a\t b"), "a_b");
        assert_eq!(normalize_column_name("already_clean"), "already_clean");
    }

    #[test]
    fn test_normalize_preserves_shape_and_data() {
        let table = messy();
        let normalized = normalize(&table).unwrap();

        assert_eq!(
            normalized.columns(),
            ["product_id", "product_category_name", "price"]
        );
        assert_eq!(normalized.len(), table.len());
        assert_eq!(normalized.width(), table.width());
        assert_eq!(normalized.rows(), table.rows());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(&messy()).unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_collapsing_headers_is_a_format_error() {
        let table = Table::new("orders", vec!["Order Id", "order_id"]).unwrap();
        let err = normalize(&table).unwrap_err();
        assert!(matches!(
            err,
            TableError::DuplicateColumn { ref column, .. } if column == "order_id"
        ));
    }
}
