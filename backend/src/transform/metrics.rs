//! Derived metrics: fields the raw exports do not carry.
//!
//! - [`delivery_delay_days`] - Whole days between estimated and actual delivery
//! - [`order_success_group`] - Coarse delivered / not-delivered split
//! - [`per_order_aggregate`] - Per-order price / freight sums and item counts
//! - [`pearson_correlation`] - Pairwise-complete Pearson coefficient
//!
//! Every function returns a new table or value. Rows that lack the inputs a
//! metric needs are excluded from the result, never defaulted to zero.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{TableError, TableResult};
use crate::models::{columns, OrderStatusGroup, ReviewScore};
use crate::table::{as_f64, as_text, is_missing, number, Table};

use super::aggregate::{aggregate, Aggregation};
use super::join::{join, JoinSpec};

/// Decimal places kept for currency sums.
pub const MONEY_DECIMALS: i32 = 2;

/// Decimal places of a displayed correlation coefficient.
pub const CORRELATION_DECIMALS: i32 = 2;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // no negative zero in output
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

// =============================================================================
// Delivery delay
// =============================================================================

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp cell. Accepts `YYYY-MM-DD HH:MM:SS` (the export format),
/// ISO-8601 / RFC 3339 variants and bare dates (midnight).
pub fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    if is_missing(value) {
        return None;
    }
    let text = as_text(value)?;
    let text = text.trim();

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Whole days from `estimated` to `delivered`, rounded toward negative
/// infinity. Positive means late, negative means early.
pub fn delivery_delay_days(delivered: NaiveDateTime, estimated: NaiveDateTime) -> i64 {
    (delivered - estimated)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_DAY)
}

/// Delay for a pair of timestamp cells; `None` unless both parse.
pub fn delay_from_cells(delivered: &Value, estimated: &Value) -> Option<i64> {
    Some(delivery_delay_days(
        parse_timestamp(delivered)?,
        parse_timestamp(estimated)?,
    ))
}

/// Add a `delay` column (days) computed from the delivered and estimated
/// timestamps. Rows where either timestamp is missing or unparsable are
/// excluded from the result.
pub fn with_delivery_delay(table: &Table) -> TableResult<Table> {
    let delivered = table.require_column(columns::DELIVERED_AT)?;
    let estimated = table.require_column(columns::ESTIMATED_AT)?;

    let delays: Vec<Option<i64>> = table
        .rows()
        .iter()
        .map(|row| delay_from_cells(&row[delivered], &row[estimated]))
        .collect();

    let values = delays
        .iter()
        .map(|d| d.map_or(Value::Null, |d| json!(d)))
        .collect();

    table
        .with_column(columns::DELAY, values)?
        .drop_missing(Some(&[columns::DELAY]))
}

// =============================================================================
// Order success
// =============================================================================

/// `"success"` for the literal status `delivered`, `"not_success"` for every
/// other status, in-flight ones (`shipped`, `processing`) included.
pub fn order_success_group(status: &str) -> &'static str {
    OrderStatusGroup::classify(status).as_str()
}

/// Add an `order_status_group` column. A missing status is not `delivered`
/// and therefore groups as `not_success`.
pub fn with_order_status_group(table: &Table) -> TableResult<Table> {
    let status = table.require_column(columns::ORDER_STATUS)?;

    let values = table
        .rows()
        .iter()
        .map(|row| {
            let s = as_text(&row[status]).unwrap_or_default();
            json!(order_success_group(&s))
        })
        .collect();

    table.with_column(columns::ORDER_STATUS_GROUP, values)
}

// =============================================================================
// Per-order aggregates
// =============================================================================

/// What to compute per order from its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PerOrderMetric {
    /// Sum of a numeric item column, rounded to cents; output keeps the
    /// column's name.
    Sum { column: String },
    /// Number of line items, as `item_count`.
    ItemCount,
}

impl PerOrderMetric {
    pub fn total_price() -> Self {
        Self::Sum {
            column: columns::PRICE.to_string(),
        }
    }

    pub fn total_freight() -> Self {
        Self::Sum {
            column: columns::FREIGHT_VALUE.to_string(),
        }
    }

    /// Name of the column the metric adds.
    pub fn output_column(&self) -> &str {
        match self {
            Self::Sum { column } => column,
            Self::ItemCount => columns::ITEM_COUNT,
        }
    }
}

/// Group `items` by `order_id`, reduce with `metric`, and left-join the
/// result onto `orders`. Orders with no items keep a `null` metric.
pub fn per_order_aggregate(
    orders: &Table,
    items: &Table,
    metric: &PerOrderMetric,
) -> TableResult<Table> {
    let output = metric.output_column();
    let aggregation = match metric {
        PerOrderMetric::Sum { column } => Aggregation::sum(column),
        PerOrderMetric::ItemCount => Aggregation::size().named(output),
    };

    let mut per_order = aggregate(items, columns::ORDER_ID, &[aggregation])?;

    if matches!(metric, PerOrderMetric::Sum { .. }) {
        let idx = per_order.require_column(output)?;
        let rounded = per_order
            .rows()
            .iter()
            .map(|row| {
                as_f64(&row[idx]).map_or(Value::Null, |x| number(round_to(x, MONEY_DECIMALS)))
            })
            .collect();
        per_order = per_order.with_column(output, rounded)?;
    }

    let joined = join(orders, &per_order, &JoinSpec::left(columns::ORDER_ID))?;
    Ok(joined.into_table())
}

// =============================================================================
// Review scores
// =============================================================================

/// Check every present `review_score` lies in 1–5.
///
/// Missing scores pass (incomplete rows are dropped separately); anything
/// else outside the domain is a data-quality error.
pub fn validate_review_scores(table: &Table) -> TableResult<()> {
    let idx = table.require_column(columns::REVIEW_SCORE)?;

    for (r, row) in table.rows().iter().enumerate() {
        let cell = &row[idx];
        if is_missing(cell) {
            continue;
        }
        if as_f64(cell).and_then(ReviewScore::from_f64).is_none() {
            return Err(TableError::InvalidValue {
                dataset: table.name().to_string(),
                column: columns::REVIEW_SCORE.to_string(),
                row: r,
                value: as_text(cell).unwrap_or_default(),
                message: "review score must be between 1 and 5".to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Correlation
// =============================================================================

/// Why a correlation could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UndefinedReason {
    /// Fewer than two rows had both values present.
    InsufficientPairs { pairs: usize },
    /// Every remaining value of a column is identical.
    ZeroVariance { column: String },
}

/// A Pearson coefficient, or an explicit reason there is none.
///
/// `Undefined` is never collapsed into `0.0`: a real zero correlation and
/// "not enough data" stay distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Correlation {
    /// Coefficient rounded to two decimals.
    Defined { coefficient: f64 },
    Undefined { reason: UndefinedReason },
}

impl Correlation {
    pub fn coefficient(&self) -> Option<f64> {
        match self {
            Self::Defined { coefficient } => Some(*coefficient),
            Self::Undefined { .. } => None,
        }
    }
}

/// Pearson correlation over the positions where both `x` and `y` are
/// present, rounded to two decimals.
pub fn pearson_correlation(x: &[Option<f64>], y: &[Option<f64>]) -> Correlation {
    pearson_named(x, y, "x", "y")
}

fn pearson_named(
    x: &[Option<f64>],
    y: &[Option<f64>],
    x_name: &str,
    y_name: &str,
) -> Correlation {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();

    if pairs.len() < 2 {
        return Correlation::Undefined {
            reason: UndefinedReason::InsufficientPairs { pairs: pairs.len() },
        };
    }

    let (x0, y0) = pairs[0];
    if pairs.iter().all(|&(a, _)| a == x0) {
        return Correlation::Undefined {
            reason: UndefinedReason::ZeroVariance { column: x_name.to_string() },
        };
    }
    if pairs.iter().all(|&(_, b)| b == y0) {
        return Correlation::Undefined {
            reason: UndefinedReason::ZeroVariance { column: y_name.to_string() },
        };
    }

    // Scaled to [-1, 1] so squares of very large or very small values stay finite.
    let scale_x = pairs.iter().fold(0.0_f64, |m, p| m.max(p.0.abs()));
    let scale_y = pairs.iter().fold(0.0_f64, |m, p| m.max(p.1.abs()));
    let scaled: Vec<(f64, f64)> = pairs
        .iter()
        .map(|&(a, b)| (a / scale_x, b / scale_y))
        .collect();

    let n = scaled.len() as f64;
    let mean_x = scaled.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = scaled.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(a, b) in &scaled {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denominator = sxx.sqrt() * syy.sqrt();
    if !(denominator.is_finite() && denominator > 0.0) {
        let column = if sxx > 0.0 { y_name } else { x_name };
        return Correlation::Undefined {
            reason: UndefinedReason::ZeroVariance { column: column.to_string() },
        };
    }

    let r = (sxy / denominator).clamp(-1.0, 1.0);
    Correlation::Defined {
        coefficient: round_to(r, CORRELATION_DECIMALS),
    }
}

/// Pearson correlation between two numeric columns of a table.
pub fn column_correlation(table: &Table, x: &str, y: &str) -> TableResult<Correlation> {
    let xs = table.f64_column(x)?;
    let ys = table.f64_column(y)?;
    Ok(pearson_named(&xs, &ys, x, y))
}
