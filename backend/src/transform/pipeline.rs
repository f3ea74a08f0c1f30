//! Insight pipeline: the dashboard's analyses over the cached datasets.
//!
//! Every analysis reads its tables through the shared [`TableCache`],
//! normalizes column names, joins, derives metrics and returns a plain
//! serializable result. A format error aborts only the analysis it occurred
//! in; [`InsightPipeline::run_all`] records it in the report and moves on.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopsight::{Config, InsightPipeline, TableCache};
//! use std::sync::Arc;
//!
//! let config = Config::from_env()?;
//! let cache = Arc::new(TableCache::with_dir(&config.data_dir));
//! let report = InsightPipeline::new(cache, config).run_all();
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::logs::RunLog;
use crate::api::types::{InsightReport, Section};
use crate::cache::{TableCache, TableSource};
use crate::config::{Config, MAP_SAMPLE_SEED};
use crate::error::PipelineResult;
use crate::models::{columns, Dataset, OrderStatusGroup};
use crate::table::{as_f64, as_text, Table};
use crate::transform::aggregate::{
    aggregate, histogram, top_n, Aggregation, HistogramBin, RankedGroup, Reducer,
};
use crate::transform::capability::{first_present, require, Availability};
use crate::transform::join::{join, JoinKind, JoinSpec};
use crate::transform::metrics::{
    column_correlation, per_order_aggregate, round_to, validate_review_scores, with_delivery_delay,
    with_order_status_group, Correlation, PerOrderMetric, MONEY_DECIMALS,
};
use crate::transform::normalize::normalize;

/// Which delivery delays enter the delay/score correlation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayScope {
    /// Only `delay >= 0`; early deliveries are excluded.
    #[default]
    LateOrOnTime,
    /// Every order with a delay, early deliveries included.
    All,
}

impl DelayScope {
    fn admits(&self, delay: f64) -> bool {
        match self {
            Self::LateOrOnTime => delay >= 0.0,
            Self::All => true,
        }
    }
}

/// Payment value distribution and payment methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOverview {
    pub payments: usize,
    pub histogram: Vec<HistogramBin>,
    /// Payment count per `payment_type`, most used first.
    pub payment_types: Vec<RankedGroup>,
    /// `None` when no payment has an installment count.
    pub mean_installments: Option<f64>,
}

/// Delivery delay against review score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliverySatisfaction {
    pub scope: DelayScope,
    /// `order_id`, `delay`, `review_score` for every reviewed order kept.
    pub rows: Table,
    pub correlation: Correlation,
    /// Reviewed orders left out for a missing delay or score, or by scope.
    pub excluded: usize,
}

/// Best-selling product categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCategories {
    /// English category name and summed item price, highest first.
    pub ranking: Vec<RankedGroup>,
    /// Complete item rows the ranking was computed from.
    pub rows_used: usize,
}

/// Customer locations for the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerGeography {
    /// Sampled customers with coordinates.
    pub points: Table,
    pub customers: usize,
    /// Customers whose zip prefix has no known coordinates.
    pub without_coordinates: usize,
}

/// Per-order factors split by success group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStatusFactors {
    /// One row per order: status, group, total price, total freight, item count.
    pub orders: Table,
    /// Per group: order count and mean price, freight and item count.
    pub summary: Table,
    /// Products with the most line items on orders not delivered.
    pub top_failed_products: Vec<RankedGroup>,
}

/// Runs analyses against a shared table cache.
pub struct InsightPipeline<S: TableSource> {
    cache: Arc<TableCache<S>>,
    config: Config,
    log: RunLog,
}

impl<S: TableSource> InsightPipeline<S> {
    pub fn new(cache: Arc<TableCache<S>>, config: Config) -> Self {
        Self {
            cache,
            config,
            log: RunLog::new(),
        }
    }

    pub fn cache(&self) -> &TableCache<S> {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A dataset from the cache with normalized column names.
    fn table(&self, dataset: Dataset) -> PipelineResult<Table> {
        let cached = self.cache.is_loaded(dataset.name());
        let raw = self.cache.dataset(dataset)?;
        if !cached {
            self.log.note(format!(
                "Loaded '{}': {} rows, {} columns",
                dataset,
                raw.len(),
                raw.width()
            ));
        }
        Ok(normalize(&raw)?)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Histogram of `payment_value`, payments per type, mean installments.
    pub fn payment_overview(&self, bins: usize) -> PipelineResult<PaymentOverview> {
        self.log.info("💳 Payment overview...");
        let payments = self.table(Dataset::Payments)?;

        let values: Vec<f64> = payments
            .f64_column(columns::PAYMENT_VALUE)?
            .into_iter()
            .flatten()
            .collect();
        let payment_types = top_n(
            &payments,
            columns::PAYMENT_TYPE,
            None,
            Reducer::Size,
            usize::MAX,
        )?;

        let installments: Vec<f64> = payments
            .f64_column(columns::PAYMENT_INSTALLMENTS)?
            .into_iter()
            .flatten()
            .collect();
        let mean_installments = (!installments.is_empty())
            .then(|| installments.iter().sum::<f64>() / installments.len() as f64);

        self.log.success(format!(
            "{} payments, {} payment types",
            payments.len(),
            payment_types.len()
        ));

        Ok(PaymentOverview {
            payments: payments.len(),
            histogram: histogram(&values, bins),
            payment_types,
            mean_installments,
        })
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Delivery delay against review score, with their correlation.
    pub fn delivery_satisfaction(&self, scope: DelayScope) -> PipelineResult<DeliverySatisfaction> {
        self.log.info("🚚 Delivery delay vs review score...");
        let orders = self.table(Dataset::Orders)?;
        let reviews = self.table(Dataset::Reviews)?;

        let reviewed = self.join_logged(&orders, &reviews, &JoinSpec::inner(columns::ORDER_ID))?;

        let with_delay =
            with_delivery_delay(&reviewed)?.drop_missing(Some(&[columns::REVIEW_SCORE]))?;
        validate_review_scores(&with_delay)?;

        let delay_idx = with_delay.require_column(columns::DELAY)?;
        let in_scope = with_delay
            .filter_rows(|row| as_f64(&row[delay_idx]).is_some_and(|d| scope.admits(d)));

        let rows = in_scope
            .select(&[columns::ORDER_ID, columns::DELAY, columns::REVIEW_SCORE])?
            .renamed("delivery_satisfaction");
        let correlation = column_correlation(&rows, columns::DELAY, columns::REVIEW_SCORE)?;
        let excluded = reviewed.len() - rows.len();

        match correlation.coefficient() {
            Some(r) => self.log.success(format!(
                "{} reviewed orders, correlation {:.2}",
                rows.len(),
                r
            )),
            None => self.log.warning(format!(
                "{} reviewed orders, correlation undefined",
                rows.len()
            )),
        }
        if excluded > 0 {
            self.log.note(format!("{} reviewed orders excluded", excluded));
        }

        Ok(DeliverySatisfaction {
            scope,
            rows,
            correlation,
            excluded,
        })
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Items with their product and the order's review.
    fn reviewed_items(&self) -> PipelineResult<Table> {
        let items = self.table(Dataset::OrderItems)?;
        let products = self.table(Dataset::Products)?;
        let reviews = self.table(Dataset::Reviews)?;

        let with_products =
            self.join_logged(&items, &products, &JoinSpec::inner(columns::PRODUCT_ID))?;
        self.join_logged(&with_products, &reviews, &JoinSpec::inner(columns::ORDER_ID))
    }

    /// Top `n` English category names by summed item price.
    ///
    /// Rows with any missing cell are dropped before ranking.
    pub fn top_categories(&self, n: usize) -> PipelineResult<TopCategories> {
        self.log.info("📦 Top product categories...");
        let translations = self.table(Dataset::CategoryTranslation)?;

        let translated = self.join_logged(
            &self.reviewed_items()?,
            &translations,
            &JoinSpec::left(columns::CATEGORY_NAME),
        )?;
        let complete = translated.drop_missing(None)?;
        if complete.len() < translated.len() {
            self.log.note(format!(
                "{} incomplete rows dropped",
                translated.len() - complete.len()
            ));
        }

        let ranking = top_n(
            &complete,
            columns::CATEGORY_NAME_ENGLISH,
            Some(columns::PRICE),
            Reducer::Sum,
            n,
        )?
        .into_iter()
        .map(|g| RankedGroup {
            value: round_to(g.value, MONEY_DECIMALS),
            ..g
        })
        .collect::<Vec<_>>();

        self.log.success(format!("Ranked {} categories", ranking.len()));
        Ok(TopCategories {
            ranking,
            rows_used: complete.len(),
        })
    }

    /// Correlation of product description length with review score.
    ///
    /// Unavailable when the products export has no description length
    /// column under either spelling.
    pub fn description_length_vs_review(&self) -> PipelineResult<Availability<Correlation>> {
        self.log.info("📝 Description length vs review score...");
        let items = self.reviewed_items()?;

        let column = first_present(
            &items,
            &[columns::DESCRIPTION_LENGTH_EXPORT, columns::DESCRIPTION_LENGTH],
        );
        let outcome = match column {
            Availability::Available { result } => require(&items, &[columns::REVIEW_SCORE])
                .try_map(|()| column_correlation(&items, result, columns::REVIEW_SCORE))?,
            Availability::Unavailable { missing } => Availability::Unavailable { missing },
        };

        match &outcome {
            Availability::Available { result } => match result.coefficient() {
                Some(r) => self.log.success(format!("Correlation {:.2}", r)),
                None => self.log.warning("Correlation undefined"),
            },
            Availability::Unavailable { missing } => {
                self.log.warning(format!("Skipped, missing columns: {}", missing.join(", ")))
            }
        }
        Ok(outcome)
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Customers placed at their zip prefix centroid, sampled to at most
    /// `sample` points.
    pub fn customer_geography(&self, sample: usize) -> PipelineResult<CustomerGeography> {
        self.log.info("🗺️  Customer geography...");
        let customers = self.table(Dataset::Customers)?;
        let geolocation = self.table(Dataset::Geolocation)?;

        let centroids = aggregate(
            &geolocation,
            columns::GEO_ZIP,
            &[Aggregation::mean(columns::GEO_LAT), Aggregation::mean(columns::GEO_LNG)],
        )?;

        let located = self.join_logged(
            &customers,
            &centroids,
            &JoinSpec::on(columns::CUSTOMER_ZIP, columns::GEO_ZIP, JoinKind::Left),
        )?;
        let with_coordinates = located.drop_missing(Some(&[columns::GEO_LAT, columns::GEO_LNG]))?;
        let without_coordinates = located.len() - with_coordinates.len();
        if without_coordinates > 0 {
            self.log.warning(format!(
                "{} customers without coordinates dropped",
                without_coordinates
            ));
        }

        let points = with_coordinates
            .sample(sample, MAP_SAMPLE_SEED)
            .select(&[
                columns::CUSTOMER_ID,
                columns::CUSTOMER_CITY,
                columns::CUSTOMER_STATE,
                columns::GEO_LAT,
                columns::GEO_LNG,
            ])?
            .renamed("customer_geography");

        self.log.success(format!(
            "{} of {} customers plotted",
            points.len(),
            customers.len()
        ));
        Ok(CustomerGeography {
            points,
            customers: customers.len(),
            without_coordinates,
        })
    }

    // =========================================================================
    // Order status
    // =========================================================================

    /// Price, freight and item count per order by success group, and the
    /// products most often on orders that were not delivered.
    pub fn order_status_factors(&self, n: usize) -> PipelineResult<OrderStatusFactors> {
        self.log.info("📉 Order status factors...");
        let orders = self.table(Dataset::Orders)?;
        let items = self.table(Dataset::OrderItems)?;

        let mut per_order = orders.select(&[columns::ORDER_ID, columns::ORDER_STATUS])?;
        for metric in [
            PerOrderMetric::total_price(),
            PerOrderMetric::total_freight(),
            PerOrderMetric::ItemCount,
        ] {
            per_order = per_order_aggregate(&per_order, &items, &metric)?;
        }
        let per_order = with_order_status_group(&per_order)?.renamed("order_status_factors");

        let summary = aggregate(
            &per_order,
            columns::ORDER_STATUS_GROUP,
            &[
                Aggregation::size().named("orders"),
                Aggregation::mean(columns::PRICE).named("mean_price"),
                Aggregation::mean(columns::FREIGHT_VALUE).named("mean_freight_value"),
                Aggregation::mean(columns::ITEM_COUNT).named("mean_item_count"),
            ],
        )?;

        let statuses = orders.select(&[columns::ORDER_ID, columns::ORDER_STATUS])?;
        let item_status = with_order_status_group(&self.join_logged(
            &items,
            &statuses,
            &JoinSpec::left(columns::ORDER_ID),
        )?)?;
        let group_idx = item_status.require_column(columns::ORDER_STATUS_GROUP)?;
        let failed_items = item_status.filter_rows(|row| {
            as_text(&row[group_idx]).as_deref() == Some(OrderStatusGroup::NotSuccess.as_str())
        });
        let top_failed_products =
            top_n(&failed_items, columns::PRODUCT_ID, None, Reducer::Size, n)?;

        self.log.success(format!(
            "{} orders, {} items on undelivered orders",
            per_order.len(),
            failed_items.len()
        ));
        Ok(OrderStatusFactors {
            orders: per_order,
            summary,
            top_failed_products,
        })
    }

    // =========================================================================
    // Full report
    // =========================================================================

    /// Run every analysis with the configured parameters.
    ///
    /// A failed analysis is logged and recorded as a failed section; the
    /// others still run. Everything logged during the run is kept in the
    /// report.
    pub fn run_all(&self) -> InsightReport {
        let config = &self.config;
        let mut reader = self.log.subscribe();

        let payments = self.section(
            "payment_overview",
            self.payment_overview(config.histogram_bins),
        );
        let delivery = self.section(
            "delivery_satisfaction",
            self.delivery_satisfaction(DelayScope::default()),
        );
        let categories = self.section("top_categories", self.top_categories(config.top_n));
        let description_vs_review = self.section(
            "description_length_vs_review",
            self.description_length_vs_review(),
        );
        let geography = self.section(
            "customer_geography",
            self.customer_geography(config.map_sample),
        );
        let order_status = self.section(
            "order_status_factors",
            self.order_status_factors(config.top_n),
        );

        InsightReport {
            report_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            config: config.clone(),
            payments,
            delivery,
            categories,
            description_vs_review,
            geography,
            order_status,
            logs: reader.drain(),
        }
    }

    /// Join and log the left rows that found no partner.
    fn join_logged(&self, left: &Table, right: &Table, spec: &JoinSpec) -> PipelineResult<Table> {
        let outcome = join(left, right, spec)?;
        if outcome.unmatched_left > 0 {
            let (lost, verb) = match spec.kind {
                JoinKind::Inner => (true, "dropped"),
                JoinKind::Left => (false, "kept with empty values"),
            };
            let message = format!(
                "{} '{}' rows without a match in '{}' {}",
                outcome.unmatched_left,
                left.name(),
                right.name(),
                verb
            );
            if lost {
                self.log.warning(message);
            } else {
                self.log.note(message);
            }
        }
        Ok(outcome.into_table())
    }

    fn section<T>(&self, name: &str, result: PipelineResult<T>) -> Section<T> {
        match result {
            Ok(data) => Section::Ready { data },
            Err(e) => {
                self.log.error(format!("{} failed: {}", name, e));
                Section::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}
