//! Report types for the presentation layer.
//!
//! The report is the only thing written to stdout. Each analysis is a
//! [`Section`] so a chart whose analysis failed can show the error instead
//! of partial data.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::logs::LogEntry;
use crate::config::Config;
use crate::transform::capability::Availability;
use crate::transform::metrics::Correlation;
use crate::transform::pipeline::{
    CustomerGeography, DeliverySatisfaction, OrderStatusFactors, PaymentOverview, TopCategories,
};

/// Outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Ready { data: T },
    Failed { error: String },
}

impl<T> Section<T> {
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ready { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }
}

/// Every analysis of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    /// Unique run identifier
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    /// Settings the run used
    pub config: Config,

    pub payments: Section<PaymentOverview>,
    pub delivery: Section<DeliverySatisfaction>,
    pub categories: Section<TopCategories>,
    pub description_vs_review: Section<Availability<Correlation>>,
    pub geography: Section<CustomerGeography>,
    pub order_status: Section<OrderStatusFactors>,

    /// Progress and data-quality notes logged during the run, in order
    pub logs: Vec<LogEntry>,
}

impl InsightReport {
    /// Names and errors of the sections that failed, in report order.
    pub fn failed_sections(&self) -> Vec<(&'static str, &str)> {
        [
            ("payments", self.payments.error()),
            ("delivery", self.delivery.error()),
            ("categories", self.categories.error()),
            ("description_vs_review", self.description_vs_review.error()),
            ("geography", self.geography.error()),
            ("order_status", self.order_status.error()),
        ]
        .into_iter()
        .filter_map(|(name, error)| Some((name, error?)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_serialization() {
        let ready: Section<u32> = Section::Ready { data: 7 };
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["data"], 7);

        let failed: Section<u32> = Section::Failed {
            error: "Table error: Missing column 'price' in 'order_items'".into(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(failed.error().unwrap().contains("price"));
        assert!(ready.error().is_none());
    }
}
