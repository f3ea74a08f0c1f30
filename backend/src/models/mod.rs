//! Domain models for the insight pipeline.
//!
//! - [`Dataset`] - The eight source tables and their export file names
//! - [`ReviewScore`] - A validated 1–5 star review score
//! - [`OrderStatusGroup`] - Coarse success / not-success order classification
//! - [`columns`] - Well-known column names, raw and derived

use serde::{Deserialize, Serialize};

// =============================================================================
// Datasets
// =============================================================================

/// One of the source tables of the marketplace export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// One row per purchase order.
    Orders,
    /// One row per line item of an order.
    OrderItems,
    /// One row per payment (several per order possible).
    Payments,
    /// One row per order review.
    Reviews,
    /// Product catalog.
    Products,
    /// Customer records.
    Customers,
    /// Raw zip-prefix coordinates (many rows per prefix).
    Geolocation,
    /// Native → English product category names.
    CategoryTranslation,
}

impl Dataset {
    /// Every dataset, in load order.
    pub const ALL: [Dataset; 8] = [
        Dataset::Orders,
        Dataset::OrderItems,
        Dataset::Payments,
        Dataset::Reviews,
        Dataset::Products,
        Dataset::Customers,
        Dataset::Geolocation,
        Dataset::CategoryTranslation,
    ];

    /// File name of the export on disk.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Orders => "orders_dataset.csv",
            Self::OrderItems => "order_items_dataset.csv",
            Self::Payments => "order_payments_dataset.csv",
            Self::Reviews => "order_reviews_dataset.csv",
            Self::Products => "products_dataset.csv",
            Self::Customers => "customers_dataset.csv",
            Self::Geolocation => "geolocation_dataset.csv",
            Self::CategoryTranslation => "product_category_name_translation.csv",
        }
    }

    /// Short name used as the table name and cache key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::OrderItems => "order_items",
            Self::Payments => "order_payments",
            Self::Reviews => "order_reviews",
            Self::Products => "products",
            Self::Customers => "customers",
            Self::Geolocation => "geolocation",
            Self::CategoryTranslation => "category_translation",
        }
    }

    /// Look a dataset up by short name or file name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.name() == name || d.file_name() == name)
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Review Score
// =============================================================================

/// A review score, categorical over 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ReviewScore(u8);

impl ReviewScore {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(score: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&score).then_some(Self(score))
    }

    /// Parse a cell such as `"4"` or `4.0`. Fractional or out-of-range
    /// values are rejected.
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.fract() != 0.0 || !(1.0..=5.0).contains(&value) {
            return None;
        }
        Self::new(value as u8)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ReviewScore {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
            .ok_or_else(|| format!("review score must be between 1 and 5, got {}", value))
    }
}

impl From<ReviewScore> for u8 {
    fn from(score: ReviewScore) -> Self {
        score.0
    }
}

// =============================================================================
// Order Status Group
// =============================================================================

/// Binary order outcome used by the order-failure analyses.
///
/// Only the literal status `delivered` counts as success. In-flight statuses
/// such as `shipped` or `processing` land in [`OrderStatusGroup::NotSuccess`]
/// together with real failures like `canceled`; this conflation is a known
/// data-quality caveat and is kept deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusGroup {
    Success,
    NotSuccess,
}

impl OrderStatusGroup {
    /// Status string that marks a successful order.
    pub const SUCCESS_STATUS: &'static str = "delivered";

    pub fn classify(status: &str) -> Self {
        if status == Self::SUCCESS_STATUS {
            Self::Success
        } else {
            Self::NotSuccess
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotSuccess => "not_success",
        }
    }
}

impl std::fmt::Display for OrderStatusGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Column names
// =============================================================================

/// Column names after normalization.
pub mod columns {
    pub const ORDER_ID: &str = "order_id";
    pub const ORDER_STATUS: &str = "order_status";
    pub const DELIVERED_AT: &str = "order_delivered_customer_date";
    pub const ESTIMATED_AT: &str = "order_estimated_delivery_date";

    pub const PRODUCT_ID: &str = "product_id";
    pub const PRICE: &str = "price";
    pub const FREIGHT_VALUE: &str = "freight_value";

    pub const PAYMENT_TYPE: &str = "payment_type";
    pub const PAYMENT_VALUE: &str = "payment_value";
    pub const PAYMENT_INSTALLMENTS: &str = "payment_installments";

    pub const REVIEW_SCORE: &str = "review_score";

    pub const CATEGORY_NAME: &str = "product_category_name";
    pub const CATEGORY_NAME_ENGLISH: &str = "product_category_name_english";
    /// Spelled this way in the marketplace export.
    pub const DESCRIPTION_LENGTH_EXPORT: &str = "product_description_lenght";
    pub const DESCRIPTION_LENGTH: &str = "product_description_length";

    pub const CUSTOMER_ID: &str = "customer_id";
    pub const CUSTOMER_CITY: &str = "customer_city";
    pub const CUSTOMER_STATE: &str = "customer_state";
    pub const CUSTOMER_ZIP: &str = "customer_zip_code_prefix";

    pub const GEO_ZIP: &str = "geolocation_zip_code_prefix";
    pub const GEO_LAT: &str = "geolocation_lat";
    pub const GEO_LNG: &str = "geolocation_lng";

    // Derived
    pub const DELAY: &str = "delay";
    pub const ORDER_STATUS_GROUP: &str = "order_status_group";
    pub const ITEM_COUNT: &str = "item_count";
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_lookup() {
        assert_eq!(Dataset::from_name("orders"), Some(Dataset::Orders));
        assert_eq!(
            Dataset::from_name("product_category_name_translation.csv"),
            Some(Dataset::CategoryTranslation)
        );
        assert_eq!(Dataset::from_name("sellers"), None);
    }

    #[test]
    fn test_dataset_names_unique() {
        let mut names: Vec<_> = Dataset::ALL.iter().map(|d| d.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Dataset::ALL.len());
    }

    #[test]
    fn test_review_score_domain() {
        assert_eq!(ReviewScore::new(5).map(|s| s.get()), Some(5));
        assert!(ReviewScore::new(0).is_none());
        assert!(ReviewScore::new(6).is_none());
        assert_eq!(ReviewScore::from_f64(2.0), ReviewScore::new(2));
        assert!(ReviewScore::from_f64(2.5).is_none());
        assert!(serde_json::from_str::<ReviewScore>("9").is_err());
    }

    #[test]
    fn test_order_status_group() {
        assert_eq!(OrderStatusGroup::classify("delivered"), OrderStatusGroup::Success);
        for status in ["shipped", "canceled", "processing", "invoiced", "Delivered", ""] {
            assert_eq!(OrderStatusGroup::classify(status), OrderStatusGroup::NotSuccess);
        }
        assert_eq!(OrderStatusGroup::Success.as_str(), "success");
        assert_eq!(OrderStatusGroup::NotSuccess.to_string(), "not_success");
    }
}
