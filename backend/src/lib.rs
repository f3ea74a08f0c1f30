//! # Shopsight - e-commerce insight pipeline
//!
//! Shopsight turns the CSV exports of a marketplace (orders, items, payments,
//! reviews, products, customers, geolocation) into the derived metrics a
//! business-insight dashboard plots.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV files  │────▶│ Table cache │────▶│  Transform  │────▶│   Report    │
//! │  (ISO/UTF8) │     │ (load once) │     │ (join+calc) │     │   (JSON)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shopsight::{Config, InsightPipeline, TableCache};
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let cache = Arc::new(TableCache::with_dir(&config.data_dir));
//! let pipeline = InsightPipeline::new(cache, config);
//! let categories = pipeline.top_categories(10)?;
//! println!("Best seller: {}", categories.ranking[0].key);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Datasets, review scores, order status groups, column names
//! - [`table`] - In-memory tables of JSON cells
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Normalize, join, aggregate, metrics, analyses
//! - [`cache`] - Load-once table cache
//! - [`config`] - Environment configuration
//! - [`api`] - Report types and log streaming

// Core modules
pub mod error;
pub mod models;
pub mod table;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Caching
pub mod cache;

// Configuration
pub mod config;

// Presentation
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CacheError, CacheResult, ConfigError, JoinSide, PipelineError, PipelineResult, TableError,
    TableResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{columns, Dataset, OrderStatusGroup, ReviewScore};

// =============================================================================
// Re-exports - Tables and CSV parsing
// =============================================================================

pub use table::Table;

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_file_auto,
    parse_str, CsvError, ParseResult,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    aggregate, group_by, join, normalize, normalize_column_name, top_n, Aggregation,
    Availability, JoinKind, JoinSpec, Reducer,
};

pub use transform::metrics::{
    delivery_delay_days, order_success_group, pearson_correlation, per_order_aggregate,
    Correlation, PerOrderMetric, UndefinedReason,
};

pub use transform::pipeline::{
    CustomerGeography, DelayScope, DeliverySatisfaction, InsightPipeline, OrderStatusFactors,
    PaymentOverview, TopCategories,
};

// =============================================================================
// Re-exports - Cache, config, report
// =============================================================================

pub use cache::{DirectorySource, MemorySource, TableCache, TableSource};

pub use config::Config;

pub use api::types::{InsightReport, Section};
