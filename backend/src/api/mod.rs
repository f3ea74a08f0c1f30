//! Presentation-facing module.
//!
//! Report types handed to the dashboard, and the log stream it can follow
//! while the pipeline runs.

pub mod logs;
pub mod types;

pub use logs::*;
pub use types::*;
