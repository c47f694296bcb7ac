//! rfmforge: RFM (Recency, Frequency, Monetary) customer segmentation
//!
//! Scores customers from transaction data with dense-rank quantile bins,
//! combines the sub-scores with user-supplied weights and assigns each
//! customer a segment, together with aggregate KPIs.

pub mod cli;
pub mod data;
pub mod error;
pub mod kpi;
pub mod mapping;
pub mod model;
pub mod report;
pub mod segment;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_transactions, read_headers, LoadedTable, Transaction};
pub use error::{ConfigurationError, RfmError, ValidationError};
pub use kpi::{ClvScope, Kpis};
pub use mapping::ColumnMapping;
pub use model::{
    compute_segmentation, quantile_scores, CustomerAggregate, ScoredCustomer, ScoringConfig,
    Segmentation, WeightConfig,
};
pub use segment::Segment;

/// Common result type used by the command-line layer
pub type Result<T> = anyhow::Result<T>;
