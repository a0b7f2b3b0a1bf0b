//! Kolosal Features - leakage-safe time series feature derivation
//!
//! Given a time-indexed table of observations and a declarative feature
//! specification, this crate derives:
//! - Calendar features from each row's timestamp
//! - Strictly trailing rolling-window aggregates
//! - Lagged copies of selected variables
//!
//! Every feature is aligned to a regular time grid and only ever reads rows
//! strictly before the one it is computed for.
//!
//! # Modules
//!
//! - [`table`] - Time-indexed series table over a polars frame
//! - [`grid`] - Grid step inference, validation and reindexing
//! - [`spec`] - Feature specification, builder and JSON config
//! - [`features`] - Calendar, rolling and lag generators
//! - [`pipeline`] - Validation, parallel column computation and assembly
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use kolosal_features::prelude::*;
//! use polars::prelude::*;
//!
//! # fn main() -> kolosal_features::Result<()> {
//! let df = df!(
//!     "datetime" => &["2011-01-01 00:00:00", "2011-01-01 01:00:00", "2011-01-01 02:00:00"],
//!     "temp" => &[9.84, 9.02, 9.02]
//! )?;
//! let table = SeriesTable::from_frame(&df, "datetime")?;
//!
//! let spec = FeatureSpec::builder()
//!     .calendar(CalendarAttribute::Hour)
//!     .rolling("temp", 2, AggregationFn::Mean)
//!     .lags("temp", &[1, 2])
//!     .build()?;
//!
//! let enriched = FeaturePipeline::new(spec).transform(&table)?;
//! println!("{}", enriched.to_frame("datetime")?);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Data model
pub mod table;
pub mod grid;
pub mod spec;

// Feature derivation
pub mod features;
pub mod pipeline;

// Services
pub mod cli;

pub use error::{FeatureError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{FeatureError, Result};

    // Data model
    pub use crate::table::SeriesTable;
    pub use crate::grid::{GridValidator, TimeGrid};

    // Specification
    pub use crate::spec::{
        AggregationFn, CalendarAttribute, DerivedFeature, FeatureSpec, FeatureSpecBuilder,
        FeatureSpecConfig, MissingValuePolicy,
    };

    // Pipeline
    pub use crate::features::FeatureGenerator;
    pub use crate::pipeline::{FeaturePipeline, PipelineConfig};
}
