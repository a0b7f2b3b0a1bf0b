//! Feature generators
//!
//! Each derived column is produced by a [`FeatureGenerator`] reading from a
//! shared, read-only [`FeatureContext`]:
//! - [`calendar`] - attributes of each row's own timestamp
//! - [`rolling`] - strictly trailing window aggregates
//! - [`lag`] - values from a fixed number of grid steps back
//!
//! Generators never see the current row of a source variable except through
//! its timestamp, which is what keeps the output free of look-ahead leakage.

pub mod calendar;
pub mod lag;
pub mod rolling;

use crate::error::{FeatureError, Result};
use crate::spec::{DerivedFeature, MissingValuePolicy};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::HashMap;

/// Produces one derived column
pub trait FeatureGenerator {
    /// Name of the produced column
    fn output_name(&self) -> String;

    /// Compute the column over the whole grid
    fn generate(&self, ctx: &FeatureContext<'_>) -> Result<Column>;
}

impl FeatureGenerator for DerivedFeature {
    fn output_name(&self) -> String {
        self.name()
    }

    fn generate(&self, ctx: &FeatureContext<'_>) -> Result<Column> {
        match self {
            DerivedFeature::Calendar(attribute) => attribute.generate(ctx),
            DerivedFeature::Rolling(rolling) => rolling.generate(ctx),
            DerivedFeature::Lag(lag) => lag.generate(ctx),
        }
    }
}

/// A source variable prepared once per transform and shared by its generators
#[derive(Debug, Clone)]
pub struct SourceColumn {
    /// Source values on the regular grid, NaN normalized to null
    pub series: Series,
    /// Values as f64, present when a rolling feature reads this variable
    pub values: Option<Vec<Option<f64>>>,
}

impl SourceColumn {
    /// Prepare a grid-aligned column for feature derivation.
    ///
    /// Float NaNs become nulls so every generator sees a single notion of
    /// missing. Under [`MissingValuePolicy::Impute`] gaps are forward-filled,
    /// which only ever carries past observations forward.
    pub fn prepare(column: &Column, policy: MissingValuePolicy, numeric: bool) -> Result<Self> {
        let mut series = column.as_materialized_series().clone();
        if series.dtype().is_float() {
            series = nan_to_null(&series)?;
        }
        if policy == MissingValuePolicy::Impute {
            series = series.fill_null(FillNullStrategy::Forward(None))?;
        }

        let values = if numeric {
            Some(numeric_values(&series)?)
        } else {
            None
        };

        Ok(Self { series, values })
    }

    pub fn missing_count(&self) -> usize {
        self.series.null_count()
    }

    /// Numeric view of the source
    pub fn values(&self) -> Result<&[Option<f64>]> {
        self.values.as_deref().ok_or_else(|| FeatureError::NonNumericColumn {
            column: self.series.name().to_string(),
            dtype: self.series.dtype().to_string(),
        })
    }
}

/// Read-only inputs shared by all generators of one transform
#[derive(Debug)]
pub struct FeatureContext<'a> {
    index: &'a [NaiveDateTime],
    sources: &'a HashMap<String, SourceColumn>,
}

impl<'a> FeatureContext<'a> {
    pub fn new(index: &'a [NaiveDateTime], sources: &'a HashMap<String, SourceColumn>) -> Self {
        Self { index, sources }
    }

    /// Timestamps of the regular grid
    pub fn index(&self) -> &'a [NaiveDateTime] {
        self.index
    }

    pub fn height(&self) -> usize {
        self.index.len()
    }

    pub fn source(&self, variable: &str) -> Result<&'a SourceColumn> {
        self.sources
            .get(variable)
            .ok_or_else(|| FeatureError::ColumnNotFound(variable.to_string()))
    }
}

/// Whether rolling aggregation can read this type
pub fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_float() || dtype.is_integer()
}

/// Replace NaN with null, keeping the source float width
fn nan_to_null(series: &Series) -> Result<Series> {
    let as_f64 = series.cast(&DataType::Float64)?;
    let values: Vec<Option<f64>> = as_f64
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(Series::new(series.name().clone(), values).cast(series.dtype())?)
}

fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    if !is_numeric(series.dtype()) {
        return Err(FeatureError::NonNumericColumn {
            column: series.name().to_string(),
            dtype: series.dtype().to_string(),
        });
    }
    let as_f64 = series.cast(&DataType::Float64)?;
    Ok(as_f64
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}
