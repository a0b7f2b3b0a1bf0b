//! Feature pipeline
//!
//! Validates a table against a [`FeatureSpec`], places it on its regular
//! grid, computes every derived column and appends them after the original
//! columns: calendar, then rolling, then lag, each in declaration order.
//!
//! All checks run before any column is computed, so a failing transform
//! never produces a partial table.

use crate::error::{FeatureError, Result};
use crate::features::{is_numeric, FeatureContext, FeatureGenerator, SourceColumn};
use crate::grid::{format_step, GridValidator, TimeGrid};
use crate::spec::{DerivedFeature, FeatureSpec, MissingValuePolicy};
use crate::table::{format_timestamp, SeriesTable};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Execution settings for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Compute columns on the rayon pool
    pub parallel: bool,
    /// Dedicated pool size (None = global pool)
    pub n_threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            n_threads: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute columns one after another on the calling thread
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            n_threads: None,
        }
    }

    /// Use a dedicated pool of `n` threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n.max(1));
        self
    }
}

/// Applies a feature specification to series tables
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    spec: FeatureSpec,
    config: PipelineConfig,
}

impl FeaturePipeline {
    /// Create a pipeline with the default (parallel) configuration
    pub fn new(spec: FeatureSpec) -> Self {
        Self::with_config(spec, PipelineConfig::default())
    }

    pub fn with_config(spec: FeatureSpec, config: PipelineConfig) -> Self {
        Self { spec, config }
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the derived columns, in output order
    pub fn derived_names(&self) -> Vec<String> {
        self.spec.derived_names()
    }

    /// Run every check `transform` would, without computing features
    pub fn validate(&self, table: &SeriesTable) -> Result<TimeGrid> {
        self.check_schema(table)?;
        self.validator().validate(table)
    }

    /// Derive all features for `table`, returning a new enriched table.
    ///
    /// Input columns named like a derived feature are treated as earlier
    /// output and recomputed, so re-running on an enriched table is a no-op.
    pub fn transform(&self, table: &SeriesTable) -> Result<SeriesTable> {
        let start = Instant::now();
        let policy = self.spec.missing_value_policy();

        let grid = self.validate(table)?;
        if let Some(first) = grid.first_missing() {
            warn!(
                missing = grid.gap_count(),
                first = %format_timestamp(&first),
                "Inserting empty rows for skipped grid slots"
            );
        }

        let derived = self.spec.derived_names();
        let stale: Vec<String> = table
            .column_names()
            .into_iter()
            .filter(|name| derived.contains(name))
            .collect();
        if !stale.is_empty() {
            debug!(columns = ?stale, "Replacing previously derived columns");
        }
        let base = table.without_columns(&stale)?;
        let regular = grid.reindex(&base)?;
        let sources = self.prepare_sources(&regular)?;

        if policy == MissingValuePolicy::Raise {
            self.check_complete_history(&regular, &sources)?;
        }

        let features = self.spec.features();
        let ctx = FeatureContext::new(regular.index(), &sources);
        let columns = self.compute(&features, &ctx)?;

        let mut enriched = regular.with_columns(columns)?;
        if self.spec.drop_warmup() {
            enriched = enriched.skip_rows(self.spec.warmup_steps())?;
        }

        info!(
            rows = enriched.height(),
            features = features.len(),
            step = %grid.step().map(format_step).unwrap_or_else(|| "none".to_string()),
            inserted_rows = grid.gap_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Derived time series features"
        );

        Ok(enriched)
    }

    /// Gaps are only filled outside `Raise`
    fn validator(&self) -> GridValidator {
        let fill_gaps = self.spec.fill_gaps() && self.spec.missing_value_policy() != MissingValuePolicy::Raise;
        let validator = GridValidator::new().fill_gaps(fill_gaps);
        match self.spec.step() {
            Some(step) => validator.with_step(step),
            None => validator,
        }
    }

    /// Referenced variables exist and rolling sources are numeric
    fn check_schema(&self, table: &SeriesTable) -> Result<()> {
        for variable in self.spec.source_variables() {
            table.column(&variable)?;
        }

        for rolling in self.spec.rolling_features() {
            let dtype = table.column(&rolling.variable)?.dtype();
            if !is_numeric(dtype) {
                return Err(FeatureError::NonNumericColumn {
                    column: rolling.variable.clone(),
                    dtype: dtype.to_string(),
                });
            }
        }

        Ok(())
    }

    fn prepare_sources(&self, regular: &SeriesTable) -> Result<HashMap<String, SourceColumn>> {
        let policy = self.spec.missing_value_policy();
        let numeric: HashSet<&str> = self
            .spec
            .rolling_features()
            .iter()
            .map(|r| r.variable.as_str())
            .collect();

        let mut sources = HashMap::new();
        for variable in self.spec.source_variables() {
            let column = regular.column(&variable)?;
            let source = SourceColumn::prepare(column, policy, numeric.contains(variable.as_str()))?;
            debug!(
                variable = %variable,
                missing = source.missing_count(),
                "Prepared source column"
            );
            sources.insert(variable, source);
        }
        Ok(sources)
    }

    /// Under `Raise`: no missing source values and no warm-up rows
    fn check_complete_history(&self, regular: &SeriesTable, sources: &HashMap<String, SourceColumn>) -> Result<()> {
        for variable in self.spec.source_variables() {
            if let Some(source) = sources.get(&variable) {
                let count = source.missing_count();
                if count > 0 {
                    return Err(FeatureError::MissingValues { column: variable, count });
                }
            }
        }

        if let Some(first) = regular.index().first() {
            let needy = self
                .spec
                .features()
                .into_iter()
                .find(|f| f.warmup_steps() > 0);
            if let Some(feature) = needy {
                return Err(FeatureError::InsufficientHistory {
                    feature: feature.name(),
                    row: 0,
                    timestamp: format_timestamp(first),
                    required: feature.warmup_steps(),
                });
            }
        }

        Ok(())
    }

    /// Compute columns in declaration order; rayon's collect keeps slot order
    fn compute(&self, features: &[DerivedFeature], ctx: &FeatureContext<'_>) -> Result<Vec<Column>> {
        if !self.config.parallel {
            return features.iter().map(|f| f.generate(ctx)).collect();
        }

        let run = || -> Result<Vec<Column>> {
            features
                .par_iter()
                .map(|f| f.generate(ctx))
                .collect()
        };

        match self.config.n_threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| FeatureError::ThreadPoolError(e.to_string()))?;
                pool.install(run)
            }
            None => run(),
        }
    }
}
