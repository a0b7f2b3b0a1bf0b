//! Serializable feature specification

use super::{FeatureSpec, FeatureSpecBuilder, MissingValuePolicy};
use crate::error::Result;
use crate::grid::{format_step, parse_step};
use serde::{Deserialize, Serialize};

/// Rolling declarations for one variable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollingConfig {
    /// Source variable
    pub variable: String,
    /// Window lengths in grid steps
    pub windows: Vec<usize>,
    /// Aggregation function names (`mean`, `sum`, `std`, ...)
    pub functions: Vec<String>,
    /// Prior rows required before emitting a value (defaults to the window length)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_periods: Option<usize>,
}

/// Lag declarations for one variable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LagConfig {
    /// Source variable
    pub variable: String,
    /// Lag offsets in grid steps
    pub lags: Vec<i64>,
}

/// JSON form of a [`FeatureSpec`]
///
/// ```json
/// {
///   "calendar_attributes": ["day_of_week", "hour"],
///   "rolling": [{"variable": "temp", "windows": [2], "functions": ["mean"]}],
///   "lags": [{"variable": "temp", "lags": [1, 2]}],
///   "missing_value_policy": "ignore"
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeatureSpecConfig {
    #[serde(default)]
    pub calendar_attributes: Vec<String>,
    #[serde(default)]
    pub rolling: Vec<RollingConfig>,
    #[serde(default)]
    pub lags: Vec<LagConfig>,
    #[serde(default)]
    pub missing_value_policy: MissingValuePolicy,
    /// Declared grid step such as `1h` or `15min`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Re-insert skipped grid slots as missing rows
    #[serde(default)]
    pub fill_gaps: bool,
    #[serde(default)]
    pub drop_warmup: bool,
}

impl FeatureSpecConfig {
    /// Translate into a builder, parsing names and step strings
    pub fn to_builder(&self) -> Result<FeatureSpecBuilder> {
        let mut builder = FeatureSpecBuilder::new()
            .calendar_names(&self.calendar_attributes)
            .missing_value_policy(self.missing_value_policy)
            .fill_gaps(self.fill_gaps)
            .drop_warmup(self.drop_warmup);

        if let Some(step) = &self.step {
            builder = builder.step(parse_step(step)?);
        }

        for rolling in &self.rolling {
            for &window in &rolling.windows {
                for function in &rolling.functions {
                    let function = function.parse()?;
                    builder = match rolling.min_periods {
                        Some(min_periods) => {
                            builder.rolling_with_min_periods(&rolling.variable, window, function, min_periods)
                        }
                        None => builder.rolling(&rolling.variable, window, function),
                    };
                }
            }
        }

        for lag in &self.lags {
            builder = builder.lags(&lag.variable, &lag.lags);
        }

        Ok(builder)
    }

    /// Describe an existing specification.
    ///
    /// Each rolling feature becomes its own entry so that per-feature
    /// `min_periods` survive.
    pub fn from_spec(spec: &FeatureSpec) -> Self {
        let rolling = spec
            .rolling_features()
            .iter()
            .map(|r| RollingConfig {
                variable: r.variable.clone(),
                windows: vec![r.window],
                functions: vec![r.function.name().to_string()],
                min_periods: (r.min_periods != r.window).then_some(r.min_periods),
            })
            .collect();

        let mut lags: Vec<LagConfig> = Vec::new();
        for lag in spec.lag_features() {
            match lags.iter_mut().find(|l| l.variable == lag.variable) {
                Some(existing) => existing.lags.push(lag.lag as i64),
                None => lags.push(LagConfig {
                    variable: lag.variable.clone(),
                    lags: vec![lag.lag as i64],
                }),
            }
        }

        Self {
            calendar_attributes: spec
                .calendar_attributes()
                .iter()
                .map(|a| a.name().to_string())
                .collect(),
            rolling,
            lags,
            missing_value_policy: spec.missing_value_policy(),
            step: spec.step().map(format_step),
            fill_gaps: spec.fill_gaps(),
            drop_warmup: spec.drop_warmup(),
        }
    }
}
