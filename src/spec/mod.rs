//! Feature specification
//!
//! A [`FeatureSpec`] is the declarative, immutable description of what the
//! pipeline derives:
//! - Calendar attributes computed from each row's timestamp
//! - Trailing rolling-window aggregates per variable
//! - Lagged copies per variable
//! - The missing-value policy applied by every generator
//!
//! Specs are built with [`FeatureSpecBuilder`] or loaded from a serde
//! [`FeatureSpecConfig`]; both validate eagerly, before any table is touched.

mod builder;
mod config;

pub use builder::FeatureSpecBuilder;
pub use config::{FeatureSpecConfig, LagConfig, RollingConfig};

use crate::error::{FeatureError, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Calendar attribute derived from a single timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarAttribute {
    /// Calendar year
    Year,
    /// Quarter (1-4)
    Quarter,
    /// Month (1-12)
    Month,
    /// ISO week number (1-53)
    WeekOfYear,
    /// Day of year (1-366)
    DayOfYear,
    /// Day of month (1-31)
    DayOfMonth,
    /// Day of week, Monday = 0
    DayOfWeek,
    /// Hour (0-23)
    Hour,
    /// Minute (0-59)
    Minute,
    /// Second (0-59)
    Second,
    /// 1 on Saturday and Sunday
    IsWeekend,
    /// 1 on the first day of the month
    IsMonthStart,
    /// 1 on the last day of the month
    IsMonthEnd,
}

impl CalendarAttribute {
    pub const ALL: [CalendarAttribute; 13] = [
        CalendarAttribute::Year,
        CalendarAttribute::Quarter,
        CalendarAttribute::Month,
        CalendarAttribute::WeekOfYear,
        CalendarAttribute::DayOfYear,
        CalendarAttribute::DayOfMonth,
        CalendarAttribute::DayOfWeek,
        CalendarAttribute::Hour,
        CalendarAttribute::Minute,
        CalendarAttribute::Second,
        CalendarAttribute::IsWeekend,
        CalendarAttribute::IsMonthStart,
        CalendarAttribute::IsMonthEnd,
    ];

    /// Output column name
    pub fn name(&self) -> &'static str {
        match self {
            CalendarAttribute::Year => "year",
            CalendarAttribute::Quarter => "quarter",
            CalendarAttribute::Month => "month",
            CalendarAttribute::WeekOfYear => "week_of_year",
            CalendarAttribute::DayOfYear => "day_of_year",
            CalendarAttribute::DayOfMonth => "day_of_month",
            CalendarAttribute::DayOfWeek => "day_of_week",
            CalendarAttribute::Hour => "hour",
            CalendarAttribute::Minute => "minute",
            CalendarAttribute::Second => "second",
            CalendarAttribute::IsWeekend => "is_weekend",
            CalendarAttribute::IsMonthStart => "is_month_start",
            CalendarAttribute::IsMonthEnd => "is_month_end",
        }
    }
}

impl fmt::Display for CalendarAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CalendarAttribute {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self> {
        let attribute = match s.trim().to_lowercase().as_str() {
            "year" => CalendarAttribute::Year,
            "quarter" => CalendarAttribute::Quarter,
            "month" => CalendarAttribute::Month,
            "week" | "week_of_year" => CalendarAttribute::WeekOfYear,
            "day_of_year" => CalendarAttribute::DayOfYear,
            "day" | "day_of_month" => CalendarAttribute::DayOfMonth,
            "weekday" | "day_of_week" => CalendarAttribute::DayOfWeek,
            "hour" => CalendarAttribute::Hour,
            "minute" => CalendarAttribute::Minute,
            "second" => CalendarAttribute::Second,
            "weekend" | "is_weekend" => CalendarAttribute::IsWeekend,
            "month_start" | "is_month_start" => CalendarAttribute::IsMonthStart,
            "month_end" | "is_month_end" => CalendarAttribute::IsMonthEnd,
            _ => return Err(FeatureError::UnknownFeature(s.to_string())),
        };
        Ok(attribute)
    }
}

/// Reduction applied over a rolling window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationFn {
    Mean,
    Sum,
    /// Sample standard deviation (ddof = 1)
    Std,
    /// Sample variance (ddof = 1)
    Var,
    Min,
    Max,
    Median,
    /// Number of non-missing values
    Count,
}

impl AggregationFn {
    pub fn name(&self) -> &'static str {
        match self {
            AggregationFn::Mean => "mean",
            AggregationFn::Sum => "sum",
            AggregationFn::Std => "std",
            AggregationFn::Var => "var",
            AggregationFn::Min => "min",
            AggregationFn::Max => "max",
            AggregationFn::Median => "median",
            AggregationFn::Count => "count",
        }
    }
}

impl fmt::Display for AggregationFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregationFn {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self> {
        let function = match s.trim().to_lowercase().as_str() {
            "mean" | "avg" => AggregationFn::Mean,
            "sum" => AggregationFn::Sum,
            "std" => AggregationFn::Std,
            "var" => AggregationFn::Var,
            "min" => AggregationFn::Min,
            "max" => AggregationFn::Max,
            "median" => AggregationFn::Median,
            "count" => AggregationFn::Count,
            _ => return Err(FeatureError::UnknownFeature(s.to_string())),
        };
        Ok(function)
    }
}

/// How generators treat gaps, missing values and warm-up rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePolicy {
    /// Fail on grid gaps, missing source values or warm-up rows
    Raise,
    /// Emit missing cells where history is insufficient
    #[default]
    Ignore,
    /// Forward-fill source values before deriving; warm-up rows stay missing
    Impute,
}

impl FromStr for MissingValuePolicy {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "raise" => Ok(MissingValuePolicy::Raise),
            "ignore" => Ok(MissingValuePolicy::Ignore),
            "impute" => Ok(MissingValuePolicy::Impute),
            _ => Err(FeatureError::UnknownFeature(s.to_string())),
        }
    }
}

/// One trailing rolling-window column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingFeature {
    pub variable: String,
    /// Window length in grid steps
    pub window: usize,
    pub function: AggregationFn,
    /// Prior grid rows required before a value is emitted
    pub min_periods: usize,
}

impl RollingFeature {
    pub fn name(&self) -> String {
        format!("{}_window_{}_{}", self.variable, self.window, self.function)
    }
}

/// One lagged column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagFeature {
    pub variable: String,
    /// Offset in grid steps, always >= 1
    pub lag: usize,
}

impl LagFeature {
    pub fn name(&self) -> String {
        format!("{}_lag_{}", self.variable, self.lag)
    }
}

/// A single derived output column and its definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedFeature {
    Calendar(CalendarAttribute),
    Rolling(RollingFeature),
    Lag(LagFeature),
}

impl DerivedFeature {
    /// Deterministic output column name
    pub fn name(&self) -> String {
        match self {
            DerivedFeature::Calendar(attribute) => attribute.name().to_string(),
            DerivedFeature::Rolling(rolling) => rolling.name(),
            DerivedFeature::Lag(lag) => lag.name(),
        }
    }

    /// Source variable, if the feature reads one
    pub fn variable(&self) -> Option<&str> {
        match self {
            DerivedFeature::Calendar(_) => None,
            DerivedFeature::Rolling(rolling) => Some(&rolling.variable),
            DerivedFeature::Lag(lag) => Some(&lag.variable),
        }
    }

    /// Grid rows at the start of the series that lack history for this feature
    pub fn warmup_steps(&self) -> usize {
        match self {
            DerivedFeature::Calendar(_) => 0,
            DerivedFeature::Rolling(rolling) => rolling.min_periods,
            DerivedFeature::Lag(lag) => lag.lag,
        }
    }
}

/// Validated, immutable feature specification
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    calendar: Vec<CalendarAttribute>,
    rolling: Vec<RollingFeature>,
    lags: Vec<LagFeature>,
    policy: MissingValuePolicy,
    step: Option<TimeDelta>,
    fill_gaps: bool,
    drop_warmup: bool,
}

impl FeatureSpec {
    /// Start building a specification
    pub fn builder() -> FeatureSpecBuilder {
        FeatureSpecBuilder::new()
    }

    /// Build from a deserialized configuration
    pub fn from_config(config: &FeatureSpecConfig) -> Result<Self> {
        config.to_builder()?.build()
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FeatureSpecConfig = serde_json::from_str(json)?;
        Self::from_config(&config)
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Calendar attributes in declaration order
    pub fn calendar_attributes(&self) -> &[CalendarAttribute] {
        &self.calendar
    }

    /// Rolling features in declaration order
    pub fn rolling_features(&self) -> &[RollingFeature] {
        &self.rolling
    }

    /// Lag features in declaration order
    pub fn lag_features(&self) -> &[LagFeature] {
        &self.lags
    }

    pub fn missing_value_policy(&self) -> MissingValuePolicy {
        self.policy
    }

    /// Declared grid step, if any
    pub fn step(&self) -> Option<TimeDelta> {
        self.step
    }

    /// Whether whole skipped grid slots are re-inserted as missing rows
    /// instead of failing validation
    pub fn fill_gaps(&self) -> bool {
        self.fill_gaps
    }

    /// Whether warm-up rows are removed from the output
    pub fn drop_warmup(&self) -> bool {
        self.drop_warmup
    }

    /// All derived features: calendar, then rolling, then lag
    pub fn features(&self) -> Vec<DerivedFeature> {
        self.calendar
            .iter()
            .copied()
            .map(DerivedFeature::Calendar)
            .chain(self.rolling.iter().cloned().map(DerivedFeature::Rolling))
            .chain(self.lags.iter().cloned().map(DerivedFeature::Lag))
            .collect()
    }

    /// Output names of all derived features, in output order
    pub fn derived_names(&self) -> Vec<String> {
        self.features().iter().map(DerivedFeature::name).collect()
    }

    /// Variables read by rolling or lag features, in first-use order
    pub fn source_variables(&self) -> Vec<String> {
        let mut variables: Vec<String> = Vec::new();
        let names = self
            .rolling
            .iter()
            .map(|r| &r.variable)
            .chain(self.lags.iter().map(|l| &l.variable));
        for name in names {
            if !variables.contains(name) {
                variables.push(name.clone());
            }
        }
        variables
    }

    /// Largest history requirement over all features, in grid steps
    pub fn warmup_steps(&self) -> usize {
        self.features()
            .iter()
            .map(DerivedFeature::warmup_steps)
            .max()
            .unwrap_or(0)
    }

    /// Serializable form of this specification
    pub fn to_config(&self) -> FeatureSpecConfig {
        FeatureSpecConfig::from_spec(self)
    }
}
