//! Builder for [`FeatureSpec`]

use super::{AggregationFn, CalendarAttribute, FeatureSpec, LagFeature, MissingValuePolicy, RollingFeature};
use crate::error::{FeatureError, Result};
use chrono::TimeDelta;
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct RollingDecl {
    window: usize,
    function: AggregationFn,
    min_periods: Option<usize>,
}

/// Collects feature declarations; all validation happens in [`build`](Self::build)
#[derive(Debug, Clone, Default)]
pub struct FeatureSpecBuilder {
    calendar: Vec<CalendarAttribute>,
    calendar_names: Vec<String>,
    rolling: Vec<(String, Vec<RollingDecl>)>,
    lags: Vec<(String, Vec<i64>)>,
    policy: MissingValuePolicy,
    step: Option<TimeDelta>,
    fill_gaps: bool,
    drop_warmup: bool,
}

fn entry<'a, T>(declarations: &'a mut Vec<(String, Vec<T>)>, variable: &str) -> &'a mut Vec<T> {
    let pos = match declarations.iter().position(|(name, _)| name == variable) {
        Some(pos) => pos,
        None => {
            declarations.push((variable.to_string(), Vec::new()));
            declarations.len() - 1
        }
    };
    &mut declarations[pos].1
}

impl FeatureSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one calendar attribute
    pub fn calendar(mut self, attribute: CalendarAttribute) -> Self {
        self.calendar.push(attribute);
        self
    }

    /// Add several calendar attributes
    pub fn calendar_attributes(mut self, attributes: impl IntoIterator<Item = CalendarAttribute>) -> Self {
        self.calendar.extend(attributes);
        self
    }

    /// Add calendar attributes by name; unknown names fail on build
    pub fn calendar_names<S: AsRef<str>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.calendar_names
            .extend(names.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Add one rolling aggregate; warm-up defaults to the full window
    pub fn rolling(mut self, variable: &str, window: usize, function: AggregationFn) -> Self {
        entry(&mut self.rolling, variable).push(RollingDecl {
            window,
            function,
            min_periods: None,
        });
        self
    }

    /// Add one rolling aggregate emitted once `min_periods` prior rows exist
    pub fn rolling_with_min_periods(
        mut self,
        variable: &str,
        window: usize,
        function: AggregationFn,
        min_periods: usize,
    ) -> Self {
        entry(&mut self.rolling, variable).push(RollingDecl {
            window,
            function,
            min_periods: Some(min_periods),
        });
        self
    }

    /// Add every (window, function) combination for a variable, window-major
    pub fn rolling_windows(mut self, variable: &str, windows: &[usize], functions: &[AggregationFn]) -> Self {
        let decls = entry(&mut self.rolling, variable);
        for &window in windows {
            for &function in functions {
                decls.push(RollingDecl {
                    window,
                    function,
                    min_periods: None,
                });
            }
        }
        self
    }

    /// Add one lag
    pub fn lag(mut self, variable: &str, lag: i64) -> Self {
        entry(&mut self.lags, variable).push(lag);
        self
    }

    /// Add several lags for a variable
    pub fn lags(mut self, variable: &str, lags: &[i64]) -> Self {
        entry(&mut self.lags, variable).extend_from_slice(lags);
        self
    }

    pub fn missing_value_policy(mut self, policy: MissingValuePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Declare the grid step instead of inferring it
    pub fn step(mut self, step: TimeDelta) -> Self {
        self.step = Some(step);
        self
    }

    /// Re-insert skipped grid slots as missing rows (ignored under `Raise`)
    pub fn fill_gaps(mut self, fill: bool) -> Self {
        self.fill_gaps = fill;
        self
    }

    /// Remove warm-up rows from the output
    pub fn drop_warmup(mut self, drop: bool) -> Self {
        self.drop_warmup = drop;
        self
    }

    /// Validate the declarations and freeze them into a [`FeatureSpec`]
    pub fn build(self) -> Result<FeatureSpec> {
        let mut calendar = self.calendar;
        for name in &self.calendar_names {
            calendar.push(name.parse()?);
        }

        if let Some(step) = self.step {
            if step <= TimeDelta::zero() {
                return Err(FeatureError::InvalidStep(format!(
                    "declared step must be positive, got {:?}",
                    step
                )));
            }
        }

        let mut rolling = Vec::new();
        for (variable, decls) in self.rolling {
            for decl in decls {
                if decl.window == 0 {
                    return Err(FeatureError::InvalidWindow {
                        variable,
                        reason: "window length must be at least one step".to_string(),
                    });
                }
                let min_periods = decl.min_periods.unwrap_or(decl.window);
                if min_periods == 0 || min_periods > decl.window {
                    return Err(FeatureError::InvalidWindow {
                        variable,
                        reason: format!(
                            "min_periods must be between 1 and the window length {}, got {}",
                            decl.window, min_periods
                        ),
                    });
                }
                rolling.push(RollingFeature {
                    variable: variable.clone(),
                    window: decl.window,
                    function: decl.function,
                    min_periods,
                });
            }
        }

        let mut lags = Vec::new();
        for (variable, offsets) in self.lags {
            for lag in offsets {
                if lag <= 0 {
                    return Err(FeatureError::InvalidLag { variable, lag });
                }
                lags.push(LagFeature {
                    variable: variable.clone(),
                    lag: lag as usize,
                });
            }
        }

        let spec = FeatureSpec {
            calendar,
            rolling,
            lags,
            policy: self.policy,
            step: self.step,
            fill_gaps: self.fill_gaps,
            drop_warmup: self.drop_warmup,
        };

        let sources: HashSet<String> = spec.source_variables().into_iter().collect();
        let mut seen = HashSet::new();
        for name in spec.derived_names() {
            if sources.contains(&name) || !seen.insert(name.clone()) {
                return Err(FeatureError::SpecificationConflict(name));
            }
        }

        Ok(spec)
    }
}
