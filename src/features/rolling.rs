//! Trailing rolling-window aggregates
//!
//! The window for row `i` covers rows `[i - window, i - 1]`. The current row
//! never enters its own aggregate. A row is emitted once it has at least
//! `min_periods` prior grid rows and one non-missing value in its window.

use super::{FeatureContext, FeatureGenerator};
use crate::error::Result;
use crate::spec::{AggregationFn, RollingFeature};
use polars::prelude::*;
use std::collections::VecDeque;

impl FeatureGenerator for RollingFeature {
    fn output_name(&self) -> String {
        self.name()
    }

    fn generate(&self, ctx: &FeatureContext<'_>) -> Result<Column> {
        let source = ctx.source(&self.variable)?;
        let values = rolling_trailing(source.values()?, self.window, self.min_periods, self.function);
        Ok(Series::new(self.name().into(), values).into())
    }
}

/// Aggregate each row's strictly trailing window
pub fn rolling_trailing(
    values: &[Option<f64>],
    window: usize,
    min_periods: usize,
    function: AggregationFn,
) -> Vec<Option<f64>> {
    match function {
        AggregationFn::Min | AggregationFn::Max => {
            sliding_extreme(values, window, min_periods, function == AggregationFn::Max)
        }
        _ => windowed(values, window, min_periods, function),
    }
}

/// Monotonic deque over window indices
fn sliding_extreme(values: &[Option<f64>], window: usize, min_periods: usize, max: bool) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut deque: VecDeque<usize> = VecDeque::new();
    let dominated = |kept: f64, incoming: f64| if max { kept <= incoming } else { kept >= incoming };

    for i in 0..values.len() {
        if i >= 1 {
            if let Some(incoming) = values[i - 1] {
                while let Some(&back) = deque.back() {
                    match values[back] {
                        Some(kept) if dominated(kept, incoming) => {
                            deque.pop_back();
                        }
                        _ => break,
                    }
                }
                deque.push_back(i - 1);
            }
        }
        while let Some(&front) = deque.front() {
            if front + window < i {
                deque.pop_front();
            } else {
                break;
            }
        }

        let value = if i < min_periods {
            None
        } else {
            deque.front().and_then(|&idx| values[idx])
        };
        out.push(value);
    }

    out
}

/// Direct reduction over each window's non-missing values.
///
/// Every row reduces its own slice, so a non-finite or very large value
/// only affects the windows that contain it.
fn windowed(values: &[Option<f64>], window: usize, min_periods: usize, function: AggregationFn) -> Vec<Option<f64>> {
    let mut buffer: Vec<f64> = Vec::with_capacity(window);

    (0..values.len())
        .map(|i| {
            if i < min_periods {
                return None;
            }
            buffer.clear();
            buffer.extend(values[i.saturating_sub(window)..i].iter().flatten());
            if buffer.is_empty() {
                return None;
            }
            match function {
                AggregationFn::Sum => Some(buffer.iter().sum()),
                AggregationFn::Mean => Some(buffer.iter().sum::<f64>() / buffer.len() as f64),
                AggregationFn::Count => Some(buffer.len() as f64),
                AggregationFn::Std => sample_variance(&buffer).map(f64::sqrt),
                AggregationFn::Var => sample_variance(&buffer),
                AggregationFn::Median => median(&mut buffer),
                AggregationFn::Min => buffer.iter().copied().reduce(f64::min),
                AggregationFn::Max => buffer.iter().copied().reduce(f64::max),
            }
        })
        .collect()
}

fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0))
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
