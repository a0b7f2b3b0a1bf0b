//! Time grid validation and resampling
//!
//! Rolling and lag features index rows by grid step, never by wall-clock
//! distance. The validator establishes that step (declared or inferred as the
//! smallest positive gap) and checks that consecutive rows are exactly one step
//! apart. When gap filling is enabled, gaps of several whole steps are accepted
//! and the grid slot of each source row is recorded so that missing rows can be
//! re-inserted as all-missing rows.

use crate::error::{FeatureError, Result};
use crate::table::{format_timestamp, SeriesTable};
use chrono::{NaiveDateTime, TimeDelta};
use polars::prelude::*;
use tracing::debug;

/// Validated regular time grid
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    step: Option<TimeDelta>,
    origin: Option<NaiveDateTime>,
    /// Grid slot of each source row
    slots: Vec<usize>,
    len: usize,
}

impl TimeGrid {
    /// Step between consecutive grid rows, if one could be established
    pub fn step(&self) -> Option<TimeDelta> {
        self.step
    }

    /// First timestamp of the grid
    pub fn origin(&self) -> Option<NaiveDateTime> {
        self.origin
    }

    /// Number of rows on the complete grid
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grid slot of each source row
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Number of grid rows absent from the source table
    pub fn gap_count(&self) -> usize {
        self.len - self.slots.len()
    }

    pub fn is_complete(&self) -> bool {
        self.gap_count() == 0
    }

    /// Timestamp of a grid slot
    fn timestamp_at(&self, slot: usize) -> Option<NaiveDateTime> {
        let origin = self.origin?;
        match self.step {
            Some(step) => Some(origin + TimeDelta::milliseconds(step.num_milliseconds() * slot as i64)),
            None => (slot == 0).then_some(origin),
        }
    }

    /// All timestamps of the complete grid
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        (0..self.len).filter_map(|slot| self.timestamp_at(slot)).collect()
    }

    /// Timestamp of the first grid row missing from the source table
    pub fn first_missing(&self) -> Option<NaiveDateTime> {
        let slot = self
            .slots
            .iter()
            .enumerate()
            .find(|&(row, &slot)| row != slot)
            .map(|(row, _)| row)?;
        self.timestamp_at(slot)
    }

    /// Timestamps of grid rows missing from the source table
    pub fn missing_slots(&self) -> Vec<NaiveDateTime> {
        self.slots
            .windows(2)
            .flat_map(|pair| pair[0] + 1..pair[1])
            .filter_map(|slot| self.timestamp_at(slot))
            .collect()
    }

    /// Place the table on the complete grid.
    ///
    /// Skipped slots become rows whose variables are all missing.
    pub fn reindex(&self, table: &SeriesTable) -> Result<SeriesTable> {
        if table.height() != self.slots.len() {
            return Err(FeatureError::ShapeError {
                expected: format!("{} rows", self.slots.len()),
                actual: format!("{} rows", table.height()),
            });
        }
        if self.is_complete() {
            return Ok(table.clone());
        }

        let mut source_rows: Vec<Option<IdxSize>> = vec![None; self.len];
        for (row, &slot) in self.slots.iter().enumerate() {
            source_rows[slot] = Some(row as IdxSize);
        }
        let idx: IdxCa = source_rows.into_iter().collect();

        let frame = table.frame().take(&idx)?;
        debug!(
            inserted = self.gap_count(),
            rows = self.len,
            "Reindexed table onto regular grid"
        );
        SeriesTable::new(self.timestamps(), frame)
    }
}

/// Upper bound on grid rows produced by gap filling
pub const DEFAULT_MAX_GRID_ROWS: usize = 10_000_000;

/// Validates (and optionally declares) the grid step of a series table
#[derive(Debug, Clone)]
pub struct GridValidator {
    step: Option<TimeDelta>,
    fill_gaps: bool,
    max_rows: usize,
}

impl Default for GridValidator {
    fn default() -> Self {
        Self {
            step: None,
            fill_gaps: false,
            max_rows: DEFAULT_MAX_GRID_ROWS,
        }
    }
}

impl GridValidator {
    /// Create a validator that infers the step and rejects skipped slots
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the step instead of inferring it
    pub fn with_step(mut self, step: TimeDelta) -> Self {
        self.step = Some(step);
        self
    }

    /// Accept gaps of several whole steps, recording the skipped slots
    pub fn fill_gaps(mut self, fill: bool) -> Self {
        self.fill_gaps = fill;
        self
    }

    /// Limit the number of grid rows gap filling may produce
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Validate the index of `table` and compute its grid
    pub fn validate(&self, table: &SeriesTable) -> Result<TimeGrid> {
        let index = table.index();

        if let Some(ts) = index.iter().find(|ts| ts.and_utc().timestamp_subsec_nanos() % 1_000_000 != 0) {
            return Err(FeatureError::InvalidStep(format!(
                "timestamp {} is finer than one millisecond",
                ts
            )));
        }

        let declared = match self.step {
            Some(step) => Some(step_millis(step)?),
            None => None,
        };

        let gaps: Vec<i64> = index
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_milliseconds())
            .collect();

        let step_ms = match declared {
            Some(ms) => Some(ms),
            None => match gaps.iter().copied().min() {
                Some(0) => {
                    return Err(FeatureError::InvalidStep(
                        "timestamps closer than one millisecond".to_string(),
                    ))
                }
                Some(ms) => Some(ms),
                None => None,
            },
        };

        let max_rows = self.max_rows.max(index.len());
        let mut slots = Vec::with_capacity(index.len());
        if !index.is_empty() {
            slots.push(0usize);
        }
        if let Some(ms) = step_ms {
            let step = format_step(TimeDelta::milliseconds(ms));
            for (i, &gap) in gaps.iter().enumerate() {
                let irregular = |reason: String| FeatureError::IrregularGrid {
                    previous: format_timestamp(&index[i]),
                    current: format_timestamp(&index[i + 1]),
                    reason,
                };
                if gap <= 0 || gap % ms != 0 {
                    return Err(irregular(format!("gap is not a multiple of the {} step", step)));
                }
                let steps = gap / ms;
                if steps > 1 && !self.fill_gaps {
                    return Err(irregular(format!("{} missing rows on the {} grid", steps - 1, step)));
                }
                let slot = usize::try_from(steps)
                    .ok()
                    .and_then(|steps| slots[i].checked_add(steps))
                    .filter(|&slot| slot < max_rows)
                    .ok_or_else(|| {
                        FeatureError::InvalidStep(format!(
                            "a {} grid up to {} needs more than {} rows",
                            step,
                            format_timestamp(&index[i + 1]),
                            max_rows
                        ))
                    })?;
                slots.push(slot);
            }
        }

        let len = slots.last().map_or(0, |&last| last + 1);
        let grid = TimeGrid {
            step: step_ms.map(TimeDelta::milliseconds),
            origin: index.first().copied(),
            slots,
            len,
        };

        debug!(
            step = %grid.step.map(format_step).unwrap_or_else(|| "none".to_string()),
            rows = table.height(),
            grid_rows = grid.len,
            gaps = grid.gap_count(),
            "Validated time grid"
        );

        Ok(grid)
    }
}

fn step_millis(step: TimeDelta) -> Result<i64> {
    let ms = step.num_milliseconds();
    if ms <= 0 {
        return Err(FeatureError::InvalidStep(format!(
            "step must be at least one millisecond, got {:?}",
            step
        )));
    }
    if TimeDelta::milliseconds(ms) != step {
        return Err(FeatureError::InvalidStep(format!(
            "step must be a whole number of milliseconds, got {:?}",
            step
        )));
    }
    Ok(ms)
}

/// Render a step as a compact duration string (`1h`, `15min`, `500ms`)
pub fn format_step(step: TimeDelta) -> String {
    let ms = step.num_milliseconds();
    const UNITS: &[(i64, &str)] = &[
        (604_800_000, "w"),
        (86_400_000, "d"),
        (3_600_000, "h"),
        (60_000, "min"),
        (1_000, "s"),
    ];
    for &(size, suffix) in UNITS {
        if ms != 0 && ms % size == 0 {
            return format!("{}{}", ms / size, suffix);
        }
    }
    format!("{}ms", ms)
}

/// Parse a compact duration string such as `1h`, `30min`, `15s`, `2d`
pub fn parse_step(value: &str) -> Result<TimeDelta> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);

    let amount: i64 = amount
        .parse()
        .map_err(|_| FeatureError::InvalidStep(format!("cannot parse step '{}'", value)))?;

    let step = match unit.trim() {
        "ms" => TimeDelta::milliseconds(amount),
        "s" | "sec" => TimeDelta::seconds(amount),
        "m" | "min" => TimeDelta::minutes(amount),
        "h" | "hr" => TimeDelta::hours(amount),
        "d" => TimeDelta::days(amount),
        "w" => TimeDelta::weeks(amount),
        other => {
            return Err(FeatureError::InvalidStep(format!(
                "unknown step unit '{}' in '{}'",
                other, value
            )))
        }
    };

    if step <= TimeDelta::zero() {
        return Err(FeatureError::InvalidStep(format!("step must be positive, got '{}'", value)));
    }
    Ok(step)
}
