//! Lag features
//!
//! Row `i` of `<var>_lag_<k>` holds the source value at grid row `i - k`.
//! Offsets are grid steps on the reindexed table, so a missing source row
//! shows up as a missing lagged value rather than shifting later rows.

use super::{FeatureContext, FeatureGenerator};
use crate::error::Result;
use crate::spec::LagFeature;
use polars::prelude::*;

impl FeatureGenerator for LagFeature {
    fn output_name(&self) -> String {
        self.name()
    }

    fn generate(&self, ctx: &FeatureContext<'_>) -> Result<Column> {
        let source = ctx.source(&self.variable)?;
        let lagged = source
            .series
            .shift(self.lag as i64)
            .with_name(self.name().into());
        Ok(lagged.into())
    }
}
