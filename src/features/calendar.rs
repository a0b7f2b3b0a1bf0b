//! Calendar features
//!
//! Purely functional in the row's own timestamp: no history, no warm-up.

use super::{FeatureContext, FeatureGenerator};
use crate::error::Result;
use crate::spec::CalendarAttribute;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use polars::prelude::*;

impl CalendarAttribute {
    /// Value of this attribute for one timestamp
    pub fn extract(&self, ts: &NaiveDateTime) -> i32 {
        match self {
            CalendarAttribute::Year => ts.year(),
            CalendarAttribute::Quarter => (ts.month0() / 3 + 1) as i32,
            CalendarAttribute::Month => ts.month() as i32,
            CalendarAttribute::WeekOfYear => ts.iso_week().week() as i32,
            CalendarAttribute::DayOfYear => ts.ordinal() as i32,
            CalendarAttribute::DayOfMonth => ts.day() as i32,
            CalendarAttribute::DayOfWeek => ts.weekday().num_days_from_monday() as i32,
            CalendarAttribute::Hour => ts.hour() as i32,
            CalendarAttribute::Minute => ts.minute() as i32,
            CalendarAttribute::Second => ts.second() as i32,
            CalendarAttribute::IsWeekend => {
                matches!(ts.weekday(), Weekday::Sat | Weekday::Sun) as i32
            }
            CalendarAttribute::IsMonthStart => (ts.day() == 1) as i32,
            CalendarAttribute::IsMonthEnd => {
                ts.date().succ_opt().map_or(true, |next| next.day() == 1) as i32
            }
        }
    }
}

impl FeatureGenerator for CalendarAttribute {
    fn output_name(&self) -> String {
        self.name().to_string()
    }

    fn generate(&self, ctx: &FeatureContext<'_>) -> Result<Column> {
        let values: Vec<i32> = ctx.index().iter().map(|ts| self.extract(ts)).collect();
        Ok(Series::new(self.name().into(), values).into())
    }
}
