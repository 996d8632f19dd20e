//! Week snapping and calendar attributes

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Days from 0001-01-01 (CE) to 1970-01-01, the epoch of polars `Date` values
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Calendar attributes of one canonical week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekCalendar {
    pub week_start: NaiveDate,
    pub month: u32,
    pub iso_week_of_year: u32,
    pub iso_year: i32,
    pub week_sin: f64,
    pub week_cos: f64,
}

/// Snaps dates onto a weekly grid and derives calendar attributes
///
/// The grid is the configured weekday of the ISO (Monday-based) week holding
/// the date, so the snapped date never leaves that ISO week and its ISO
/// attributes are those of the input. With a Sunday start this moves
/// Monday to Saturday dates forward to the closing Sunday.
///
/// The cyclical encoding divides by 52, so week 53 of a long ISO year lands
/// slightly past week 1. That residual is accepted rather than corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarNormalizer {
    week_start: Weekday,
}

impl Default for CalendarNormalizer {
    fn default() -> Self {
        Self::new(Weekday::Mon)
    }
}

impl CalendarNormalizer {
    pub fn new(week_start: Weekday) -> Self {
        Self { week_start }
    }

    pub fn week_start_day(&self) -> Weekday {
        self.week_start
    }

    /// Configured weekday of the ISO week containing `date`
    pub fn snap(&self, date: NaiveDate) -> NaiveDate {
        let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        monday + Duration::days(i64::from(self.week_start.num_days_from_monday()))
    }

    /// Snap `date` and compute the attributes of its week
    pub fn normalize(&self, date: NaiveDate) -> WeekCalendar {
        let week_start = self.snap(date);
        let iso = week_start.iso_week();
        let iso_week_of_year = iso.week();
        let angle = 2.0 * PI * f64::from(iso_week_of_year) / 52.0;

        WeekCalendar {
            week_start,
            month: week_start.month(),
            iso_week_of_year,
            iso_year: iso.year(),
            week_sin: angle.sin(),
            week_cos: angle.cos(),
        }
    }

    /// Whole weeks between two snapped dates
    pub fn weeks_between(from: NaiveDate, to: NaiveDate) -> i64 {
        (to - from).num_days().div_euclid(7)
    }
}

/// Convert a polars `Date` physical value (days since 1970-01-01)
pub fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Convert a date to a polars `Date` physical value
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}
