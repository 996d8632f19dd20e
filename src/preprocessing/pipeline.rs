//! Panel preprocessing: week snapping, ordering and target filling

use crate::config::{PipelineConfig, ISO_YEAR, MONTH, WEEK_COS, WEEK_OF_YEAR, WEEK_SIN};
use crate::error::Result;
use crate::timeseries::{CalendarNormalizer, EntityPartition, WeekCalendar};
use super::columns::{date_series, entity_keys, f64_values, parse_dates, require_columns, week_values};
use chrono::Weekday;
use polars::prelude::*;
use std::time::Instant;
use tracing::debug;

/// Reshapes a raw panel into the sorted weekly form every feature expects
///
/// The output is a new frame: dates snapped to week starts, rows ordered by
/// (id columns, week), null targets filled with zero and calendar columns
/// attached. No target value is read across rows here.
#[derive(Debug, Clone)]
pub struct PanelPreprocessor {
    id_cols: Vec<String>,
    date_col: String,
    target_col: String,
    calendar: CalendarNormalizer,
}

impl PanelPreprocessor {
    /// Create a preprocessor for the configured columns
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            id_cols: config.id_cols.clone(),
            date_col: config.date_col.clone(),
            target_col: config.target_col.clone(),
            calendar: CalendarNormalizer::new(config.week_start),
        }
    }

    /// Create a preprocessor from explicit column names, weeks starting Monday
    pub fn with_columns(id_cols: &[&str], date_col: &str, target_col: &str) -> Self {
        Self {
            id_cols: id_cols.iter().map(|s| s.to_string()).collect(),
            date_col: date_col.to_string(),
            target_col: target_col.to_string(),
            calendar: CalendarNormalizer::new(Weekday::Mon),
        }
    }

    pub fn calendar(&self) -> &CalendarNormalizer {
        &self.calendar
    }

    /// Run the preprocessing steps and return the new panel
    pub fn preprocess(&self, panel: &DataFrame) -> Result<DataFrame> {
        let start = Instant::now();

        let mut required: Vec<&str> = self.id_cols.iter().map(String::as_str).collect();
        required.push(&self.date_col);
        required.push(&self.target_col);
        require_columns(panel, &required)?;

        // Validate the date column before touching anything else
        let snapped: Vec<_> = parse_dates(panel, &self.date_col)?
            .into_iter()
            .map(|date| self.calendar.snap(date))
            .collect();

        let mut snapped_panel = panel.clone();
        snapped_panel.with_column(date_series(&self.date_col, &snapped)?)?;

        let mut sort_cols = self.id_cols.clone();
        sort_cols.push(self.date_col.clone());
        let mut sorted = snapped_panel.sort(
            sort_cols,
            SortMultipleOptions::default().with_maintain_order(true),
        )?;

        let keys = entity_keys(&sorted, &self.id_cols)?;
        let weeks = week_values(&sorted, &self.date_col)?;
        // Rejects duplicate (entity, week) pairs
        let partition = EntityPartition::from_sorted(&keys, &weeks)?;

        let target: Vec<f64> = f64_values(&sorted, &self.target_col)?
            .into_iter()
            .map(|value| value.unwrap_or(0.0))
            .collect();
        sorted.with_column(Series::new(self.target_col.as_str().into(), target))?;

        let calendar: Vec<WeekCalendar> = weeks.iter().map(|&week| self.calendar.normalize(week)).collect();
        attach_calendar(&mut sorted, &calendar)?;

        debug!(
            rows = sorted.height(),
            entities = partition.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Preprocessed panel"
        );
        Ok(sorted)
    }
}

fn attach_calendar(df: &mut DataFrame, calendar: &[WeekCalendar]) -> Result<()> {
    let month: Vec<i32> = calendar.iter().map(|c| c.month as i32).collect();
    let week_of_year: Vec<i32> = calendar.iter().map(|c| c.iso_week_of_year as i32).collect();
    let iso_year: Vec<i32> = calendar.iter().map(|c| c.iso_year).collect();
    let week_sin: Vec<f64> = calendar.iter().map(|c| c.week_sin).collect();
    let week_cos: Vec<f64> = calendar.iter().map(|c| c.week_cos).collect();

    df.with_column(Series::new(MONTH.into(), month))?;
    df.with_column(Series::new(WEEK_OF_YEAR.into(), week_of_year))?;
    df.with_column(Series::new(ISO_YEAR.into(), iso_year))?;
    df.with_column(Series::new(WEEK_SIN.into(), week_sin))?;
    df.with_column(Series::new(WEEK_COS.into(), week_cos))?;
    Ok(())
}

/// Preprocess `panel` with explicit column names and Monday week starts
pub fn preprocess(panel: &DataFrame, id_cols: &[&str], date_col: &str, target_col: &str) -> Result<DataFrame> {
    PanelPreprocessor::with_columns(id_cols, date_col, target_col).preprocess(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanelError;
    use chrono::NaiveDate;

    fn create_test_dataframe() -> DataFrame {
        df!(
            "store_number" => &[2i64, 1, 1, 1],
            "product_number" => &[100i64, 200, 100, 100],
            "week" => &["2024-01-03", "2024-01-01", "2024-01-17", "2024-01-09"],
            "sales" => &[Some(5.0), None, Some(7.0), Some(3.0)]
        )
        .unwrap()
    }

    fn preprocessor() -> PanelPreprocessor {
        PanelPreprocessor::new(&PipelineConfig::default())
    }

    #[test]
    fn test_sorted_by_entity_then_week() {
        let out = preprocessor().preprocess(&create_test_dataframe()).unwrap();

        let stores = f64_values(&out, "store_number").unwrap();
        let products = f64_values(&out, "product_number").unwrap();
        assert_eq!(stores, vec![Some(1.0), Some(1.0), Some(1.0), Some(2.0)]);
        assert_eq!(products, vec![Some(100.0), Some(100.0), Some(200.0), Some(100.0)]);

        let weeks = week_values(&out, "week").unwrap();
        assert_eq!(weeks[0], NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(weeks[1], NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(weeks[3], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_missing_target_filled_with_zero() {
        let out = preprocessor().preprocess(&create_test_dataframe()).unwrap();
        let sales = f64_values(&out, "sales").unwrap();
        assert_eq!(sales, vec![Some(3.0), Some(7.0), Some(0.0), Some(5.0)]);
    }

    #[test]
    fn test_calendar_columns_attached() {
        let out = preprocessor().preprocess(&create_test_dataframe()).unwrap();
        for col in PipelineConfig::default().calendar_columns() {
            assert!(out.column(col).is_ok(), "missing {}", col);
        }
        let week_of_year = f64_values(&out, WEEK_OF_YEAR).unwrap();
        assert_eq!(week_of_year, vec![Some(2.0), Some(3.0), Some(1.0), Some(1.0)]);
    }

    #[test]
    fn test_input_not_mutated() {
        let raw = create_test_dataframe();
        let before = raw.clone();
        let _ = preprocessor().preprocess(&raw).unwrap();
        assert!(raw.equals_missing(&before));
    }

    #[test]
    fn test_same_week_timestamps_rejected() {
        let df = df!(
            "store_number" => &[1i64, 1],
            "product_number" => &[100i64, 100],
            "week" => &["2024-01-08", "2024-01-10"],
            "sales" => &[1.0, 2.0]
        )
        .unwrap();
        let err = preprocessor().preprocess(&df).unwrap_err();
        assert!(matches!(err, PanelError::DuplicateObservation { .. }));
    }

    #[test]
    fn test_missing_column() {
        let df = df!("store_number" => &[1i64], "week" => &["2024-01-08"]).unwrap();
        let err = preprocess(&df, &["store_number", "product_number"], "week", "sales").unwrap_err();
        assert!(matches!(err, PanelError::MissingRequiredColumn(_)));
    }

    #[test]
    fn test_bad_dates() {
        let df = df!(
            "store_number" => &[1i64],
            "product_number" => &[100i64],
            "week" => &["sometime"],
            "sales" => &[1.0]
        )
        .unwrap();
        let err = preprocessor().preprocess(&df).unwrap_err();
        assert!(matches!(err, PanelError::InvalidSchema(_)));
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let once = preprocessor().preprocess(&create_test_dataframe()).unwrap();
        let twice = preprocessor().preprocess(&once).unwrap();
        assert!(once.equals_missing(&twice));
    }
}
