//! Week-based walk-forward validation over a feature panel

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::preprocessing::columns::week_values;
use chrono::{Duration, NaiveDate};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Row indices of one validation fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesSplit {
    /// Training indices
    pub train_indices: Vec<usize>,
    /// Test indices
    pub test_indices: Vec<usize>,
    /// Fold number, earliest fold first
    pub fold: usize,
}

/// Walk-forward splitter over distinct panel weeks
///
/// Each fold validates on a block of `test_weeks` consecutive panel weeks and
/// trains on every earlier week that ends more than `gap_weeks` calendar weeks
/// before the block, mirroring a forecast made `gap_weeks` ahead.
#[derive(Debug, Clone)]
pub struct WalkForwardSplit {
    /// Number of folds
    n_splits: usize,
    /// Distinct weeks per test block
    test_weeks: usize,
    /// Calendar weeks kept out between train and test
    gap_weeks: usize,
    /// Sliding training window in calendar weeks (None = expanding)
    max_train_weeks: Option<usize>,
}

impl WalkForwardSplit {
    /// Create a splitter with no gap
    pub fn new(n_splits: usize, test_weeks: usize) -> Self {
        Self {
            n_splits: n_splits.max(1),
            test_weeks: test_weeks.max(1),
            gap_weeks: 0,
            max_train_weeks: None,
        }
    }

    /// Splitter whose gap equals the configured forecast horizon
    pub fn for_horizon(config: &PipelineConfig, n_splits: usize) -> Self {
        Self::new(n_splits, config.horizon).with_gap(config.horizon)
    }

    /// Set gap between train and test
    pub fn with_gap(mut self, gap_weeks: usize) -> Self {
        self.gap_weeks = gap_weeks;
        self
    }

    /// Use a sliding training window
    pub fn with_max_train_weeks(mut self, weeks: usize) -> Self {
        self.max_train_weeks = Some(weeks.max(1));
        self
    }

    /// Generate folds for a panel's date column
    pub fn split(&self, panel: &DataFrame, date_col: &str) -> Result<Vec<TimeSeriesSplit>> {
        Ok(self.split_weeks(&week_values(panel, date_col)?))
    }

    /// Generate folds for row-aligned weeks
    pub fn split_weeks(&self, weeks: &[NaiveDate]) -> Vec<TimeSeriesSplit> {
        let mut distinct: Vec<NaiveDate> = weeks.to_vec();
        distinct.sort_unstable();
        distinct.dedup();

        let mut splits = Vec::new();
        for fold in 0..self.n_splits {
            let Some(test_end) = distinct.len().checked_sub(fold * self.test_weeks) else {
                break;
            };
            let Some(test_start) = test_end.checked_sub(self.test_weeks) else {
                break;
            };
            if test_start == 0 {
                break;
            }

            let first_test = distinct[test_start];
            let last_test = distinct[test_end - 1];
            let train_end = first_test - Duration::weeks(self.gap_weeks as i64);
            let train_start = self
                .max_train_weeks
                .map(|w| train_end - Duration::weeks(w as i64));

            let train_indices: Vec<usize> = weeks
                .iter()
                .enumerate()
                .filter(|&(_, &w)| w < train_end && train_start.map_or(true, |s| w >= s))
                .map(|(i, _)| i)
                .collect();
            if train_indices.is_empty() {
                continue;
            }

            let test_indices: Vec<usize> = weeks
                .iter()
                .enumerate()
                .filter(|&(_, &w)| w >= first_test && w <= last_test)
                .map(|(i, _)| i)
                .collect();

            splits.push(TimeSeriesSplit {
                train_indices,
                test_indices,
                fold: 0,
            });
        }

        splits.reverse();
        for (fold, split) in splits.iter_mut().enumerate() {
            split.fold = fold;
        }
        splits
    }
}
