//! Pipeline configuration

use crate::error::{PanelError, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Feature columns whose names do not depend on configuration
pub const WEEKS_SINCE_START: &str = "weeks_since_start";
pub const VELOCITY: &str = "velocity";
pub const STORE_SEASONAL_AVG: &str = "store_seasonal_avg";
pub const CAT_SEASONAL_AVG: &str = "cat_seasonal_avg";
pub const DEPT_SEASONAL_AVG: &str = "dept_seasonal_avg";
pub const PROD_STORE_SHARE: &str = "prod_store_share";
pub const PERF_VS_STORE: &str = "perf_vs_store";
pub const YOY_GROWTH: &str = "yoy_growth";

/// Calendar columns attached by the preprocessor
pub const MONTH: &str = "month";
pub const WEEK_OF_YEAR: &str = "week_of_year";
pub const ISO_YEAR: &str = "iso_year";
pub const WEEK_SIN: &str = "week_sin";
pub const WEEK_COS: &str = "week_cos";

/// Configuration shared by every pipeline stage
///
/// A run borrows the configuration immutably from start to finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Columns forming the entity key, in sort order
    pub id_cols: Vec<String>,

    /// Date column, snapped to week starts during preprocessing
    pub date_col: String,

    /// Target column (weekly sales)
    pub target_col: String,

    /// Grouping column for store-level seasonality and share
    pub store_col: String,

    /// Grouping column for category-level seasonality
    pub category_col: String,

    /// Grouping column for department-level seasonality
    pub department_col: String,

    /// Forecast horizon in weeks: minimum age of any target value a feature reads
    pub horizon: usize,

    /// Short rolling window (weeks)
    pub short_window: usize,

    /// Long rolling window (weeks)
    pub long_window: usize,

    /// Year-ago lag
    pub seasonal_lag: usize,

    /// First day of the canonical week
    pub week_start: Weekday,

    /// Additive guard for every ratio denominator
    pub epsilon: f64,

    /// Compute per-entity series on the rayon pool
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            id_cols: vec!["store_number".to_string(), "product_number".to_string()],
            date_col: "week".to_string(),
            target_col: "sales".to_string(),
            store_col: "store_number".to_string(),
            category_col: "product_category".to_string(),
            department_col: "department_group".to_string(),
            horizon: 15,
            short_window: 4,
            long_window: 12,
            seasonal_lag: 52,
            week_start: Weekday::Mon,
            epsilon: 1e-6,
            parallel: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the entity key columns
    pub fn with_id_cols<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
        self.id_cols = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the date column
    pub fn with_date_col(mut self, col: impl Into<String>) -> Self {
        self.date_col = col.into();
        self
    }

    /// Builder method to set the target column
    pub fn with_target_col(mut self, col: impl Into<String>) -> Self {
        self.target_col = col.into();
        self
    }

    /// Builder method to set the store, category and department grouping columns
    pub fn with_group_cols(
        mut self,
        store: impl Into<String>,
        category: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        self.store_col = store.into();
        self.category_col = category.into();
        self.department_col = department.into();
        self
    }

    /// Builder method to set the forecast horizon
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Builder method to set the rolling windows
    pub fn with_windows(mut self, short_window: usize, long_window: usize) -> Self {
        self.short_window = short_window;
        self.long_window = long_window;
        self
    }

    /// Builder method to set the year-ago lag
    pub fn with_seasonal_lag(mut self, lag: usize) -> Self {
        self.seasonal_lag = lag;
        self
    }

    /// Builder method to set the first day of the week
    pub fn with_week_start(mut self, weekday: Weekday) -> Self {
        self.week_start = weekday;
        self
    }

    /// Builder method to toggle parallel per-entity computation
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check the configuration before a run starts
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(PanelError::InvalidHorizon {
                horizon: 0,
                span_weeks: 0,
                reason: "horizon must be at least one week".to_string(),
            });
        }
        if self.id_cols.is_empty() {
            return Err(PanelError::ConfigError("id_cols must not be empty".to_string()));
        }
        if self.short_window == 0 || self.long_window == 0 {
            return Err(PanelError::ConfigError("rolling windows must be positive".to_string()));
        }
        if self.short_window > self.long_window {
            return Err(PanelError::ConfigError(format!(
                "short_window ({}) exceeds long_window ({})",
                self.short_window, self.long_window
            )));
        }
        // The year-ago lag must stay older than t - horizon and distinct from the H and H+1 lags
        let next_lag = self.horizon.saturating_add(1);
        if self.seasonal_lag <= next_lag {
            return Err(PanelError::ConfigError(format!(
                "seasonal_lag ({}) must exceed horizon + 1 ({})",
                self.seasonal_lag, next_lag
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(PanelError::ConfigError(format!(
                "epsilon must be positive and finite, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Lag set: the horizon, its predecessor and the year-ago lag
    pub fn lags(&self) -> [usize; 3] {
        [self.horizon, self.horizon + 1, self.seasonal_lag]
    }

    pub fn lag_column(&self, lag: usize) -> String {
        format!("{}_lag_{}", self.target_col, lag)
    }

    pub fn rolling_mean_column(&self, window: usize) -> String {
        format!("rolling_mean_{}wk", window)
    }

    pub fn rolling_std_column(&self, window: usize) -> String {
        format!("rolling_std_{}wk", window)
    }

    pub fn log_return_column(&self) -> String {
        format!("{}_log_return", self.target_col)
    }

    /// Columns the raw panel must carry
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.id_cols.iter().map(String::as_str).collect();
        for col in [
            &self.date_col,
            &self.target_col,
            &self.store_col,
            &self.category_col,
            &self.department_col,
        ] {
            if !cols.contains(&col.as_str()) {
                cols.push(col.as_str());
            }
        }
        cols
    }

    /// Calendar columns attached during preprocessing
    pub fn calendar_columns(&self) -> [&'static str; 5] {
        [MONTH, WEEK_OF_YEAR, ISO_YEAR, WEEK_SIN, WEEK_COS]
    }

    /// Names of every engineered column, in output order
    pub fn feature_names(&self) -> Vec<String> {
        let [lag_h, lag_h1, lag_season] = self.lags();
        vec![
            WEEKS_SINCE_START.to_string(),
            self.lag_column(lag_h),
            self.lag_column(lag_h1),
            self.lag_column(lag_season),
            self.rolling_mean_column(self.short_window),
            self.rolling_std_column(self.short_window),
            self.rolling_mean_column(self.long_window),
            VELOCITY.to_string(),
            STORE_SEASONAL_AVG.to_string(),
            CAT_SEASONAL_AVG.to_string(),
            DEPT_SEASONAL_AVG.to_string(),
            self.log_return_column(),
            PROD_STORE_SHARE.to_string(),
            PERF_VS_STORE.to_string(),
            YOY_GROWTH.to_string(),
        ]
    }

    /// Parse a configuration from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.horizon, 15);
        assert_eq!(config.lags(), [15, 16, 52]);
        assert_eq!(config.required_columns().len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new()
            .with_id_cols(["store", "sku"])
            .with_target_col("units")
            .with_horizon(8)
            .with_windows(3, 6)
            .with_parallel(false);

        assert_eq!(config.id_cols, vec!["store", "sku"]);
        assert_eq!(config.lag_column(8), "units_lag_8");
        assert_eq!(config.rolling_mean_column(3), "rolling_mean_3wk");
        assert!(!config.parallel);
    }

    #[test]
    fn test_feature_names() {
        let names = PipelineConfig::default().feature_names();
        assert_eq!(names.len(), 15);
        assert_eq!(names[1], "sales_lag_15");
        assert_eq!(names[2], "sales_lag_16");
        assert_eq!(names[3], "sales_lag_52");
        assert!(names.contains(&"rolling_std_4wk".to_string()));
        assert!(names.contains(&"sales_log_return".to_string()));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let err = PipelineConfig::default().with_horizon(0).validate().unwrap_err();
        assert!(matches!(err, PanelError::InvalidHorizon { horizon: 0, .. }));
    }

    #[test]
    fn test_invalid_windows_rejected() {
        let config = PipelineConfig::default().with_windows(12, 4);
        assert!(matches!(config.validate(), Err(PanelError::ConfigError(_))));

        let config = PipelineConfig { epsilon: 0.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(PanelError::ConfigError(_))));
    }

    #[test]
    fn test_seasonal_lag_must_exceed_horizon() {
        let config = PipelineConfig::default().with_horizon(60);
        assert!(matches!(config.validate(), Err(PanelError::ConfigError(_))));

        // Equal to H + 1 would collide with the next-step lag column
        let config = PipelineConfig::default().with_horizon(51);
        assert!(matches!(config.validate(), Err(PanelError::ConfigError(_))));

        let config = PipelineConfig::default().with_horizon(60).with_seasonal_lag(104);
        assert!(config.validate().is_ok());
        assert!(PipelineConfig::default().with_horizon(50).validate().is_ok());
    }

    #[test]
    fn test_json_partial_config() {
        let config = PipelineConfig::from_json(r#"{"horizon": 4, "week_start": "Sun"}"#).unwrap();
        assert_eq!(config.horizon, 4);
        assert_eq!(config.week_start, Weekday::Sun);
        assert_eq!(config.target_col, "sales");

        let json = config.to_json().unwrap();
        assert_eq!(PipelineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_json_rejects_invalid_horizon() {
        assert!(PipelineConfig::from_json(r#"{"horizon": 0}"#).is_err());
        assert!(matches!(
            PipelineConfig::from_json(r#"{"horizon": -3}"#),
            Err(PanelError::SerializationError(_))
        ));
    }
}
