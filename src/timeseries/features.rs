//! Leakage-safe feature engineering
//!
//! Every target-derived feature at week t is computed from target values at
//! least `horizon` observations (and therefore at least `horizon` weeks) older
//! than t. Lags and rolling windows are computed per entity on the shifted
//! series; cross-sectional aggregates are computed afterwards over those
//! shifted values only.

use crate::config::{
    PipelineConfig, CAT_SEASONAL_AVG, DEPT_SEASONAL_AVG, PERF_VS_STORE, PROD_STORE_SHARE,
    STORE_SEASONAL_AVG, VELOCITY, WEEKS_SINCE_START, YOY_GROWTH,
};
use crate::error::{PanelError, Result};
use crate::preprocessing::columns::{entity_keys, f64_values, require_columns, string_values, week_values};
use super::calendar::CalendarNormalizer;
use super::cross_section::{group_week_total, seasonal_average};
use super::transforms::{guarded_ratio, log_return, rolling, shift, EntityGroup, EntityPartition, RollingStat};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Target-derived series of one entity, aligned with its rows
#[derive(Debug, Clone, Default)]
struct EntitySeries {
    lag_horizon: Vec<Option<f64>>,
    lag_next: Vec<Option<f64>>,
    lag_seasonal: Vec<Option<f64>>,
    rolling_mean_short: Vec<Option<f64>>,
    rolling_std_short: Vec<Option<f64>>,
    rolling_mean_long: Vec<Option<f64>>,
    log_return: Vec<Option<f64>>,
}

/// Builds the engineered feature columns for a preprocessed panel
#[derive(Debug, Clone)]
pub struct LeakageSafeFeatureBuilder {
    config: PipelineConfig,
}

impl LeakageSafeFeatureBuilder {
    /// Create a builder with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the columns `build_features` adds
    pub fn feature_names(&self) -> Vec<String> {
        self.config.feature_names()
    }

    /// Compute every feature column and return a new panel carrying them
    ///
    /// The panel must come out of the preprocessor: weeks as `Date`, sorted by
    /// (entity, week). Existing feature columns are replaced, so running the
    /// builder on its own output reproduces it.
    pub fn build_features(&self, panel: &DataFrame) -> Result<DataFrame> {
        let start = Instant::now();
        let config = &self.config;

        // Fail fast: configuration, schema, horizon and ordering
        config.validate()?;
        require_columns(panel, &config.required_columns())?;

        let weeks = week_values(panel, &config.date_col)?;
        let span_weeks = self.check_horizon(&weeks)?;
        let keys = entity_keys(panel, &config.id_cols)?;
        let partition = EntityPartition::from_sorted(&keys, &weeks)?;
        let target = f64_values(panel, &config.target_col)?;
        let stores = string_values(panel, &config.store_col)?;
        let categories = string_values(panel, &config.category_col)?;
        let departments = string_values(panel, &config.department_col)?;

        debug!(
            rows = panel.height(),
            entities = partition.len(),
            horizon = config.horizon,
            span_weeks,
            "Building leakage-safe features"
        );

        // Pass 1: per-entity shifts and rolling windows
        let per_entity = partition.map_groups(config.parallel, |group| self.entity_series(group, &target));
        let n = panel.height();
        let lag_horizon = partition.scatter(&per_entity, n, |s| s.lag_horizon.as_slice());
        let lag_next = partition.scatter(&per_entity, n, |s| s.lag_next.as_slice());
        let lag_seasonal = partition.scatter(&per_entity, n, |s| s.lag_seasonal.as_slice());
        let rolling_mean_short = partition.scatter(&per_entity, n, |s| s.rolling_mean_short.as_slice());
        let rolling_std_short = partition.scatter(&per_entity, n, |s| s.rolling_std_short.as_slice());
        let rolling_mean_long = partition.scatter(&per_entity, n, |s| s.rolling_mean_long.as_slice());
        let log_returns = partition.scatter(&per_entity, n, |s| s.log_return.as_slice());

        // Pass 2: cross-sections over the shifted target
        let week_of_year: Vec<u32> = weeks.iter().map(|w| w.iso_week().week()).collect();
        let store_seasonal = seasonal_average(&stores, &week_of_year, &weeks, &lag_horizon);
        let cat_seasonal = seasonal_average(&categories, &week_of_year, &weeks, &lag_horizon);
        let dept_seasonal = seasonal_average(&departments, &week_of_year, &weeks, &lag_horizon);
        let store_total = group_week_total(&stores, &weeks, &lag_horizon);

        let eps = config.epsilon;
        let velocity = guarded_ratio(&rolling_mean_short, &rolling_mean_long, eps);
        let store_share = guarded_ratio(&lag_horizon, &store_total, eps);
        let perf_vs_store = guarded_ratio(&lag_horizon, &store_seasonal, eps);
        let yoy_growth = guarded_ratio(&lag_horizon, &lag_seasonal, eps);

        let [lag_h, lag_h1, lag_season] = config.lags();
        let float_features: Vec<(String, Vec<Option<f64>>)> = vec![
            (config.lag_column(lag_h), lag_horizon),
            (config.lag_column(lag_h1), lag_next),
            (config.lag_column(lag_season), lag_seasonal),
            (config.rolling_mean_column(config.short_window), rolling_mean_short),
            (config.rolling_std_column(config.short_window), rolling_std_short),
            (config.rolling_mean_column(config.long_window), rolling_mean_long),
            (VELOCITY.to_string(), velocity),
            (STORE_SEASONAL_AVG.to_string(), store_seasonal),
            (CAT_SEASONAL_AVG.to_string(), cat_seasonal),
            (DEPT_SEASONAL_AVG.to_string(), dept_seasonal),
            (config.log_return_column(), log_returns),
            (PROD_STORE_SHARE.to_string(), store_share),
            (PERF_VS_STORE.to_string(), perf_vs_store),
            (YOY_GROWTH.to_string(), yoy_growth),
        ];

        let mut output = panel.clone();
        output.with_column(Series::new(WEEKS_SINCE_START.into(), weeks_since_start(&weeks)))?;
        for (name, mut values) in float_features {
            let neutralized = neutralize_non_finite(&mut values);
            if neutralized > 0 {
                warn!(column = %name, count = neutralized, "Non-finite feature values replaced by absent");
            }
            output.with_column(Series::new(name.as_str().into(), values))?;
        }

        info!(
            rows = output.height(),
            entities = partition.len(),
            features = config.feature_names().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature panel built"
        );
        Ok(output)
    }

    /// Horizon must fit inside the panel's week span
    fn check_horizon(&self, weeks: &[NaiveDate]) -> Result<i64> {
        let horizon = self.config.horizon;
        let (Some(first), Some(last)) = (weeks.iter().min(), weeks.iter().max()) else {
            return Err(PanelError::InvalidSchema("panel has no rows".to_string()));
        };
        let span_weeks = CalendarNormalizer::weeks_between(*first, *last);
        if horizon as i64 > span_weeks {
            return Err(PanelError::InvalidHorizon {
                horizon,
                span_weeks,
                reason: "every lag feature would be absent".to_string(),
            });
        }
        Ok(span_weeks)
    }

    fn entity_series(&self, group: &EntityGroup, target: &[Option<f64>]) -> EntitySeries {
        let config = &self.config;
        let series = group.slice(target);
        let [lag_h, lag_h1, lag_season] = config.lags();

        let lag_horizon = shift(series, lag_h);
        let lag_next = shift(series, lag_h1);
        let lag_seasonal = shift(series, lag_season);

        EntitySeries {
            rolling_mean_short: rolling(&lag_horizon, config.short_window, RollingStat::Mean),
            rolling_std_short: rolling(&lag_horizon, config.short_window, RollingStat::Std),
            rolling_mean_long: rolling(&lag_horizon, config.long_window, RollingStat::Mean),
            log_return: log_return(&lag_horizon, &lag_next),
            lag_horizon,
            lag_next,
            lag_seasonal,
        }
    }
}

/// Whole weeks since the panel's earliest week
fn weeks_since_start(weeks: &[NaiveDate]) -> Vec<i64> {
    match weeks.iter().min() {
        Some(&first) => weeks
            .iter()
            .map(|&week| CalendarNormalizer::weeks_between(first, week))
            .collect(),
        None => Vec::new(),
    }
}

/// Replace NaN and infinities by `None`, returning how many were replaced
fn neutralize_non_finite(values: &mut [Option<f64>]) -> usize {
    let mut count = 0;
    for value in values.iter_mut() {
        if matches!(value, Some(v) if !v.is_finite()) {
            *value = None;
            count += 1;
        }
    }
    count
}

/// Build features for a preprocessed panel with the given configuration
pub fn build_features(panel: &DataFrame, config: &PipelineConfig) -> Result<DataFrame> {
    LeakageSafeFeatureBuilder::new(config.clone()).build_features(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::PanelPreprocessor;

    /// One entity with `n` consecutive weeks and target = week index (1-based)
    fn ramp_panel(n: usize) -> DataFrame {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let weeks: Vec<String> = (0..n)
            .map(|i| (start + chrono::Duration::weeks(i as i64)).to_string())
            .collect();
        let sales: Vec<f64> = (1..=n).map(|i| i as f64).collect();
        df!(
            "store_number" => vec![1i64; n],
            "product_number" => vec![100i64; n],
            "week" => weeks,
            "sales" => sales,
            "product_category" => vec!["cat"; n],
            "department_group" => vec!["dept"; n]
        )
        .unwrap()
    }

    fn features(panel: &DataFrame, config: &PipelineConfig) -> DataFrame {
        let pre = PanelPreprocessor::new(config).preprocess(panel).unwrap();
        build_features(&pre, config).unwrap()
    }

    #[test]
    fn test_lag_and_rolling_scenario() {
        let config = PipelineConfig::default();
        let out = features(&ramp_panel(60), &config);

        let lag = f64_values(&out, "sales_lag_15").unwrap();
        assert_eq!(lag[59], Some(45.0));
        assert_eq!(lag[14], None);
        assert_eq!(lag[15], Some(1.0));

        let mean4 = f64_values(&out, "rolling_mean_4wk").unwrap();
        assert!((mean4[59].unwrap() - 43.5).abs() < 1e-12);
        // Week 19 (index 18) is the first full window
        assert!(mean4[..18].iter().all(Option::is_none));
        assert!((mean4[18].unwrap() - 2.5).abs() < 1e-12);

        let std4 = f64_values(&out, "rolling_std_4wk").unwrap();
        assert!((std4[59].unwrap() - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);

        let mean12 = f64_values(&out, "rolling_mean_12wk").unwrap();
        assert!((mean12[59].unwrap() - 39.5).abs() < 1e-12);
        let velocity = f64_values(&out, VELOCITY).unwrap();
        assert!((velocity[59].unwrap() - 43.5 / (39.5 + 1e-6)).abs() < 1e-12);
    }

    #[test]
    fn test_weeks_since_start_and_log_return() {
        let config = PipelineConfig::default();
        let out = features(&ramp_panel(20), &config);

        let since = f64_values(&out, WEEKS_SINCE_START).unwrap();
        assert_eq!(since[0], Some(0.0));
        assert_eq!(since[19], Some(19.0));

        let ret = f64_values(&out, "sales_log_return").unwrap();
        assert_eq!(ret[15], None);
        // shift(15) = 2, shift(16) = 1 at index 16
        assert!((ret[16].unwrap() - (3.0_f64.ln() - 2.0_f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_year_ago_lag_absent_on_short_history() {
        let config = PipelineConfig::default();
        let out = features(&ramp_panel(40), &config);

        let lag52 = f64_values(&out, "sales_lag_52").unwrap();
        assert!(lag52.iter().all(Option::is_none));
        let yoy = f64_values(&out, YOY_GROWTH).unwrap();
        assert!(yoy.iter().all(Option::is_none));
    }

    #[test]
    fn test_horizon_longer_than_span() {
        let config = PipelineConfig::default().with_horizon(30);
        let pre = PanelPreprocessor::new(&config).preprocess(&ramp_panel(20)).unwrap();
        let err = build_features(&pre, &config).unwrap_err();
        assert!(matches!(err, PanelError::InvalidHorizon { horizon: 30, span_weeks: 19, .. }));
    }

    #[test]
    fn test_zero_horizon() {
        let config = PipelineConfig::default();
        let pre = PanelPreprocessor::new(&config).preprocess(&ramp_panel(20)).unwrap();
        let err = build_features(&pre, &config.with_horizon(0)).unwrap_err();
        assert!(matches!(err, PanelError::InvalidHorizon { horizon: 0, .. }));
    }

    #[test]
    fn test_missing_grouping_column() {
        let config = PipelineConfig::default();
        let pre = PanelPreprocessor::new(&config).preprocess(&ramp_panel(20)).unwrap();
        let without = pre.drop("department_group").unwrap();
        let err = build_features(&without, &config).unwrap_err();
        assert!(matches!(err, PanelError::MissingRequiredColumn(ref c) if c == "department_group"));
    }

    #[test]
    fn test_raw_panel_rejected() {
        let config = PipelineConfig::default();
        let err = build_features(&ramp_panel(20), &config).unwrap_err();
        assert!(matches!(err, PanelError::InvalidSchema(_)));
    }

    #[test]
    fn test_non_finite_values_become_absent() {
        let mut values = vec![Some(1.0), Some(f64::NAN), None, Some(f64::INFINITY)];
        assert_eq!(neutralize_non_finite(&mut values), 2);
        assert_eq!(values, vec![Some(1.0), None, None, None]);
    }

    #[test]
    fn test_negative_targets_do_not_leak_nan() {
        let config = PipelineConfig::default().with_horizon(2);
        let mut panel = ramp_panel(6);
        panel
            .with_column(Series::new("sales".into(), &[-5.0, 1.0, 2.0, 3.0, 4.0, 5.0]))
            .unwrap();
        let out = features(&panel, &config);

        let ret = f64_values(&out, "sales_log_return").unwrap();
        // log1p(-5) is NaN at index 3 (shift 2 reads row 1, shift 3 reads row 0)
        assert_eq!(ret[3], None);
        assert!(ret[4].is_some());
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let parallel = PipelineConfig::default().with_horizon(3);
        let sequential = parallel.clone().with_parallel(false);
        let a = features(&ramp_panel(30), &parallel);
        let b = features(&ramp_panel(30), &sequential);
        assert!(a.equals_missing(&b));
    }
}
