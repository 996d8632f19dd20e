//! Evaluation feature assembly
//!
//! Evaluation rows have no target, yet their lags and rolling windows reach
//! back into the training history. The assembler runs the whole pipeline once
//! over the tagged union of both panels and keeps only the evaluation slice.

use crate::config::PipelineConfig;
use crate::error::{PanelError, Result};
use crate::preprocessing::columns::{date_series, f64_values, parse_dates, require_columns};
use crate::preprocessing::PanelPreprocessor;
use crate::timeseries::{CalendarNormalizer, LeakageSafeFeatureBuilder};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Row origin marker carried through the union run
pub const ORIGIN_COLUMN: &str = "is_evaluation";

/// Builds evaluation features with the training history as context
#[derive(Debug, Clone)]
pub struct EvaluationFeatureAssembler {
    config: PipelineConfig,
}

impl EvaluationFeatureAssembler {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Feature panel for the evaluation rows only, without target or origin tag
    pub fn assemble(&self, train: &DataFrame, eval: &DataFrame) -> Result<DataFrame> {
        let union = self.union(train, eval)?;

        let preprocessed = PanelPreprocessor::new(&self.config).preprocess(&union)?;
        let features = LeakageSafeFeatureBuilder::new(self.config.clone()).build_features(&preprocessed)?;

        let mask = features
            .column(ORIGIN_COLUMN)?
            .as_materialized_series()
            .bool()?
            .clone();
        let evaluation = features
            .filter(&mask)?
            .drop(ORIGIN_COLUMN)?
            .drop(&self.config.target_col)?;

        info!(
            train_rows = train.height(),
            eval_rows = evaluation.height(),
            "Evaluation features assembled"
        );
        Ok(evaluation)
    }

    /// Tagged union of both panels, evaluation targets set to null
    ///
    /// The union carries every column of either panel, null where a panel
    /// lacks it; shared columns take the training dtype. Duplicate
    /// (entity, week) pairs across the two panels are rejected later by the
    /// preprocessor.
    pub fn union(&self, train: &DataFrame, eval: &DataFrame) -> Result<DataFrame> {
        self.config.validate()?;
        require_columns(train, &self.config.required_columns())?;
        let eval_required: Vec<&str> = self
            .config
            .required_columns()
            .into_iter()
            .filter(|col| *col != self.config.target_col)
            .collect();
        require_columns(eval, &eval_required)?;
        if train.column(ORIGIN_COLUMN).is_ok() {
            return Err(PanelError::InvalidSchema(format!(
                "training panel already has a '{}' column",
                ORIGIN_COLUMN
            )));
        }

        let mut train_tagged = self.tag(train, false)?;
        let eval_tagged = self.tag(eval, true)?;
        self.check_eval_window(&train_tagged, &eval_tagged)?;

        // Evaluation-only columns (e.g. a submission row id) survive as nulls on training rows
        let mut eval_only = 0;
        for column in eval_tagged.get_columns() {
            if train_tagged.column(column.name().as_str()).is_err() {
                train_tagged.with_column(Series::full_null(
                    column.name().clone(),
                    train_tagged.height(),
                    column.dtype(),
                ))?;
                eval_only += 1;
            }
        }
        if eval_only > 0 {
            debug!(columns = eval_only, "Evaluation-only columns carried into the union");
        }

        let mut aligned: Vec<Column> = Vec::with_capacity(train_tagged.width());
        for column in train_tagged.get_columns() {
            let name = column.name().as_str();
            let series = match eval_tagged.column(name) {
                Ok(existing) => existing.as_materialized_series().cast(column.dtype())?,
                Err(_) => Series::full_null(name.into(), eval_tagged.height(), column.dtype()),
            };
            aligned.push(series.into());
        }

        Ok(train_tagged.vstack(&DataFrame::new(aligned)?)?)
    }

    /// Normalise date and target dtypes and attach the origin tag
    fn tag(&self, panel: &DataFrame, evaluation: bool) -> Result<DataFrame> {
        let config = &self.config;
        let height = panel.height();
        let mut tagged = panel.clone();

        tagged.with_column(date_series(&config.date_col, &parse_dates(panel, &config.date_col)?)?)?;
        let target = if evaluation {
            Series::full_null(config.target_col.as_str().into(), height, &DataType::Float64)
        } else {
            Series::new(config.target_col.as_str().into(), f64_values(panel, &config.target_col)?)
        };
        tagged.with_column(target)?;
        tagged.with_column(Series::new(ORIGIN_COLUMN.into(), vec![evaluation; height]))?;
        Ok(tagged)
    }

    /// Warn when evaluation rows would read zero-filled evaluation targets
    fn check_eval_window(&self, train: &DataFrame, eval: &DataFrame) -> Result<()> {
        let calendar = CalendarNormalizer::new(self.config.week_start);
        let last_train = parse_dates(train, &self.config.date_col)?
            .into_iter()
            .map(|d| calendar.snap(d))
            .max();
        let last_eval = parse_dates(eval, &self.config.date_col)?
            .into_iter()
            .map(|d| calendar.snap(d))
            .max();

        if let (Some(last_train), Some(last_eval)) = (last_train, last_eval) {
            let ahead = CalendarNormalizer::weeks_between(last_train, last_eval);
            if ahead > self.config.horizon as i64 {
                warn!(
                    weeks_ahead = ahead,
                    horizon = self.config.horizon,
                    "Evaluation window extends past the horizon; late rows read zero-filled evaluation targets"
                );
            }
        }
        Ok(())
    }
}

/// Assemble evaluation features with the given configuration
pub fn assemble(train: &DataFrame, eval: &DataFrame, config: &PipelineConfig) -> Result<DataFrame> {
    EvaluationFeatureAssembler::new(config.clone()).assemble(train, eval)
}
