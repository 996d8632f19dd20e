//! Feature pipeline facade
//!
//! Owns one configuration and runs the stages in order for both the training
//! panel and the evaluation panel.

use crate::assembler::EvaluationFeatureAssembler;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::preprocessing::{FeatureCoverage, PanelPreprocessor};
use crate::timeseries::{LeakageSafeFeatureBuilder, TimeSeriesSplit, WalkForwardSplit};
use crate::utils::FeatureMatrix;
use polars::prelude::DataFrame;
use tracing::info;

/// Preprocess, build and assemble weekly panel features
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    config: PipelineConfig,
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }
}

impl FeaturePipeline {
    /// Create a pipeline, validating the configuration up front
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn horizon(&self) -> usize {
        self.config.horizon
    }

    pub fn id_cols(&self) -> &[String] {
        &self.config.id_cols
    }

    pub fn date_col(&self) -> &str {
        &self.config.date_col
    }

    pub fn target_col(&self) -> &str {
        &self.config.target_col
    }

    /// Engineered column names
    pub fn feature_names(&self) -> Vec<String> {
        self.config.feature_names()
    }

    /// Training feature panel: target kept for model fitting
    pub fn training_features(&self, train: &DataFrame) -> Result<DataFrame> {
        let preprocessed = PanelPreprocessor::new(&self.config).preprocess(train)?;
        let features = LeakageSafeFeatureBuilder::new(self.config.clone()).build_features(&preprocessed)?;
        info!(rows = features.height(), "Training features ready");
        Ok(features)
    }

    /// Evaluation feature panel built with the training history as context
    pub fn evaluation_features(&self, train: &DataFrame, eval: &DataFrame) -> Result<DataFrame> {
        EvaluationFeatureAssembler::new(self.config.clone()).assemble(train, eval)
    }

    /// Present/absent counts of every engineered column
    pub fn coverage(&self, features: &DataFrame) -> Result<FeatureCoverage> {
        FeatureCoverage::compute(features, &self.config.feature_names())
    }

    /// Engineered columns as a dense matrix plus presence mask
    pub fn feature_matrix(&self, features: &DataFrame) -> Result<FeatureMatrix> {
        FeatureMatrix::from_panel(features, &self.config.feature_names())
    }

    /// Walk-forward folds whose gap equals the horizon
    pub fn walk_forward(&self, features: &DataFrame, n_splits: usize) -> Result<Vec<TimeSeriesSplit>> {
        WalkForwardSplit::for_horizon(&self.config, n_splits).split(features, &self.config.date_col)
    }
}
