//! Panel Features - leakage-safe weekly panel feature engineering
//!
//! This crate prepares an (entity x week) sales panel for a model that
//! forecasts `horizon` weeks ahead. Every target-derived feature of a row at
//! week t reads only target values observed at or before week t - horizon,
//! and evaluation rows are built in the same series as their history.
//!
//! # Modules
//!
//! - [`config`] - Pipeline configuration and column naming
//! - [`preprocessing`] - Week snapping, sorting, target fill, calendar columns, coverage
//! - [`timeseries`] - Lags, rolling windows, cross-sections, walk-forward folds
//! - [`assembler`] - Evaluation features with training history as context
//! - [`pipeline`] - Facade running the stages in order
//! - [`utils`] - Dense feature matrix export
//!
//! # Example
//!
//! ```ignore
//! use panel_features::prelude::*;
//!
//! let pipeline = FeaturePipeline::new(PipelineConfig::default().with_horizon(15))?;
//! let train_features = pipeline.training_features(&train)?;
//! let eval_features = pipeline.evaluation_features(&train, &eval)?;
//! ```

pub mod error;
pub mod config;

pub mod preprocessing;
pub mod timeseries;

pub mod assembler;
pub mod pipeline;

pub mod utils;

pub use error::{PanelError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PanelError, Result};

    // Configuration
    pub use crate::config::PipelineConfig;

    // Preprocessing
    pub use crate::preprocessing::{ColumnCoverage, CoverageWarning, FeatureCoverage, PanelPreprocessor};

    // Time series
    pub use crate::timeseries::{
        CalendarNormalizer, LeakageSafeFeatureBuilder, TimeSeriesSplit, WalkForwardSplit, WeekCalendar,
    };

    // Assembly
    pub use crate::assembler::EvaluationFeatureAssembler;
    pub use crate::pipeline::FeaturePipeline;

    // Export
    pub use crate::utils::FeatureMatrix;
}
