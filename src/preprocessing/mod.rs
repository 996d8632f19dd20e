//! Data preprocessing module
//!
//! Turns raw weekly observations into the sorted panel the feature builder
//! expects, and reports on feature coverage afterwards.

pub mod columns;
mod pipeline;
pub mod quality;

pub use pipeline::{preprocess, PanelPreprocessor};
pub use quality::{ColumnCoverage, CoverageWarning, FeatureCoverage};
