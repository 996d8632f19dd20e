//! Utility functions and types

mod matrix;

pub use matrix::FeatureMatrix;
