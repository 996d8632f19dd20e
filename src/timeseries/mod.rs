//! Time series module
//!
//! Provides the weekly panel feature engineering:
//! - Week snapping and calendar attributes
//! - Per-entity lag and rolling features on the horizon-shifted target
//! - Seasonal and store-level cross-sections
//! - Walk-forward validation folds

pub mod calendar;
mod cross_section;
mod features;
mod transforms;
mod validation;

pub use calendar::{CalendarNormalizer, WeekCalendar};
pub use cross_section::{group_week_total, seasonal_average};
pub use features::{build_features, LeakageSafeFeatureBuilder};
pub use transforms::{
    guarded_ratio, log_return, rolling, shift, EntityGroup, EntityKey, EntityPartition, RollingStat,
};
pub use validation::{TimeSeriesSplit, WalkForwardSplit};
