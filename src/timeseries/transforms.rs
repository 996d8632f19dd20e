//! Per-entity series transformations
//!
//! Every series here is a `[Option<f64>]` aligned with one entity's rows in time
//! order. `None` marks a value that cannot be computed from the available
//! history and is never replaced by zero.

use crate::error::{PanelError, Result};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

/// Rolling statistics types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RollingStat {
    Mean,
    /// Sample standard deviation (n - 1)
    Std,
}

/// Value `k` observations earlier in the same series
pub fn shift(series: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    let n = series.len();
    let mut result = vec![None; n];
    for i in k..n {
        result[i] = series[i - k];
    }
    result
}

/// Trailing-window statistic; absent unless the whole window is present
pub fn rolling(series: &[Option<f64>], window: usize, stat: RollingStat) -> Vec<Option<f64>> {
    let n = series.len();
    let mut result = vec![None; n];
    if window == 0 {
        return result;
    }

    for i in (window - 1)..n {
        let values: Option<Vec<f64>> = series[i + 1 - window..=i].iter().copied().collect();
        if let Some(values) = values {
            result[i] = window_stat(&values, stat);
        }
    }
    result
}

fn window_stat(values: &[f64], stat: RollingStat) -> Option<f64> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    match stat {
        RollingStat::Mean => Some(mean),
        RollingStat::Std => {
            if values.len() < 2 {
                return None;
            }
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            Some(variance.sqrt())
        }
    }
}

/// `log1p(current) - log1p(previous)` where both are present
pub fn log_return(current: &[Option<f64>], previous: &[Option<f64>]) -> Vec<Option<f64>> {
    current
        .iter()
        .zip(previous)
        .map(|(c, p)| Some((*c)?.ln_1p() - (*p)?.ln_1p()))
        .collect()
}

/// Epsilon-guarded ratio of two aligned columns
pub fn guarded_ratio(numerator: &[Option<f64>], denominator: &[Option<f64>], epsilon: f64) -> Vec<Option<f64>> {
    numerator
        .iter()
        .zip(denominator)
        .map(|(n, d)| Some((*n)? / ((*d)? + epsilon)))
        .collect()
}

/// Composite entity identifier, one string per id column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(pub Vec<String>);

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// One entity's contiguous rows in a sorted panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityGroup {
    pub key: EntityKey,
    pub rows: Range<usize>,
}

impl EntityGroup {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// This entity's slice of a panel-aligned column
    pub fn slice<'a, T>(&self, column: &'a [T]) -> &'a [T] {
        &column[self.rows.clone()]
    }
}

/// Partition of a sorted panel into entity groups
///
/// Built from the row order only: every entity must occupy one contiguous
/// block with strictly increasing weeks.
#[derive(Debug, Clone, Default)]
pub struct EntityPartition {
    groups: Vec<EntityGroup>,
}

impl EntityPartition {
    /// Partition rows already sorted by (entity, week)
    pub fn from_sorted(keys: &[EntityKey], weeks: &[NaiveDate]) -> Result<Self> {
        if keys.len() != weeks.len() {
            return Err(PanelError::ShapeError {
                expected: format!("{} weeks", keys.len()),
                actual: format!("{} weeks", weeks.len()),
            });
        }

        let mut groups: Vec<EntityGroup> = Vec::new();
        let mut seen: HashSet<&EntityKey> = HashSet::new();

        for (i, key) in keys.iter().enumerate() {
            let continues = groups.last().map_or(false, |g| &g.key == key);
            if continues {
                let (prev, curr) = (weeks[i - 1], weeks[i]);
                if curr == prev {
                    return Err(PanelError::DuplicateObservation {
                        entity: key.to_string(),
                        week: curr.to_string(),
                    });
                }
                if curr < prev {
                    return Err(PanelError::InvalidSchema(format!(
                        "panel is not sorted by week for entity {}",
                        key
                    )));
                }
                if let Some(group) = groups.last_mut() {
                    group.rows.end = i + 1;
                }
            } else {
                if !seen.insert(key) {
                    return Err(PanelError::InvalidSchema(format!(
                        "rows of entity {} are not contiguous; sort the panel first",
                        key
                    )));
                }
                groups.push(EntityGroup {
                    key: key.clone(),
                    rows: i..i + 1,
                });
            }
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[EntityGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Apply `f` to every group, on the rayon pool when `parallel` is set
    ///
    /// Results keep group order either way.
    pub fn map_groups<T, F>(&self, parallel: bool, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&EntityGroup) -> T + Sync + Send,
    {
        if parallel {
            self.groups.par_iter().map(&f).collect()
        } else {
            self.groups.iter().map(&f).collect()
        }
    }

    /// Scatter one field of the per-group results back into a panel-aligned column
    pub fn scatter<T, F>(&self, per_group: &[T], n_rows: usize, field: F) -> Vec<Option<f64>>
    where
        F: Fn(&T) -> &[Option<f64>],
    {
        let mut column = vec![None; n_rows];
        for (group, result) in self.groups.iter().zip(per_group) {
            column[group.rows.clone()].copy_from_slice(field(result));
        }
        column
    }
}
