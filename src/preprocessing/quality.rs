//! Feature coverage reporting
//!
//! Summarises how much of each engineered column is present versus absent
//! because of short history, so the modeling side can decide what to drop.

use crate::error::Result;
use super::columns::{f64_values, require_columns};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Coverage of a single feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCoverage {
    /// Column name
    pub column: String,
    /// Rows with a computed value
    pub present: usize,
    /// Rows marked absent
    pub absent: usize,
}

impl ColumnCoverage {
    /// Fraction of rows with a computed value
    pub fn completeness(&self) -> f64 {
        let total = self.present + self.absent;
        if total == 0 {
            1.0
        } else {
            self.present as f64 / total as f64
        }
    }
}

/// Coverage warning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoverageWarning {
    /// No row has a value, e.g. a year-ago lag on less than a year of data
    EntirelyAbsent { column: String },
    /// Most rows lack a value
    HighAbsence { column: String, ratio: f64 },
}

/// Coverage report over a feature panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCoverage {
    pub num_rows: usize,
    pub per_column: Vec<ColumnCoverage>,
    pub warnings: Vec<CoverageWarning>,
}

impl FeatureCoverage {
    /// Absence ratio above which a column is flagged
    pub const HIGH_ABSENCE: f64 = 0.7;

    /// Count present and absent values of `columns` in `panel`
    pub fn compute(panel: &DataFrame, columns: &[String]) -> Result<Self> {
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        require_columns(panel, &names)?;

        let mut per_column = Vec::with_capacity(columns.len());
        let mut warnings = Vec::new();

        for name in columns {
            let values = f64_values(panel, name)?;
            let present = values.iter().filter(|v| v.is_some()).count();
            let coverage = ColumnCoverage {
                column: name.clone(),
                present,
                absent: values.len() - present,
            };

            if coverage.present == 0 && coverage.absent > 0 {
                warn!(column = %name, rows = coverage.absent, "Feature column is entirely absent");
                warnings.push(CoverageWarning::EntirelyAbsent { column: name.clone() });
            } else if 1.0 - coverage.completeness() > Self::HIGH_ABSENCE {
                warnings.push(CoverageWarning::HighAbsence {
                    column: name.clone(),
                    ratio: 1.0 - coverage.completeness(),
                });
            }
            per_column.push(coverage);
        }

        Ok(Self {
            num_rows: panel.height(),
            per_column,
            warnings,
        })
    }

    /// Coverage entry for `column`, if it was measured
    pub fn column(&self, column: &str) -> Option<&ColumnCoverage> {
        self.per_column.iter().find(|c| c.column == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_coverage_counts() {
        let df = df!(
            "lag" => &[None, None, Some(1.0), Some(2.0)],
            "year_ago" => &[None::<f64>, None, None, None],
            "sparse" => &[None, None, None, Some(4.0)]
        )
        .unwrap();
        let cols = vec!["lag".to_string(), "year_ago".to_string(), "sparse".to_string()];
        let report = FeatureCoverage::compute(&df, &cols).unwrap();

        assert_eq!(report.num_rows, 4);
        let lag = report.column("lag").unwrap();
        assert_eq!((lag.present, lag.absent), (2, 2));
        assert!((lag.completeness() - 0.5).abs() < 1e-12);

        assert!(report
            .warnings
            .contains(&CoverageWarning::EntirelyAbsent { column: "year_ago".to_string() }));
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            CoverageWarning::HighAbsence { column, .. } if column == "sparse"
        )));
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_missing_column() {
        let df = df!("lag" => &[1.0]).unwrap();
        assert!(FeatureCoverage::compute(&df, &["velocity".to_string()]).is_err());
    }
}
