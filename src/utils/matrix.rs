//! Dense export of feature columns for the modeling side

use crate::error::{PanelError, Result};
use crate::preprocessing::columns::{f64_values, require_columns};
use ndarray::{Array1, Array2, ArrayView1};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Feature values as an `(n_rows, n_features)` matrix
///
/// Absent values are `NaN` in `values` and `false` in `present`; the mask is
/// the source of truth, since a model may treat NaN differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub values: Array2<f64>,
    pub present: Array2<bool>,
}

impl FeatureMatrix {
    /// Extract `columns` from a feature panel, in the given order
    pub fn from_panel(panel: &DataFrame, columns: &[String]) -> Result<Self> {
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        require_columns(panel, &names)?;

        let n_rows = panel.height();
        let extracted = names
            .iter()
            .map(|name| f64_values(panel, name))
            .collect::<Result<Vec<_>>>()?;

        let mut data = Vec::with_capacity(n_rows * columns.len());
        let mut mask = Vec::with_capacity(n_rows * columns.len());
        for i in 0..n_rows {
            for column in &extracted {
                data.push(column[i].unwrap_or(f64::NAN));
                mask.push(column[i].is_some());
            }
        }
        let values = Array2::from_shape_vec((n_rows, columns.len()), data)?;
        let present = Array2::from_shape_vec((n_rows, columns.len()), mask)?;

        Ok(Self {
            names: columns.to_vec(),
            values,
            present,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    /// Values of one feature by name
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let j = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PanelError::MissingRequiredColumn(name.to_string()))?;
        Ok(self.values.column(j))
    }

    /// Rows on which every feature is present
    pub fn complete_rows(&self) -> Array1<bool> {
        self.present.map_axis(ndarray::Axis(1), |row| row.iter().all(|&p| p))
    }

    /// Keep only the rows flagged in `mask`
    pub fn select_rows(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.n_rows() {
            return Err(PanelError::ShapeError {
                expected: format!("{} rows", self.n_rows()),
                actual: format!("{} rows", mask.len()),
            });
        }
        let rows: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|&(_, &keep)| keep)
            .map(|(i, _)| i)
            .collect();
        Ok(Self {
            names: self.names.clone(),
            values: self.values.select(ndarray::Axis(0), &rows),
            present: self.present.select(ndarray::Axis(0), &rows),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn panel() -> DataFrame {
        df!(
            "a" => [Some(1.0), None, Some(3.0)],
            "b" => [Some(10.0), Some(20.0), Some(30.0)]
        )
        .unwrap()
    }

    #[test]
    fn test_from_panel_marks_absent() {
        let m = FeatureMatrix::from_panel(&panel(), &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.n_features(), 2);
        assert!(m.values[[1, 0]].is_nan());
        assert!(!m.present[[1, 0]]);
        assert_eq!(m.values[[2, 1]], 30.0);
        assert_eq!(m.column("b").unwrap().to_vec(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_complete_rows_and_selection() {
        let m = FeatureMatrix::from_panel(&panel(), &["b".to_string(), "a".to_string()]).unwrap();
        let complete = m.complete_rows();
        assert_eq!(complete.to_vec(), vec![true, false, true]);

        let kept = m.select_rows(complete.as_slice().unwrap()).unwrap();
        assert_eq!(kept.n_rows(), 2);
        assert_eq!(kept.values[[1, 1]], 3.0);
        assert!(kept.select_rows(&[true]).is_err());
    }

    #[test]
    fn test_missing_column() {
        let err = FeatureMatrix::from_panel(&panel(), &["c".to_string()]).unwrap_err();
        assert!(matches!(err, PanelError::MissingRequiredColumn(_)));
        assert!(matches!(
            FeatureMatrix::from_panel(&panel(), &["a".to_string()]).unwrap().column("z"),
            Err(PanelError::MissingRequiredColumn(_))
        ));
    }
}
