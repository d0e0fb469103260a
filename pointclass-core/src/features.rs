//! Per-point feature storage
//!
//! Feature values are computed elsewhere (one column per feature and scale);
//! this module only defines how classification code reads them.

use crate::{Error, Result};

/// Read access to a dense table of feature values indexed by processed point
pub trait FeatureSet: Sync {
    /// Number of features per point
    fn feature_count(&self) -> usize;

    /// Number of points the table covers
    fn point_count(&self) -> usize;

    /// Value of `feature` for point `point`
    fn value(&self, feature: usize, point: usize) -> f32;

    /// Copy all feature values of `point` into `out`
    fn fill_row(&self, point: usize, out: &mut [f32]) {
        for (f, v) in out.iter_mut().enumerate() {
            *v = self.value(f, point);
        }
    }
}

/// Column-major feature table: each feature owns one contiguous column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureMatrix {
    columns: Vec<Vec<f32>>,
    point_count: usize,
}

impl FeatureMatrix {
    /// Build a matrix from feature columns; every column must have the same length
    pub fn from_columns(columns: Vec<Vec<f32>>) -> Result<Self> {
        let point_count = columns.first().map_or(0, |c| c.len());
        if let Some((f, column)) = columns.iter().enumerate().find(|(_, c)| c.len() != point_count) {
            return Err(Error::InvalidData(format!(
                "feature {} has {} values, expected {}",
                f,
                column.len(),
                point_count
            )));
        }

        Ok(Self { columns, point_count })
    }

    /// Build a matrix from per-point rows
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let feature_count = rows.first().map_or(0, |r| r.len());
        let mut columns = vec![Vec::with_capacity(rows.len()); feature_count];

        for (i, row) in rows.iter().enumerate() {
            if row.len() != feature_count {
                return Err(Error::InvalidData(format!(
                    "point {} has {} features, expected {}",
                    i,
                    row.len(),
                    feature_count
                )));
            }
            for (column, &v) in columns.iter_mut().zip(row) {
                column.push(v);
            }
        }

        Ok(Self {
            columns,
            point_count: rows.len(),
        })
    }
}

impl FeatureSet for FeatureMatrix {
    fn feature_count(&self) -> usize {
        self.columns.len()
    }

    fn point_count(&self) -> usize {
        self.point_count
    }

    fn value(&self, feature: usize, point: usize) -> f32 {
        self.columns[feature][point]
    }
}
