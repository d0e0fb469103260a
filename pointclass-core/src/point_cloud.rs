//! Point set with a full-resolution layer and a decimated processed layer

use crate::point::*;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Decimated points that features are computed on and classification runs over
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPoints {
    pub points: Vec<Point3f>,
    /// Predicted training code per processed point
    pub labels: Vec<u8>,
}

impl ProcessedPoints {
    pub fn new(points: Vec<Point3f>) -> Self {
        Self {
            labels: Vec::new(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A point cloud as read from disk plus its processed (decimated) counterpart
///
/// Every output point maps to exactly one processed point through
/// `point_map`; several output points may share a processed point.
/// Labels hold training codes on input and ASPRS codes once the
/// classification result has been remapped onto the cloud.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    pub points: Vec<Point3f>,
    pub labels: Option<Vec<u8>>,
    pub colors: Option<Vec<[u8; 3]>>,
    pub point_map: Vec<usize>,
    pub base: ProcessedPoints,
}

impl PointSet {
    /// Create a point set whose processed layer is the cloud itself
    pub fn new(points: Vec<Point3f>) -> Self {
        let point_map = (0..points.len()).collect();
        Self {
            base: ProcessedPoints::new(points.clone()),
            points,
            labels: None,
            colors: None,
            point_map,
        }
    }

    /// Create a point set from full-resolution points, decimated points and
    /// the mapping between them
    pub fn with_decimation(
        points: Vec<Point3f>,
        processed: Vec<Point3f>,
        point_map: Vec<usize>,
    ) -> Result<Self> {
        if point_map.len() != points.len() {
            return Err(Error::InvalidData(format!(
                "point map has {} entries for {} points",
                point_map.len(),
                points.len()
            )));
        }

        if let Some(&idx) = point_map.iter().find(|&&idx| idx >= processed.len()) {
            return Err(Error::InvalidData(format!(
                "point map references processed point {} of {}",
                idx,
                processed.len()
            )));
        }

        Ok(Self {
            points,
            labels: None,
            colors: None,
            point_map,
            base: ProcessedPoints::new(processed),
        })
    }

    /// Attach ground-truth labels in training code
    pub fn with_labels(mut self, labels: Vec<u8>) -> Result<Self> {
        if labels.len() != self.points.len() {
            return Err(Error::InvalidData(format!(
                "{} labels for {} points",
                labels.len(),
                self.points.len()
            )));
        }
        self.labels = Some(labels);
        Ok(self)
    }

    pub fn with_colors(mut self, colors: Vec<[u8; 3]>) -> Result<Self> {
        if colors.len() != self.points.len() {
            return Err(Error::InvalidData(format!(
                "{} colors for {} points",
                colors.len(),
                self.points.len()
            )));
        }
        self.colors = Some(colors);
        Ok(self)
    }

    /// Check the invariants that public field access can break
    pub fn validate(&self) -> Result<()> {
        if self.point_map.len() != self.points.len() {
            return Err(Error::InvalidData(format!(
                "point map has {} entries for {} points",
                self.point_map.len(),
                self.points.len()
            )));
        }

        if let Some(&idx) = self.point_map.iter().find(|&&idx| idx >= self.base.len()) {
            return Err(Error::InvalidData(format!(
                "point map references processed point {} of {}",
                idx,
                self.base.len()
            )));
        }

        if let Some(labels) = self.labels.as_ref().filter(|l| !l.is_empty()) {
            if labels.len() != self.points.len() {
                return Err(Error::InvalidData(format!(
                    "{} labels for {} points",
                    labels.len(),
                    self.points.len()
                )));
            }
        }

        if let Some(colors) = self.colors.as_ref().filter(|c| !c.is_empty()) {
            if colors.len() != self.points.len() {
                return Err(Error::InvalidData(format!(
                    "{} colors for {} points",
                    colors.len(),
                    self.points.len()
                )));
            }
        }

        Ok(())
    }

    /// Number of full-resolution points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn has_labels(&self) -> bool {
        self.labels.as_ref().is_some_and(|l| !l.is_empty())
    }

    pub fn has_colors(&self) -> bool {
        self.colors.as_ref().is_some_and(|c| !c.is_empty())
    }
}
