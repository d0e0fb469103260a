//! Label regularization
//!
//! Turns per-point class scores into labels under one of three strategies:
//! plain arg-max, arg-max of scores averaged over a radius, or a Potts-model
//! energy minimization solved independently on a grid of partitions.

use crate::graphcut::EnergySolver;
use crate::partition::GridPartition;
use log::{info, warn};
use ndarray::Array2;
use pointclass_core::{
    argmax, BoundingBox, Classifier, Error, FeatureSet, NearestNeighborSearch, Point3f, Result,
    LABEL_UNCLASSIFIED,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Probabilities are clamped to this floor before taking the logarithm
pub const PROBABILITY_FLOOR: f32 = 1e-9;

/// Regularization strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regularization {
    #[default]
    None,
    LocalSmooth,
    GraphCut,
}

impl FromStr for Regularization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Regularization::None),
            "local_smooth" => Ok(Regularization::LocalSmooth),
            "graph_cut" => Ok(Regularization::GraphCut),
            other => Err(Error::InvalidRegularization(other.to_string())),
        }
    }
}

impl TryFrom<i32> for Regularization {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Regularization::None),
            1 => Ok(Regularization::LocalSmooth),
            2 => Ok(Regularization::GraphCut),
            other => Err(Error::InvalidRegularization(other.to_string())),
        }
    }
}

impl fmt::Display for Regularization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Regularization::None => "none",
            Regularization::LocalSmooth => "local_smooth",
            Regularization::GraphCut => "graph_cut",
        };
        f.write_str(name)
    }
}

/// Graph-cut partitioning and pairwise term parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphCutOptions {
    /// Target number of grid cells, raised to [`crate::partition::MIN_SUBDIVISIONS`]
    pub subdivisions: usize,
    /// Weight of every neighbor edge
    pub strength: f32,
    /// Neighbors queried per point to build edges
    pub neighbors: usize,
}

impl Default for GraphCutOptions {
    fn default() -> Self {
        Self {
            subdivisions: 4,
            strength: 0.2,
            neighbors: 12,
        }
    }
}

impl GraphCutOptions {
    pub fn with_subdivisions(mut self, subdivisions: usize) -> Self {
        self.subdivisions = subdivisions;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_neighbors(mut self, neighbors: usize) -> Self {
        self.neighbors = neighbors;
        self
    }
}

/// Unary cost of a class score
pub fn unary_cost(probability: f32) -> f64 {
    -(probability.max(PROBABILITY_FLOOR) as f64).ln()
}

/// Labels processed points from classifier scores
pub struct LabelRegularizer<'a, C, F> {
    classifier: &'a C,
    features: &'a F,
    n_classes: usize,
}

impl<'a, C, F> LabelRegularizer<'a, C, F>
where
    C: Classifier,
    F: FeatureSet,
{
    pub fn new(classifier: &'a C, features: &'a F, n_classes: usize) -> Result<Self> {
        if n_classes == 0 || n_classes > LABEL_UNCLASSIFIED as usize {
            return Err(Error::InvalidData(format!(
                "unsupported number of classes: {}",
                n_classes
            )));
        }

        if let Some(count) = classifier.class_count().filter(|&c| c != n_classes) {
            return Err(Error::InvalidData(format!(
                "classifier scores {} classes, catalog holds {}",
                count, n_classes
            )));
        }

        Ok(Self {
            classifier,
            features,
            n_classes,
        })
    }

    fn check_points(&self, points: &[Point3f]) -> Result<()> {
        if self.features.point_count() != points.len() {
            return Err(Error::InvalidData(format!(
                "feature table covers {} points, {} points to classify",
                self.features.point_count(),
                points.len()
            )));
        }
        Ok(())
    }

    fn scratch(&self) -> (Vec<f32>, Vec<f32>) {
        (
            vec![0.0; self.features.feature_count()],
            vec![0.0; self.n_classes],
        )
    }

    fn score(&self, point: usize, ft: &mut [f32], probs: &mut [f32]) {
        self.features.fill_row(point, ft);
        probs.fill(0.0);
        self.classifier.evaluate(ft, probs);
    }

    /// Run the configured strategy over `points`, one label per point
    pub fn regularize<I, S>(
        &self,
        regularization: Regularization,
        points: &[Point3f],
        index: &I,
        radius: f32,
        graph_cut: &GraphCutOptions,
        solver: &S,
    ) -> Result<Vec<u8>>
    where
        I: NearestNeighborSearch,
        S: EnergySolver,
    {
        match regularization {
            Regularization::None => self.argmax_labels(points),
            Regularization::LocalSmooth => self.local_smooth(points, index, radius),
            Regularization::GraphCut => self.graph_cut(points, index, graph_cut, solver),
        }
    }

    /// Independent arg-max per point
    pub fn argmax_labels(&self, points: &[Point3f]) -> Result<Vec<u8>> {
        self.check_points(points)?;

        let mut labels = vec![0u8; points.len()];
        labels.par_iter_mut().enumerate().for_each_init(
            || self.scratch(),
            |(ft, probs), (i, label)| {
                self.score(i, ft, probs);
                *label = argmax(probs) as u8;
            },
        );

        Ok(labels)
    }

    /// Arg-max of class scores averaged over all points within `radius`
    ///
    /// A point without radius matches falls back to its own scores.
    pub fn local_smooth<I>(&self, points: &[Point3f], index: &I, radius: f32) -> Result<Vec<u8>>
    where
        I: NearestNeighborSearch,
    {
        self.check_points(points)?;
        if !(radius >= 0.0) {
            return Err(Error::InvalidData(format!(
                "smoothing radius must be non-negative, got {}",
                radius
            )));
        }

        let k = self.n_classes;
        let n = points.len();

        let mut values = vec![0.0f32; n * k];
        values.par_chunks_mut(k).enumerate().for_each_init(
            || vec![0.0; self.features.feature_count()],
            |ft, (i, probs)| self.score(i, ft, probs),
        );

        info!("Local smoothing...");

        let values = values.as_slice();
        let mut labels = vec![0u8; n];
        labels.par_iter_mut().enumerate().for_each_init(
            || vec![0.0f32; k],
            |mean, (i, label)| {
                mean.fill(0.0);
                let mut matches = 0usize;

                for (j, _) in index.find_radius_neighbors(&points[i], radius) {
                    if j >= n {
                        continue;
                    }
                    for (m, &v) in mean.iter_mut().zip(&values[j * k..(j + 1) * k]) {
                        *m += v;
                    }
                    matches += 1;
                }

                if matches == 0 {
                    mean.copy_from_slice(&values[i * k..(i + 1) * k]);
                } else {
                    for m in mean.iter_mut() {
                        *m /= matches as f32;
                    }
                }

                *label = argmax(mean) as u8;
            },
        );

        Ok(labels)
    }

    /// Potts-model energy minimization per grid partition
    ///
    /// Edges only connect points of the same partition, so consistency is
    /// enforced within partitions and not across their borders. A partition
    /// whose solve fails keeps its arg-max labels.
    pub fn graph_cut<I, S>(
        &self,
        points: &[Point3f],
        index: &I,
        options: &GraphCutOptions,
        solver: &S,
    ) -> Result<Vec<u8>>
    where
        I: NearestNeighborSearch,
        S: EnergySolver,
    {
        self.check_points(points)?;
        info!("Using graph cut...");

        let partition = GridPartition::new(points, options.subdivisions);
        if let Some(bbox) = BoundingBox::from_points(points) {
            info!(
                "Using {} divisions with size {} {}",
                partition.len(),
                bbox.width() / partition.nb_x as f32,
                bbox.depth() / partition.nb_y as f32
            );
        }

        let cells: Vec<(usize, &[usize])> = partition.non_empty().collect();
        let solved: Vec<(usize, Vec<usize>, bool)> = cells
            .into_par_iter()
            .map(|(cell, members)| {
                let (labels, ok) =
                    self.solve_partition(points, index, &partition, cell, members, options, solver);
                (cell, labels, ok)
            })
            .collect();

        let mut labels = vec![0u8; points.len()];
        let mut failed = 0usize;
        for (cell, assigned, ok) in solved {
            if !ok {
                failed += 1;
            }
            for (&point, &label) in partition.indices[cell].iter().zip(&assigned) {
                labels[point] = label as u8;
            }
        }

        if failed > 0 {
            warn!("{} partition(s) kept their arg-max labels after solver failure", failed);
        }

        Ok(labels)
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_partition<I, S>(
        &self,
        points: &[Point3f],
        index: &I,
        partition: &GridPartition,
        cell: usize,
        members: &[usize],
        options: &GraphCutOptions,
        solver: &S,
    ) -> (Vec<usize>, bool)
    where
        I: NearestNeighborSearch,
        S: EnergySolver,
    {
        let (mut ft, mut probs) = self.scratch();
        let mut edges = Vec::new();
        let mut edge_weights = Vec::new();
        let mut unary = Array2::<f64>::zeros((self.n_classes, members.len()));
        let mut assigned = vec![0usize; members.len()];

        for (j, &s) in members.iter().enumerate() {
            for (neighbor, _) in index.find_k_nearest(&points[s], options.neighbors) {
                if neighbor >= points.len() {
                    continue;
                }
                let (neighbor_cell, local) = partition.locate(neighbor);
                if neighbor_cell == cell && local != j {
                    edges.push((j, local));
                    edge_weights.push(options.strength);
                }
            }

            self.score(s, &mut ft, &mut probs);
            for (class, &p) in probs.iter().enumerate() {
                unary[[class, j]] = unary_cost(p);
            }
            assigned[j] = argmax(&probs);
        }

        let initial = assigned.clone();
        match solver.solve(&edges, &edge_weights, unary.view(), &mut assigned) {
            Ok(()) => (assigned, true),
            Err(e) => {
                warn!("partition {} ({} points): {}", cell, members.len(), e);
                (initial, false)
            }
        }
    }
}
