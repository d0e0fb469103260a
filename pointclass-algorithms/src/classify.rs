//! End-to-end classification of a point set

use crate::graphcut::{AlphaExpansion, EnergySolver};
use crate::nearest_neighbor::SpatialIndex;
use crate::parallel::{execute_parallel, ThreadPoolConfig};
use crate::regularization::{GraphCutOptions, LabelRegularizer, Regularization};
use crate::remap::OutputRemapper;
use crate::statistics::Statistics;
use log::info;
use pointclass_core::{Classifier, Error, FeatureSet, LabelCatalog, PointSet, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Classification options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyOptions {
    pub regularization: Regularization,
    /// Neighborhood radius for [`Regularization::LocalSmooth`]
    pub radius: f32,
    /// Write class colors instead of class codes
    pub use_colors: bool,
    /// Only update points that are unclassified
    pub unclassified_only: bool,
    /// Compare predictions with the cloud's ground truth
    pub evaluate: bool,
    /// ASPRS codes that are never written
    pub skip: Vec<u8>,
    /// Where to write evaluation statistics
    pub stats_file: Option<PathBuf>,
    /// Dedicated thread pool; the global rayon pool when unset
    pub threads: Option<ThreadPoolConfig>,
    pub graph_cut: GraphCutOptions,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            regularization: Regularization::None,
            radius: 2.5,
            use_colors: false,
            unclassified_only: false,
            evaluate: false,
            skip: Vec::new(),
            stats_file: None,
            threads: None,
            graph_cut: GraphCutOptions::default(),
        }
    }
}

impl ClassifyOptions {
    pub fn with_regularization(mut self, regularization: Regularization) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_unclassified_only(mut self, unclassified_only: bool) -> Self {
        self.unclassified_only = unclassified_only;
        self
    }

    pub fn with_evaluation(mut self, evaluate: bool) -> Self {
        self.evaluate = evaluate;
        self
    }

    pub fn with_skip(mut self, skip: Vec<u8>) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_stats_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stats_file = Some(path.into());
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(ThreadPoolConfig::default().with_threads(threads));
        self
    }

    pub fn with_graph_cut(mut self, graph_cut: GraphCutOptions) -> Self {
        self.graph_cut = graph_cut;
        self
    }
}

/// Classify `set` with the default alpha-expansion solver
pub fn classify_point_set<C, F>(
    set: &mut PointSet,
    features: &F,
    classifier: &C,
    catalog: &LabelCatalog,
    options: &ClassifyOptions,
) -> Result<Option<Statistics>>
where
    C: Classifier,
    F: FeatureSet,
{
    classify_point_set_with_solver(set, features, classifier, catalog, options, &AlphaExpansion::default())
}

/// Label the processed points of `set`, then remap the labels onto its output points
///
/// `features` covers the processed points. Labels on `set` are read as
/// training codes and hold ASPRS codes on return. Statistics are returned
/// (and written to `options.stats_file` if set) when evaluating.
pub fn classify_point_set_with_solver<C, F, S>(
    set: &mut PointSet,
    features: &F,
    classifier: &C,
    catalog: &LabelCatalog,
    options: &ClassifyOptions,
    solver: &S,
) -> Result<Option<Statistics>>
where
    C: Classifier,
    F: FeatureSet,
    S: EnergySolver,
{
    set.validate()?;
    if features.point_count() != set.base.len() {
        return Err(Error::InvalidData(format!(
            "feature table covers {} points, processed cloud has {}",
            features.point_count(),
            set.base.len()
        )));
    }

    info!("Classifying...");

    execute_parallel(options.threads.as_ref(), || -> Result<Option<Statistics>> {
        let regularizer = LabelRegularizer::new(classifier, features, catalog.len())?;
        let points = &set.base.points;
        let index = SpatialIndex::new(points);

        set.base.labels = regularizer.regularize(
            options.regularization,
            points,
            &index,
            options.radius,
            &options.graph_cut,
            solver,
        )?;

        let statistics = OutputRemapper::new(catalog)
            .with_skip(&options.skip)
            .with_colors(options.use_colors)
            .with_unclassified_only(options.unclassified_only)
            .with_evaluation(options.evaluate)
            .remap(set)?;

        if let (Some(stats), Some(path)) = (&statistics, &options.stats_file) {
            stats.write_to_file(path)?;
        }

        Ok(statistics)
    })?
}
