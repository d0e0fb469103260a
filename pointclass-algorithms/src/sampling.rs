//! Class-balanced training sample extraction

use log::{info, warn};
use pointclass_core::{Error, FeatureSet, LabelCatalog, PointSet, Result, LABEL_UNASSIGNED};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Training sample extraction options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingOptions {
    /// Upper bound on samples taken per class and point cloud
    pub max_samples: usize,
    /// ASPRS codes of the classes to train; empty trains every class
    pub classes: Vec<u8>,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            max_samples: 10_000,
            classes: Vec::new(),
        }
    }
}

impl TrainingOptions {
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_classes(mut self, classes: Vec<u8>) -> Self {
        self.classes = classes;
        self
    }
}

/// Per-class accounting of one extraction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub samples_per_label: usize,
    /// Samples handed to the sink, per training code
    pub added: Vec<usize>,
    /// Eligible processed points, per training code
    pub available: Vec<usize>,
}

impl SampleSummary {
    pub fn total_added(&self) -> usize {
        self.added.iter().sum()
    }
}

/// Draws the same number of samples from every class present in a point cloud
pub struct BalancedSampleExtractor<'a> {
    catalog: &'a LabelCatalog,
    train_class: Option<Vec<bool>>,
    max_samples: usize,
}

impl<'a> BalancedSampleExtractor<'a> {
    pub fn new(catalog: &'a LabelCatalog, options: &TrainingOptions) -> Self {
        let train_class = if options.classes.is_empty() {
            None
        } else {
            let asprs_to_train = catalog.asprs_to_train_codes();
            let mut train_class = vec![false; catalog.len()];
            for &code in &options.classes {
                let class = asprs_to_train[code as usize] as usize;
                match train_class.get_mut(class) {
                    Some(flag) => *flag = true,
                    None => warn!("ASPRS class {} has no training label, ignoring", code),
                }
            }
            Some(train_class)
        };

        Self {
            catalog,
            train_class,
            max_samples: options.max_samples,
        }
    }

    fn is_eligible(&self, label: u8) -> bool {
        let class = label as usize;
        if label == LABEL_UNASSIGNED || class >= self.catalog.len() {
            return false;
        }
        self.train_class.as_ref().map_or(true, |t| t[class])
    }

    /// Hand a class-balanced subset of `point_set`'s labeled points to `sink`
    ///
    /// `sink` receives the feature table, the processed point index and the
    /// training code. Points aliasing the same processed point are sampled
    /// once. Returns `Ok(None)` when the point set carries no labels.
    pub fn extract<F, R, S>(
        &self,
        point_set: &PointSet,
        features: &F,
        rng: &mut R,
        mut sink: S,
    ) -> Result<Option<SampleSummary>>
    where
        F: FeatureSet,
        R: Rng + ?Sized,
        S: FnMut(&F, usize, usize),
    {
        let labels = match point_set.labels.as_deref() {
            Some(labels) if !labels.is_empty() => labels,
            _ => return Ok(None),
        };
        point_set.validate()?;

        if features.point_count() != point_set.base.len() {
            return Err(Error::InvalidData(format!(
                "feature table covers {} points, point set has {} processed points",
                features.point_count(),
                point_set.base.len()
            )));
        }

        let n_classes = self.catalog.len();
        let mut count = vec![0usize; n_classes];
        let mut sampled = vec![false; point_set.base.len()];
        let mut idxes: Vec<(usize, usize)> = Vec::new();

        for (&label, &idx) in labels.iter().zip(&point_set.point_map) {
            if !self.is_eligible(label) {
                continue;
            }

            if !sampled[idx] {
                let class = label as usize;
                idxes.push((idx, class));
                count[class] += 1;
                sampled[idx] = true;
            }
        }

        let samples_per_label = count
            .iter()
            .copied()
            .filter(|&c| c > 0)
            .min()
            .unwrap_or(0)
            .min(self.max_samples);

        info!("Samples per label: {}", samples_per_label);

        idxes.shuffle(rng);

        let mut added = vec![0usize; n_classes];
        for &(idx, class) in &idxes {
            if added[class] < samples_per_label {
                sink(features, idx, class);
                added[class] += 1;
            }
        }

        for (label, (a, c)) in self.catalog.iter().zip(added.iter().zip(&count)) {
            info!(" * {}: {} / {}", label.name(), a, c);
        }

        Ok(Some(SampleSummary {
            samples_per_label,
            added,
            available: count,
        }))
    }
}

/// One labeled point cloud with its computed features
pub struct TrainingCloud<F> {
    pub name: String,
    pub point_set: PointSet,
    pub features: F,
}

/// Run the balanced extractor over several point clouds
///
/// Clouds without labels are logged and skipped. `init` is called with the
/// feature count and the class count before the first sample of the first
/// usable cloud. Returns the summary of every processed cloud.
pub fn collect_training_data<I, F, R, Init, S>(
    clouds: I,
    catalog: &LabelCatalog,
    options: &TrainingOptions,
    rng: &mut R,
    mut init: Init,
    mut sink: S,
) -> Result<Vec<(String, SampleSummary)>>
where
    I: IntoIterator<Item = TrainingCloud<F>>,
    F: FeatureSet,
    R: Rng + ?Sized,
    Init: FnMut(usize, usize),
    S: FnMut(&F, usize, usize),
{
    let extractor = BalancedSampleExtractor::new(catalog, options);
    let mut summaries = Vec::new();
    let mut feature_count: Option<usize> = None;

    for cloud in clouds {
        info!("Processing {}", cloud.name);

        if !cloud.point_set.has_labels() {
            info!("{} has no labels, skipping...", cloud.name);
            continue;
        }

        info!("Features: {}", cloud.features.feature_count());
        match feature_count {
            None => {
                init(cloud.features.feature_count(), catalog.len());
                feature_count = Some(cloud.features.feature_count());
            }
            Some(expected) if expected != cloud.features.feature_count() => {
                return Err(Error::InvalidData(format!(
                    "{} has {} features, previous clouds have {}",
                    cloud.name,
                    cloud.features.feature_count(),
                    expected
                )));
            }
            Some(_) => {}
        }

        if let Some(summary) = extractor.extract(&cloud.point_set, &cloud.features, rng, &mut sink)? {
            summaries.push((cloud.name, summary));
        }
    }

    Ok(summaries)
}
