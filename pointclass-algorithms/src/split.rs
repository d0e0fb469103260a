//! Split selection for decision tree nodes
//!
//! A node split combines two capabilities: a [`FeatureSplitter`] that decides
//! which features to try and gathers the node's samples for each of them, and
//! a [`SplitCriterion`] that finds the best threshold on one such sample set.
//! [`find_best_split`] runs the criterion once per candidate feature and keeps
//! the minimum-loss result.

use pointclass_core::FeatureSet;
use rand::seq::index;
use rand::Rng;

/// One training sample projected onto a single feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f32,
    pub class: usize,
}

impl Sample {
    pub fn new(value: f32, class: usize) -> Self {
        Self { value, class }
    }
}

/// Threshold search over the samples of one feature
pub trait SplitCriterion {
    /// Return `(threshold, loss)` of the best cut, or `(0.0, f64::INFINITY)`
    /// when the samples cannot be separated.
    ///
    /// `samples` is reordered. `classes_l` and `classes_r` are scratch
    /// histograms owned by the caller.
    ///
    /// # Panics
    ///
    /// Every `Sample::class` must be below the criterion's class count.
    fn best_threshold<R: Rng + ?Sized>(
        &self,
        samples: &mut [Sample],
        classes_l: &mut Vec<u64>,
        classes_r: &mut Vec<u64>,
        rng: &mut R,
    ) -> (f32, f64);
}

/// Weighted sum-of-squares impurity
///
/// For a cut with `n_l` samples on the left and `n_r` on the right the loss
/// is `n_l - Σ l_c² / n_l + n_r - Σ r_c² / n_r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GiniCriterion {
    n_classes: usize,
}

impl GiniCriterion {
    pub fn new(n_classes: usize) -> Self {
        Self { n_classes }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

fn square_term(frequencies: &[u64]) -> u64 {
    frequencies.iter().map(|&f| f * f).sum()
}

impl SplitCriterion for GiniCriterion {
    /// On return `classes_l` counts every sample except the largest one,
    /// which is the only sample left in `classes_r`.
    fn best_threshold<R: Rng + ?Sized>(
        &self,
        samples: &mut [Sample],
        classes_l: &mut Vec<u64>,
        classes_r: &mut Vec<u64>,
        rng: &mut R,
    ) -> (f32, f64) {
        let mut best_loss = f64::INFINITY;
        let mut best_threshold = 0.0f32;

        classes_l.clear();
        classes_l.resize(self.n_classes, 0);
        classes_r.clear();
        classes_r.resize(self.n_classes, 0);

        if let Some(sample) = samples.iter().find(|s| s.class >= self.n_classes) {
            panic!(
                "sample class {} out of range for {} classes",
                sample.class, self.n_classes
            );
        }

        let mut n_l = 0.0f64;
        let mut n_r = 0.0f64;
        for sample in samples.iter() {
            classes_r[sample.class] += 1;
            n_r += 1.0;
        }

        samples.sort_by(|a, b| a.value.total_cmp(&b.value).then(a.class.cmp(&b.class)));

        for i in 1..samples.len() {
            let prev = samples[i - 1];
            classes_l[prev.class] += 1;
            classes_r[prev.class] -= 1;
            n_l += 1.0;
            n_r -= 1.0;

            if prev.value == samples[i].value {
                continue;
            }

            let loss = n_l - square_term(classes_l) as f64 / n_l
                + n_r - square_term(classes_r) as f64 / n_r;

            if loss < best_loss {
                best_loss = loss;
                let fraction: f64 = rng.gen();
                best_threshold = (fraction * prev.value as f64
                    + (1.0 - fraction) * samples[i].value as f64) as f32;
            }
        }

        (best_threshold, best_loss)
    }
}

/// Source of candidate features and per-feature sample sets for one node
pub trait FeatureSplitter {
    /// Features to evaluate at this node
    fn candidate_features<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize>;

    /// Replace `samples` with the node's `(value, class)` pairs for `feature`
    fn gather(&self, feature: usize, samples: &mut Vec<Sample>);
}

/// Axis-aligned splitter testing a random subset of features
pub struct AxisAlignedSplitter<'a, F: FeatureSet> {
    features: &'a F,
    labels: &'a [usize],
    node_samples: &'a [usize],
    n_candidates: usize,
}

impl<'a, F: FeatureSet> AxisAlignedSplitter<'a, F> {
    /// `labels` holds one class per feature-table point, `node_samples` the
    /// points that reached the node. With `n_candidates == 0` the square root
    /// of the feature count is used.
    pub fn new(
        features: &'a F,
        labels: &'a [usize],
        node_samples: &'a [usize],
        n_candidates: usize,
    ) -> Self {
        let n_features = features.feature_count();
        let n_candidates = if n_candidates == 0 {
            ((n_features as f64).sqrt().ceil() as usize).max(1)
        } else {
            n_candidates
        };

        Self {
            features,
            labels,
            node_samples,
            n_candidates: n_candidates.min(n_features),
        }
    }
}

impl<F: FeatureSet> FeatureSplitter for AxisAlignedSplitter<'_, F> {
    fn candidate_features<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        index::sample(rng, self.features.feature_count(), self.n_candidates).into_vec()
    }

    fn gather(&self, feature: usize, samples: &mut Vec<Sample>) {
        samples.clear();
        samples.extend(
            self.node_samples
                .iter()
                .map(|&i| Sample::new(self.features.value(feature, i), self.labels[i])),
        );
    }
}

/// Winning split of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestSplit {
    pub feature: usize,
    pub threshold: f32,
    pub loss: f64,
}

/// Evaluate every candidate feature and keep the one with minimum loss
///
/// Returns `None` when no candidate offers a usable split.
pub fn find_best_split<C, S, R>(criterion: &C, splitter: &S, rng: &mut R) -> Option<BestSplit>
where
    C: SplitCriterion,
    S: FeatureSplitter,
    R: Rng + ?Sized,
{
    let mut samples = Vec::new();
    let mut classes_l = Vec::new();
    let mut classes_r = Vec::new();
    let mut best: Option<BestSplit> = None;

    for feature in splitter.candidate_features(rng) {
        splitter.gather(feature, &mut samples);
        let (threshold, loss) =
            criterion.best_threshold(&mut samples, &mut classes_l, &mut classes_r, rng);

        if loss.is_finite() && best.map_or(true, |b| loss < b.loss) {
            best = Some(BestSplit {
                feature,
                threshold,
                loss,
            });
        }
    }

    best
}
