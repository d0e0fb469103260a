//! Core traits for pointclass

use crate::point::*;

/// Trait for nearest neighbor search functionality
///
/// Implementations are queried concurrently from worker threads and must
/// only require shared access.
pub trait NearestNeighborSearch: Sync {
    /// Find up to `k` nearest neighbors to a query point as `(index, distance)`
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)>;

    /// Find all neighbors within a given radius, the radius itself included
    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)>;
}

/// Scoring function of a trained classifier
///
/// `evaluate` writes one non-negative score per class into `probabilities`.
/// Scores need not sum to one.
pub trait Classifier: Sync {
    fn evaluate(&self, features: &[f32], probabilities: &mut [f32]);

    /// Number of scores `evaluate` writes, when the model knows it
    fn class_count(&self) -> Option<usize> {
        None
    }
}

impl<F> Classifier for F
where
    F: Fn(&[f32], &mut [f32]) + Sync,
{
    fn evaluate(&self, features: &[f32], probabilities: &mut [f32]) {
        self(features, probabilities)
    }
}

/// Index of the highest score
///
/// Comparison is strict and starts from zero, so ties resolve to the lowest
/// index and an all-zero (or all-negative) vector yields class 0.
pub fn argmax(scores: &[f32]) -> usize {
    let mut best_class = 0;
    let mut best_value = 0.0f32;

    for (class, &value) in scores.iter().enumerate() {
        if value > best_value {
            best_class = class;
            best_value = value;
        }
    }

    best_class
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[0.9, 0.05, 0.05]), 0);
        assert_eq!(argmax(&[0.0, 0.0]), 0);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_closure_is_classifier() {
        let classifier = |_: &[f32], out: &mut [f32]| {
            out.copy_from_slice(&[0.1, 0.7, 0.2]);
        };
        let mut probs = [0.0; 3];
        classifier.evaluate(&[1.0], &mut probs);
        assert_eq!(argmax(&probs), 1);
        assert_eq!(classifier.class_count(), None);
    }
}
