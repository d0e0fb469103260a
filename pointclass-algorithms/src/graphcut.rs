//! Discrete energy minimization over neighbor graphs
//!
//! The energy of a labeling is the sum of each node's unary cost for its
//! label plus, for every edge whose endpoints disagree, the edge weight
//! (a Potts model).

use crate::maxflow::FlowGraph;
use log::debug;
use ndarray::ArrayView2;
use pointclass_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Minimizer of a Potts energy
///
/// `unary` is a `labels x nodes` cost matrix. `labels` holds the initial
/// labeling on entry and the refined labeling on success. Implementations
/// are shared between worker threads and must keep per-call state local.
pub trait EnergySolver: Sync {
    fn solve(
        &self,
        edges: &[(usize, usize)],
        edge_weights: &[f32],
        unary: ArrayView2<'_, f64>,
        labels: &mut [usize],
    ) -> Result<()>;
}

/// Total energy of `labels`
pub fn potts_energy(
    edges: &[(usize, usize)],
    edge_weights: &[f32],
    unary: ArrayView2<'_, f64>,
    labels: &[usize],
) -> f64 {
    let data: f64 = labels
        .iter()
        .enumerate()
        .map(|(node, &label)| unary[[label, node]])
        .sum();

    let smooth: f64 = edges
        .iter()
        .zip(edge_weights)
        .filter(|((p, q), _)| labels[*p] != labels[*q])
        .map(|(_, &w)| w as f64)
        .sum();

    data + smooth
}

fn validate(
    edges: &[(usize, usize)],
    edge_weights: &[f32],
    unary: ArrayView2<'_, f64>,
    labels: &[usize],
) -> Result<()> {
    let (n_labels, n_nodes) = unary.dim();

    if labels.len() != n_nodes {
        return Err(Error::Solver(format!(
            "{} initial labels for {} nodes",
            labels.len(),
            n_nodes
        )));
    }

    if edges.len() != edge_weights.len() {
        return Err(Error::Solver(format!(
            "{} edges with {} weights",
            edges.len(),
            edge_weights.len()
        )));
    }

    if let Some(&(p, q)) = edges.iter().find(|&&(p, q)| p >= n_nodes || q >= n_nodes) {
        return Err(Error::Solver(format!("edge ({}, {}) out of range", p, q)));
    }

    if edge_weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(Error::Solver("edge weights must be finite and non-negative".to_string()));
    }

    if let Some(&l) = labels.iter().find(|&&l| l >= n_labels) {
        return Err(Error::Solver(format!("initial label {} out of {} labels", l, n_labels)));
    }

    if unary.iter().any(|c| !c.is_finite()) {
        return Err(Error::Solver("unary costs must be finite".to_string()));
    }

    Ok(())
}

/// Alpha-expansion move making solver
///
/// Each move lets every node either keep its label or switch to one label
/// `alpha`; the optimal move is an s-t minimum cut. Moves are retried over
/// all labels until a full cycle brings no improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaExpansion {
    pub max_cycles: usize,
}

impl Default for AlphaExpansion {
    fn default() -> Self {
        Self { max_cycles: 10 }
    }
}

impl AlphaExpansion {
    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Best labeling reachable from `labels` by one expansion of `alpha`
    fn expand(
        edges: &[(usize, usize)],
        edge_weights: &[f32],
        unary: ArrayView2<'_, f64>,
        labels: &[usize],
        alpha: usize,
    ) -> Vec<usize> {
        let n = labels.len();
        let (source, sink) = (n, n + 1);

        // x_p = 0 keeps the current label (source side), x_p = 1 takes alpha
        let mut keep_cost: Vec<f64> = (0..n).map(|p| unary[[labels[p], p]]).collect();
        let mut alpha_cost: Vec<f64> = (0..n).map(|p| unary[[alpha, p]]).collect();

        let mut graph = FlowGraph::new(n + 2);

        for (&(p, q), &w) in edges.iter().zip(edge_weights) {
            if p == q || w == 0.0 {
                continue;
            }
            let w = w as f64;
            let potts = |a: usize, b: usize| if a == b { 0.0 } else { w };

            let e00 = potts(labels[p], labels[q]);
            let e01 = potts(labels[p], alpha);
            let e10 = potts(alpha, labels[q]);

            // E(x_p, x_q) = e00 + (e10 - e00) x_p + (0 - e10) x_q
            //             + (e01 + e10 - e00) (1 - x_p) x_q
            add_linear(&mut keep_cost, &mut alpha_cost, p, e10 - e00);
            add_linear(&mut keep_cost, &mut alpha_cost, q, -e10);

            let pairwise = e01 + e10 - e00;
            if pairwise > 0.0 {
                graph.add_edge(p, q, pairwise, 0.0);
            }
        }

        for p in 0..n {
            let shift = keep_cost[p].min(alpha_cost[p]);
            let to_alpha = alpha_cost[p] - shift;
            let to_keep = keep_cost[p] - shift;

            if to_alpha > 0.0 {
                graph.add_edge(source, p, to_alpha, 0.0);
            }
            if to_keep > 0.0 {
                graph.add_edge(p, sink, to_keep, 0.0);
            }
        }

        graph.max_flow(source, sink);
        let keeps = graph.source_side(source);

        labels
            .iter()
            .enumerate()
            .map(|(p, &l)| if keeps[p] { l } else { alpha })
            .collect()
    }
}

/// Add `coefficient * x_p` to the unary terms of node `p`
fn add_linear(keep_cost: &mut [f64], alpha_cost: &mut [f64], p: usize, coefficient: f64) {
    if coefficient > 0.0 {
        alpha_cost[p] += coefficient;
    } else {
        // c x = c - c (1 - x)
        keep_cost[p] -= coefficient;
    }
}

impl EnergySolver for AlphaExpansion {
    fn solve(
        &self,
        edges: &[(usize, usize)],
        edge_weights: &[f32],
        unary: ArrayView2<'_, f64>,
        labels: &mut [usize],
    ) -> Result<()> {
        validate(edges, edge_weights, unary, labels)?;

        let n_labels = unary.nrows();
        let mut energy = potts_energy(edges, edge_weights, unary, labels);

        for cycle in 0..self.max_cycles {
            let mut improved = false;

            for alpha in 0..n_labels {
                let candidate = Self::expand(edges, edge_weights, unary, labels, alpha);
                let candidate_energy = potts_energy(edges, edge_weights, unary, &candidate);

                if candidate_energy < energy - 1e-9 * energy.abs().max(1.0) {
                    labels.copy_from_slice(&candidate);
                    energy = candidate_energy;
                    improved = true;
                }
            }

            debug!("alpha-expansion cycle {}: energy {:.6}", cycle, energy);

            if !improved {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    /// Chain of `n` nodes, all preferring label 0 except a weakly-held middle node
    fn chain(n: usize) -> (Vec<(usize, usize)>, Vec<f32>, Array2<f64>) {
        let edges: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        let weights = vec![1.0; edges.len()];
        let mut unary = Array2::zeros((2, n));
        for p in 0..n {
            unary[[0, p]] = 0.1;
            unary[[1, p]] = 2.0;
        }
        unary[[0, n / 2]] = 0.6;
        unary[[1, n / 2]] = 0.5;
        (edges, weights, unary)
    }

    #[test]
    fn test_smooths_isolated_label() {
        let (edges, weights, unary) = chain(7);
        let mut labels = vec![0, 0, 0, 1, 0, 0, 0];
        let before = potts_energy(&edges, &weights, unary.view(), &labels);

        AlphaExpansion::default()
            .solve(&edges, &weights, unary.view(), &mut labels)
            .unwrap();

        assert_eq!(labels, vec![0; 7]);
        assert!(potts_energy(&edges, &weights, unary.view(), &labels) < before);
    }

    #[test]
    fn test_zero_cycles_keeps_labels() {
        let (edges, weights, unary) = chain(7);
        let mut labels = vec![0, 0, 0, 1, 0, 0, 0];

        AlphaExpansion::default()
            .with_max_cycles(0)
            .solve(&edges, &weights, unary.view(), &mut labels)
            .unwrap();
        assert_eq!(labels, vec![0, 0, 0, 1, 0, 0, 0]);

        AlphaExpansion::default()
            .with_max_cycles(1)
            .solve(&edges, &weights, unary.view(), &mut labels)
            .unwrap();
        assert_eq!(labels, vec![0; 7]);
    }

    #[test]
    fn test_without_edges_picks_cheapest_label() {
        let mut unary = Array2::zeros((3, 3));
        unary[[0, 0]] = 1.0;
        unary[[1, 0]] = 0.2;
        unary[[2, 0]] = 3.0;
        unary[[0, 1]] = 0.0;
        unary[[1, 1]] = 1.0;
        unary[[2, 1]] = 1.0;
        unary[[0, 2]] = 2.0;
        unary[[1, 2]] = 2.0;
        unary[[2, 2]] = 0.5;
        let mut labels = vec![0, 2, 0];

        AlphaExpansion::default()
            .solve(&[], &[], unary.view(), &mut labels)
            .unwrap();
        assert_eq!(labels, vec![1, 0, 2]);
    }

    #[test]
    fn test_strong_evidence_survives_smoothing() {
        let (edges, weights, mut unary) = chain(5);
        unary[[0, 2]] = 10.0;
        unary[[1, 2]] = 0.0;
        let mut labels = vec![0, 0, 1, 0, 0];

        AlphaExpansion::default()
            .solve(&edges, &weights, unary.view(), &mut labels)
            .unwrap();
        assert_eq!(labels, vec![0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_energy_never_increases() {
        let n = 30;
        let mut unary = Array2::zeros((3, n));
        for p in 0..n {
            for l in 0..3 {
                unary[[l, p]] = ((p * 7 + l * 13) % 11) as f64 / 5.0;
            }
        }
        let edges: Vec<(usize, usize)> = (0..n).map(|i| (i, (i * 5 + 3) % n)).collect();
        let weights = vec![0.7; edges.len()];
        let mut labels: Vec<usize> = (0..n).map(|p| p % 3).collect();
        let before = potts_energy(&edges, &weights, unary.view(), &labels);

        AlphaExpansion::default()
            .solve(&edges, &weights, unary.view(), &mut labels)
            .unwrap();
        let after = potts_energy(&edges, &weights, unary.view(), &labels);
        assert!(after <= before);
    }

    #[test]
    fn test_potts_energy() {
        let edges = vec![(0, 1), (1, 2)];
        let weights = vec![0.5, 2.0];
        let unary = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

        let energy = potts_energy(&edges, &weights, unary.view(), &[0, 0, 1]);
        assert_relative_eq!(energy, 1.0 + 2.0 + 6.0 + 2.0);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let unary = Array2::<f64>::zeros((2, 2));
        let solver = AlphaExpansion::default();

        assert!(solver.solve(&[(0, 5)], &[1.0], unary.view(), &mut [0, 0]).is_err());
        assert!(solver.solve(&[(0, 1)], &[], unary.view(), &mut [0, 0]).is_err());
        assert!(solver.solve(&[], &[], unary.view(), &mut [0, 3]).is_err());
        assert!(solver.solve(&[], &[], unary.view(), &mut [0]).is_err());

        let mut bad = Array2::<f64>::zeros((2, 2));
        bad[[1, 1]] = f64::INFINITY;
        assert!(solver.solve(&[], &[], bad.view(), &mut [0, 0]).is_err());
    }
}
