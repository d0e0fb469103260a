//! Evaluation statistics over predicted and ground-truth classes

use log::info;
use pointclass_core::{Error, LabelCatalog, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Ground-truth points of this class
    pub support: u64,
}

/// Finalized evaluation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub accuracy: f64,
    pub total: u64,
    /// Records whose ground truth is not a catalog class
    pub ignored: u64,
    pub classes: Vec<ClassMetrics>,
    /// `confusion_matrix[truth][predicted]`
    pub confusion_matrix: Vec<Vec<u64>>,
}

/// Confusion-matrix accumulator
///
/// Element `[truth][predicted]` counts the points of class `truth` that were
/// labeled `predicted`. Accumulators built on separate threads are combined
/// with [`Statistics::merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    names: Vec<String>,
    matrix: Vec<u64>,
    ignored: u64,
    report: Option<StatisticsReport>,
}

impl Statistics {
    pub fn new(catalog: &LabelCatalog) -> Self {
        Self::with_names(catalog.names())
    }

    pub fn with_names(names: Vec<String>) -> Self {
        let n = names.len();
        Self {
            names,
            matrix: vec![0; n * n],
            ignored: 0,
            report: None,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.names.len()
    }

    /// Record one prediction; ground truth outside the catalog is counted as ignored
    pub fn record(&mut self, predicted: usize, truth: usize) {
        let n = self.n_classes();
        if predicted < n && truth < n {
            self.matrix[truth * n + predicted] += 1;
        } else {
            self.ignored += 1;
        }
    }

    /// Add the counts of `other`, which must cover the same classes
    ///
    /// Accumulators over different catalogs cannot be combined; in release
    /// builds `other` is then dropped.
    pub fn merge(mut self, other: Statistics) -> Self {
        debug_assert_eq!(
            self.n_classes(),
            other.n_classes(),
            "merging statistics over different class counts"
        );
        if self.n_classes() == other.n_classes() {
            for (a, b) in self.matrix.iter_mut().zip(&other.matrix) {
                *a += b;
            }
            self.ignored += other.ignored;
        }
        self.report = None;
        self
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u64 {
        self.matrix[truth * self.n_classes() + predicted]
    }

    pub fn total(&self) -> u64 {
        self.matrix.iter().sum()
    }

    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    fn true_positives(&self, class: usize) -> u64 {
        self.get(class, class)
    }

    fn predicted_as(&self, class: usize) -> u64 {
        (0..self.n_classes()).map(|t| self.get(t, class)).sum()
    }

    fn support(&self, class: usize) -> u64 {
        (0..self.n_classes()).map(|p| self.get(class, p)).sum()
    }

    /// Compute the metrics from the counts recorded so far
    pub fn finalize(&mut self) -> &StatisticsReport {
        let n = self.n_classes();
        let total = self.total();
        let correct: u64 = (0..n).map(|c| self.true_positives(c)).sum();

        let classes = (0..n)
            .map(|c| {
                let tp = self.true_positives(c) as f64;
                let predicted = self.predicted_as(c);
                let support = self.support(c);
                let precision = ratio(tp, predicted as f64);
                let recall = ratio(tp, support as f64);
                let f1 = ratio(2.0 * precision * recall, precision + recall);

                ClassMetrics {
                    name: self.names[c].clone(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let confusion_matrix = self.matrix.chunks(n.max(1)).map(|row| row.to_vec()).collect();

        self.report.insert(StatisticsReport {
            accuracy: ratio(correct as f64, total as f64),
            total,
            ignored: self.ignored,
            classes,
            confusion_matrix,
        })
    }

    /// Report produced by the last [`Statistics::finalize`]
    pub fn report(&self) -> Option<&StatisticsReport> {
        self.report.as_ref()
    }

    /// Log the finalized report
    pub fn print(&self) {
        let Some(report) = &self.report else {
            info!("Statistics not finalized");
            return;
        };

        info!("Accuracy: {:.2}%", report.accuracy * 100.0);
        info!("{:<24} {:>10} {:>10} {:>10} {:>10}", "class", "precision", "recall", "f1", "support");
        for class in report.classes.iter().filter(|c| c.support > 0) {
            info!(
                "{:<24} {:>9.2}% {:>9.2}% {:>9.2}% {:>10}",
                class.name,
                class.precision * 100.0,
                class.recall * 100.0,
                class.f1 * 100.0,
                class.support
            );
        }
        if report.ignored > 0 {
            info!("{} points without a known ground-truth class", report.ignored);
        }
    }

    /// Write the finalized report as JSON
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let report = self
            .report
            .as_ref()
            .ok_or_else(|| Error::Algorithm("statistics written before finalize".to_string()))?;

        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, report)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        info!("Wrote statistics to {}", path.as_ref().display());
        Ok(())
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
