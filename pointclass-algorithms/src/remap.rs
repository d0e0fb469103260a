//! Transfer of processed-point labels back onto the full-resolution cloud

use crate::statistics::Statistics;
use log::{debug, info};
use pointclass_core::{Color, Error, LabelCatalog, PointSet, Result, LABEL_UNCLASSIFIED};
use rayon::prelude::*;

/// Writes predicted classes onto the output points of a [`PointSet`]
///
/// On entry the cloud's labels (if any) are training codes; on return every
/// label is an ASPRS code. A point is updated with its predicted class unless
/// the class's ASPRS code is in the skip set, or `unclassified_only` is set
/// and the point already carries a class. Points that are not updated get
/// their existing label reverted to its ASPRS code.
#[derive(Debug, Clone)]
pub struct OutputRemapper<'a> {
    catalog: &'a LabelCatalog,
    skip: [bool; 256],
    use_colors: bool,
    unclassified_only: bool,
    evaluate: bool,
}

impl<'a> OutputRemapper<'a> {
    pub fn new(catalog: &'a LabelCatalog) -> Self {
        Self {
            catalog,
            skip: [false; 256],
            use_colors: false,
            unclassified_only: false,
            evaluate: false,
        }
    }

    /// ASPRS codes that are never written
    pub fn with_skip(mut self, codes: &[u8]) -> Self {
        for &code in codes {
            self.skip[code as usize] = true;
        }
        self
    }

    /// Write class colors instead of class codes
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_unclassified_only(mut self, unclassified_only: bool) -> Self {
        self.unclassified_only = unclassified_only;
        self
    }

    /// Compare predictions against the cloud's ground-truth labels
    pub fn with_evaluation(mut self, evaluate: bool) -> Self {
        self.evaluate = evaluate;
        self
    }

    /// Remap `set.base.labels` onto `set`, returning finalized statistics when evaluating
    pub fn remap(&self, set: &mut PointSet) -> Result<Option<Statistics>> {
        set.validate()?;

        if set.base.labels.len() != set.base.len() {
            return Err(Error::InvalidData(format!(
                "{} predicted labels for {} processed points",
                set.base.labels.len(),
                set.base.len()
            )));
        }

        if let Some(&class) = set.base.labels.iter().find(|&&c| c as usize >= self.catalog.len()) {
            return Err(Error::InvalidData(format!(
                "predicted class {} outside a catalog of {} classes",
                class,
                self.catalog.len()
            )));
        }

        if self.evaluate && !set.has_labels() {
            return Err(Error::InvalidData(
                "evaluation requires ground-truth labels".to_string(),
            ));
        }

        let predicted: Vec<u8> = set
            .point_map
            .par_iter()
            .map(|&idx| set.base.labels[idx])
            .collect();

        let statistics = if self.evaluate {
            let truth = set.labels.as_deref().unwrap_or_default();
            let catalog = self.catalog;
            let mut stats = predicted
                .par_iter()
                .zip(truth.par_iter())
                .fold(
                    || Statistics::new(catalog),
                    |mut stats, (&p, &t)| {
                        stats.record(p as usize, t as usize);
                        stats
                    },
                )
                .reduce(|| Statistics::new(catalog), Statistics::merge);
            stats.finalize();
            stats.print();
            Some(stats)
        } else {
            None
        };

        if !self.use_colors && !set.has_labels() {
            debug!("Allocating labels for {} points", set.len());
            set.labels = Some(vec![LABEL_UNCLASSIFIED; set.len()]);
        }
        if self.use_colors && !set.has_colors() {
            set.colors = Some(vec![Color::default().to_array(); set.len()]);
        }

        let update: Vec<bool> = match set.labels.as_deref().filter(|l| !l.is_empty()) {
            Some(existing) => predicted
                .par_iter()
                .zip(existing.par_iter())
                .map(|(&p, &label)| self.should_update(p, Some(label)))
                .collect(),
            None => predicted.par_iter().map(|&p| self.should_update(p, None)).collect(),
        };

        let asprs = self.catalog.train_to_asprs_codes();

        if let Some(labels) = set.labels.as_mut().filter(|l| !l.is_empty()) {
            let use_colors = self.use_colors;
            labels
                .par_iter_mut()
                .zip(predicted.par_iter())
                .zip(update.par_iter())
                .for_each(|((label, &p), &update)| {
                    *label = if update && !use_colors {
                        asprs[p as usize]
                    } else {
                        asprs[*label as usize]
                    };
                });
        }

        if self.use_colors {
            if let Some(colors) = set.colors.as_mut() {
                let catalog = self.catalog;
                colors
                    .par_iter_mut()
                    .zip(predicted.par_iter())
                    .zip(update.par_iter())
                    .for_each(|((color, &p), &update)| {
                        if let Some(label) = catalog.get(p as usize).filter(|_| update) {
                            *color = label.color().to_array();
                        }
                    });
            }
        }

        let updated = update.iter().filter(|&&u| u).count();
        info!("Updated {} of {} points", updated, set.len());

        Ok(statistics)
    }

    fn should_update(&self, predicted: u8, existing: Option<u8>) -> bool {
        if self.unclassified_only && existing.is_some_and(|l| l != LABEL_UNCLASSIFIED) {
            return false;
        }

        match self.catalog.get(predicted as usize) {
            Some(label) => !self.skip[label.asprs_code() as usize],
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointclass_core::{Point3f, LABEL_UNASSIGNED};

    /// Two processed points shared by four output points
    fn decimated() -> PointSet {
        let points = vec![Point3f::origin(); 4];
        let processed = vec![Point3f::origin(); 2];
        PointSet::with_decimation(points, processed, vec![0, 0, 1, 1]).unwrap()
    }

    #[test]
    fn test_labels_follow_point_map() {
        let catalog = LabelCatalog::training();
        let mut set = decimated();
        set.base.labels = vec![0, 4]; // ground, building

        let stats = OutputRemapper::new(&catalog).remap(&mut set).unwrap();
        assert!(stats.is_none());
        assert_eq!(set.labels.unwrap(), vec![2, 2, 6, 6]);
    }

    #[test]
    fn test_skip_set_reverts_existing_labels() {
        let catalog = LabelCatalog::training();
        let mut set = decimated().with_labels(vec![0, LABEL_UNCLASSIFIED, 1, LABEL_UNASSIGNED]).unwrap();
        set.base.labels = vec![0, 4];

        OutputRemapper::new(&catalog).with_skip(&[6]).remap(&mut set).unwrap();
        let labels = set.labels.unwrap();
        assert_eq!(labels, vec![2, 2, 3, 0]);
        assert!(!labels.contains(&6));
    }

    #[test]
    fn test_unclassified_only() {
        let catalog = LabelCatalog::training();
        let mut set = decimated().with_labels(vec![4, LABEL_UNCLASSIFIED, 4, LABEL_UNCLASSIFIED]).unwrap();
        set.base.labels = vec![0, 0];

        OutputRemapper::new(&catalog)
            .with_unclassified_only(true)
            .remap(&mut set)
            .unwrap();
        assert_eq!(set.labels.unwrap(), vec![6, 2, 6, 2]);
    }

    #[test]
    fn test_colors_written_instead_of_codes() {
        let catalog = LabelCatalog::training();
        let mut set = decimated().with_labels(vec![1, 1, 1, 1]).unwrap();
        set.base.labels = vec![0, 4];

        OutputRemapper::new(&catalog).with_colors(true).remap(&mut set).unwrap();

        let ground = catalog.get(0).unwrap().color().to_array();
        let building = catalog.get(4).unwrap().color().to_array();
        assert_eq!(set.colors.unwrap(), vec![ground, ground, building, building]);
        assert_eq!(set.labels.unwrap(), vec![3; 4]);
    }

    #[test]
    fn test_evaluation() {
        let catalog = LabelCatalog::training();
        let mut set = decimated().with_labels(vec![0, 4, 4, LABEL_UNASSIGNED]).unwrap();
        set.base.labels = vec![0, 4];

        let stats = OutputRemapper::new(&catalog)
            .with_evaluation(true)
            .remap(&mut set)
            .unwrap()
            .unwrap();
        assert_eq!(stats.get(0, 0), 1);
        assert_eq!(stats.get(4, 0), 1);
        assert_eq!(stats.get(4, 4), 1);
        assert_eq!(stats.ignored(), 1);
        assert!(stats.report().is_some());
    }

    #[test]
    fn test_evaluation_without_labels_fails() {
        let catalog = LabelCatalog::training();
        let mut set = decimated();
        set.base.labels = vec![0, 0];
        assert!(OutputRemapper::new(&catalog).with_evaluation(true).remap(&mut set).is_err());
    }

    #[test]
    fn test_missing_predictions_rejected() {
        let catalog = LabelCatalog::training();
        let mut set = decimated();
        set.base.labels = vec![0];
        assert!(OutputRemapper::new(&catalog).remap(&mut set).is_err());

        set.base.labels = vec![0, 200];
        assert!(OutputRemapper::new(&catalog).remap(&mut set).is_err());
    }
}
