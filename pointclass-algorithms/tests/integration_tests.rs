//! Integration tests for pointclass-algorithms
//!
//! These tests run the training and inference passes together on small
//! synthetic scenes.

use nalgebra::Point3;
use ndarray::Array2;
use pointclass_algorithms::*;
use pointclass_core::{
    argmax, FeatureMatrix, FeatureSet, LabelCatalog, NearestNeighborSearch, Point3f, PointSet,
    LABEL_UNASSIGNED, LABEL_UNCLASSIFIED,
};
use rand::prelude::*;
use rand::rngs::StdRng;

/// Flat ground at z = 0 with a box-shaped building on one side, labeled with ASPRS codes
fn create_scene(rng: &mut StdRng) -> (Vec<Point3f>, Vec<u8>) {
    let mut points = Vec::new();
    let mut labels = Vec::new();

    for _ in 0..300 {
        points.push(Point3::new(rng.gen_range(0.0..30.0), rng.gen_range(0.0..30.0), rng.gen_range(0.0..0.2)));
        labels.push(2); // ground
    }
    for _ in 0..100 {
        points.push(Point3::new(rng.gen_range(20.0..28.0), rng.gen_range(20.0..28.0), rng.gen_range(6.0..8.0)));
        labels.push(6); // building
    }

    (points, labels)
}

fn height_features(points: &[Point3f]) -> FeatureMatrix {
    FeatureMatrix::from_columns(vec![points.iter().map(|p| p.z).collect()]).unwrap()
}

fn unary_matrix(rows: &[Vec<f32>]) -> Array2<f64> {
    let mut unary = Array2::zeros((rows[0].len(), rows.len()));
    for (j, row) in rows.iter().enumerate() {
        for (c, &p) in row.iter().enumerate() {
            unary[[c, j]] = unary_cost(p);
        }
    }
    unary
}

#[test]
fn test_two_class_split() {
    let criterion = GiniCriterion::new(2);
    let mut rng = StdRng::seed_from_u64(1);
    let mut samples = vec![
        Sample::new(1.0, 0),
        Sample::new(2.0, 0),
        Sample::new(5.0, 1),
        Sample::new(6.0, 1),
    ];
    let mut classes_l = Vec::new();
    let mut classes_r = Vec::new();

    let (threshold, loss) = criterion.best_threshold(&mut samples, &mut classes_l, &mut classes_r, &mut rng);

    // Every sample on one side: 4 - (2² + 2²) / 4
    let no_split = 4.0 - 8.0 / 4.0;
    assert!(threshold > 2.0 && threshold < 5.0);
    assert!(loss < no_split);
}

#[test]
fn test_uniform_scores_all_ground() {
    let points: Vec<Point3f> = (0..100).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect();
    let features = FeatureMatrix::from_rows(&vec![vec![0.0f32]; 100]).unwrap();
    let classifier = |_: &[f32], probs: &mut [f32]| probs.copy_from_slice(&[0.9, 0.05, 0.05]);

    let regularizer = LabelRegularizer::new(&classifier, &features, 3).unwrap();
    let labels = regularizer.argmax_labels(&points).unwrap();
    assert_eq!(labels, vec![0u8; 100]);
}

#[test]
fn test_training_then_classification() {
    let mut rng = StdRng::seed_from_u64(2024);
    let catalog = LabelCatalog::training();
    let (points, asprs) = create_scene(&mut rng);
    let features = height_features(&points);
    let set = PointSet::new(points.clone())
        .with_labels(catalog.to_training_codes(&asprs))
        .unwrap();

    // Collect a balanced sample set
    let mut sample_points = Vec::new();
    let mut sample_classes = Vec::new();
    let mut initialized = None;
    let summaries = collect_training_data(
        vec![TrainingCloud {
            name: "scene".to_string(),
            point_set: set.clone(),
            features: features.clone(),
        }],
        &catalog,
        &TrainingOptions::default(),
        &mut rng,
        |n_features, n_labels| initialized = Some((n_features, n_labels)),
        |_, idx, class| {
            sample_points.push(idx);
            sample_classes.push(class);
        },
    )
    .unwrap();

    assert_eq!(initialized, Some((1, catalog.len())));
    assert_eq!(summaries[0].1.samples_per_label, 100);
    assert_eq!(sample_classes.iter().filter(|&&c| c == 0).count(), 100);
    assert_eq!(sample_classes.iter().filter(|&&c| c == 4).count(), 100);

    // One-node tree: find the height threshold
    let mut class_of = vec![0usize; features.point_count()];
    for (&p, &c) in sample_points.iter().zip(&sample_classes) {
        class_of[p] = c;
    }
    let splitter = AxisAlignedSplitter::new(&features, &class_of, &sample_points, 0);
    let split = find_best_split(&GiniCriterion::new(catalog.len()), &splitter, &mut rng).unwrap();
    assert_eq!(split.feature, 0);
    assert!(split.threshold > 0.0 && split.threshold < 6.0);

    // Stump classifier from the learned split
    let threshold = split.threshold;
    let classifier = move |ft: &[f32], probs: &mut [f32]| {
        probs.fill(0.01);
        if ft[0] < threshold {
            probs[0] = 0.9;
        } else {
            probs[4] = 0.9;
        }
    };

    for regularization in [Regularization::None, Regularization::LocalSmooth, Regularization::GraphCut] {
        let mut target = set.clone();
        let options = ClassifyOptions::default()
            .with_regularization(regularization)
            .with_radius(1.0)
            .with_evaluation(true);

        let stats = classify_point_set(&mut target, &features, &classifier, &catalog, &options)
            .unwrap()
            .unwrap();
        let report = stats.report().unwrap();
        assert!(report.accuracy > 0.95, "{}: {}", regularization, report.accuracy);

        let written = target.labels.unwrap();
        assert!(written.iter().all(|&code| code == 2 || code == 6));
        let correct = written.iter().zip(&asprs).filter(|(a, b)| a == b).count();
        assert!(correct as f64 > 0.95 * asprs.len() as f64);
    }
}

#[test]
fn test_class_balance_bound() {
    let mut rng = StdRng::seed_from_u64(5);
    let catalog = LabelCatalog::training();

    for max_samples in [3usize, 50, 10_000] {
        let labels: Vec<u8> = (0..500)
            .map(|_| match rng.gen_range(0..10) {
                0 => 2,
                1..=3 => 4,
                4 => LABEL_UNCLASSIFIED,
                5 => LABEL_UNASSIGNED,
                _ => 0,
            })
            .collect();
        let points: Vec<Point3f> = (0..500).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect();
        let features = height_features(&points);
        let set = PointSet::new(points).with_labels(labels).unwrap();

        let options = TrainingOptions::default().with_max_samples(max_samples);
        let extractor = BalancedSampleExtractor::new(&catalog, &options);
        let mut added = vec![0usize; catalog.len()];
        let summary = extractor
            .extract(&set, &features, &mut rng, |_, _, class| added[class] += 1)
            .unwrap()
            .unwrap();

        let bound = summary
            .available
            .iter()
            .copied()
            .filter(|&c| c > 0)
            .min()
            .unwrap()
            .min(max_samples);
        for (class, &count) in added.iter().enumerate() {
            assert!(count <= bound);
            assert!(count <= summary.available[class]);
        }
        assert_eq!(added, summary.added);
    }
}

#[test]
fn test_partition_cover() {
    let mut rng = StdRng::seed_from_u64(11);
    let (points, _) = create_scene(&mut rng);

    for subdivisions in [1usize, 4, 9, 25] {
        let partition = GridPartition::new(&points, subdivisions);
        assert!(partition.len() >= MIN_SUBDIVISIONS);

        let mut owner = vec![None; points.len()];
        for (cell, indices) in partition.non_empty() {
            for &i in indices {
                assert!(owner[i].is_none());
                owner[i] = Some(cell);
            }
        }
        assert!(owner.iter().all(Option::is_some));
    }
}

#[test]
fn test_graph_cut_energy_not_above_argmax() {
    let mut rng = StdRng::seed_from_u64(3);
    let points: Vec<Point3f> = (0..200)
        .map(|_| Point3::new(rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0), 0.0))
        .collect();
    let rows: Vec<Vec<f32>> = (0..200)
        .map(|_| (0..3).map(|_| rng.gen_range(0.0..1.0)).collect())
        .collect();
    let index = SpatialIndex::new(&points);
    let options = GraphCutOptions::default();

    // Edges as the graph-cut pass builds them, with the whole cloud as one partition
    let mut edges = Vec::new();
    for (j, p) in points.iter().enumerate() {
        for (n, _) in index.find_k_nearest(p, options.neighbors) {
            if n != j {
                edges.push((j, n));
            }
        }
    }
    let weights = vec![options.strength; edges.len()];
    let unary = unary_matrix(&rows);

    let initial: Vec<usize> = rows.iter().map(|r| argmax(r)).collect();
    let mut refined = initial.clone();
    AlphaExpansion::default()
        .solve(&edges, &weights, unary.view(), &mut refined)
        .unwrap();

    let before = potts_energy(&edges, &weights, unary.view(), &initial);
    let after = potts_energy(&edges, &weights, unary.view(), &refined);
    assert!(after <= before);
}

#[test]
fn test_local_smooth_radius_zero_matches_argmax() {
    let mut rng = StdRng::seed_from_u64(8);
    let points: Vec<Point3f> = (0..50).map(|i| Point3::new(i as f32 * 0.5, 0.0, 0.0)).collect();
    let rows: Vec<Vec<f32>> = (0..50)
        .map(|_| (0..4).map(|_| rng.gen_range(0.0..1.0)).collect())
        .collect();
    let features = FeatureMatrix::from_rows(&rows).unwrap();
    let index = SpatialIndex::new(&points);
    let echo = |ft: &[f32], probs: &mut [f32]| probs.copy_from_slice(ft);

    let regularizer = LabelRegularizer::new(&echo, &features, 4).unwrap();
    assert_eq!(
        regularizer.local_smooth(&points, &index, 0.0).unwrap(),
        regularizer.argmax_labels(&points).unwrap()
    );
}

#[test]
fn test_remap_skip_policy() {
    let catalog = LabelCatalog::training();
    let points = vec![Point3f::origin(); 6];
    let processed = vec![Point3f::origin(); 3];
    let mut set = PointSet::with_decimation(points, processed, vec![0, 0, 1, 1, 2, 2])
        .unwrap()
        .with_labels(vec![0, 1, LABEL_UNCLASSIFIED, LABEL_UNASSIGNED, 2, LABEL_UNASSIGNED])
        .unwrap();
    set.base.labels = vec![4, 4, 0]; // building, building, ground

    let options = ClassifyOptions::default().with_skip(vec![6]);
    OutputRemapper::new(&catalog)
        .with_skip(&options.skip)
        .remap(&mut set)
        .unwrap();

    let labels = set.labels.unwrap();
    assert!(!labels.contains(&6));
    // Skipped points keep their existing class as an ASPRS code
    assert_eq!(&labels[..4], &[2, 3, 1, 0]);
    assert_eq!(&labels[4..], &[2, 2]);
}

#[test]
fn test_invalid_regularization_is_fatal() {
    assert!(matches!(
        "smooth".parse::<Regularization>(),
        Err(pointclass_core::Error::InvalidRegularization(_))
    ));
    assert!(Regularization::try_from(-1).is_err());
}
