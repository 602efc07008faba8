//! Training pipeline tests.

use ecoroute_core::config::TrainingConfig;
use ecoroute_core::{Decision, FeatureName, FeatureVector, Margins, RawTelemetryRow};
use ecoroute_rules::{Evaluation, RuleCompiler, RuleError, evaluate, matching_rules};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn row(features: [f64; 6], offload_better: Option<f64>) -> RawTelemetryRow {
    RawTelemetryRow {
        input_size_bytes: Some(features[0]),
        rtt_ms: Some(features[1]),
        cpu_percent: Some(features[2]),
        battery_percent: Some(features[3]),
        is_charging: Some(features[4]),
        gpu_available: Some(features[5]),
        offload_better,
        ..Default::default()
    }
}

/// Rows separable on rtt alone: low rtt runs locally, high rtt offloads.
fn separable_rows() -> Vec<RawTelemetryRow> {
    let mut rows = Vec::new();
    for _ in 0..20 {
        for (rtt, label) in [(10.0, 0.0), (20.0, 0.0), (300.0, 1.0), (400.0, 1.0)] {
            rows.push(row([50_000.0, rtt, 40.0, 80.0, 1.0, 0.0], Some(label)));
        }
    }
    rows
}

fn random_rows(seed: u64, count: usize) -> Vec<RawTelemetryRow> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let rtt: f64 = rng.gen_range(5.0..500.0);
            let cpu: f64 = rng.gen_range(0.0..100.0);
            let battery: f64 = rng.gen_range(0.0..100.0);
            let size = rng.gen_range(1_000.0..5_000_000.0_f64).round();
            let label = if rtt > 200.0 && cpu > 30.0 { 1.0 } else { 0.0 };
            row([size, rtt, cpu, battery, 0.0, 0.0], Some(label))
        })
        .collect()
}

#[test]
fn test_separable_dataset_is_fully_reclassified() {
    let rows = separable_rows();
    let bundle = RuleCompiler::default().train(&rows).unwrap();

    assert_eq!(bundle.rules.len(), 2);
    for raw in &rows {
        let features = FeatureVector::from_array(raw.feature_values().unwrap());
        let expected = Decision::from_offload(raw.offload_better == Some(1.0));
        assert_eq!(evaluate(&bundle, &features).decision_or(Decision::Local), expected);
    }

    let report = bundle.report.unwrap();
    assert_eq!(report.train_samples + report.test_samples, rows.len());
    assert_eq!(report.test_samples, 16);
    assert_eq!(report.test_accuracy, Some(1.0));
    assert_eq!(report.derived_labels, 0);
    assert_eq!(report.dropped_rows, 0);
}

#[test]
fn test_leaf_probabilities_and_counts() {
    let bundle = RuleCompiler::default().train(&separable_rows()).unwrap();

    let local = &bundle.rules[0];
    assert_eq!(local.conditions[0].feature, FeatureName::RttMs);
    assert_eq!(local.decision, Decision::Local);
    assert_eq!(local.probability, 0.0);

    let cloud = &bundle.rules[1];
    assert_eq!(cloud.decision, Decision::Cloud);
    assert_eq!(cloud.probability, 1.0);
    assert_eq!(local.sample_count + cloud.sample_count, 64);
}

#[test]
fn test_single_class_is_insufficient() {
    let rows: Vec<_> = (0..30)
        .map(|i| row([1000.0, i as f64, 10.0, 50.0, 1.0, 0.0], Some(1.0)))
        .collect();

    match RuleCompiler::default().train(&rows) {
        Err(RuleError::InsufficientData { classes, samples }) => {
            assert_eq!(classes, 1);
            assert_eq!(samples, 30);
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn test_empty_dataset_is_insufficient() {
    assert!(matches!(
        RuleCompiler::default().train(&[]),
        Err(RuleError::InsufficientData {
            classes: 0,
            samples: 0
        })
    ));
}

#[test]
fn test_unparseable_rows_are_dropped() {
    let mut rows = separable_rows();
    rows.push(RawTelemetryRow {
        rtt_ms: None,
        ..rows[0].clone()
    });
    rows.push(RawTelemetryRow {
        offload_better: None,
        ..rows[0].clone()
    });

    let compiler = RuleCompiler::default();
    let cleaned = compiler.clean(&rows);
    assert_eq!(cleaned.dropped_rows, 2);
    assert_eq!(cleaned.samples.len(), 80);

    let bundle = compiler.train(&rows).unwrap();
    assert_eq!(bundle.report.unwrap().dropped_rows, 2);
}

#[test]
fn test_missing_labels_are_derived() {
    let mut rows = Vec::new();
    for i in 0..10 {
        let rtt = 10.0 + i as f64;
        // Remote was slower: label 0.
        rows.push(RawTelemetryRow {
            local_time_s: Some(10.0),
            cloud_time_s: Some(30.0),
            local_co2_g: Some(2.0),
            cloud_co2_g: Some(0.5),
            ..row([1000.0, rtt, 20.0, 90.0, 1.0, 0.0], None)
        });
        // Remote was faster and cleaner: label 1.
        rows.push(RawTelemetryRow {
            local_time_s: Some(10.0),
            cloud_time_s: Some(6.0),
            local_co2_g: Some(2.0),
            cloud_co2_g: Some(0.5),
            ..row([1000.0, rtt, 95.0, 90.0, 1.0, 0.0], None)
        });
    }

    let compiler = RuleCompiler::new(TrainingConfig::default(), Margins::LABELING);
    let cleaned = compiler.clean(&rows);
    assert_eq!(cleaned.derived_labels, 20);
    assert_eq!(cleaned.class_count(), 2);

    let bundle = compiler.train(&rows).unwrap();
    let busy = FeatureVector {
        input_size_bytes: 1000,
        rtt_ms: 12.0,
        cpu_percent: 95.0,
        battery_percent: Some(90.0),
        is_charging: Some(true),
        gpu_available: false,
    };
    assert_eq!(evaluate(&bundle, &busy).decision_or(Decision::Local), Decision::Cloud);
}

#[test]
fn test_every_vector_matches_exactly_one_rule() {
    let bundle = RuleCompiler::default().train(&random_rows(7, 400)).unwrap();
    assert!(bundle.rules.len() > 1);

    let mut probes = Vec::new();
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..500 {
        probes.push(FeatureVector {
            input_size_bytes: rng.gen_range(0..6_000_000),
            rtt_ms: rng.gen_range(0.0..600.0),
            cpu_percent: rng.gen_range(0.0..100.0),
            battery_percent: Some(rng.gen_range(0.0..100.0)),
            is_charging: Some(false),
            gpu_available: false,
        });
    }
    // Vectors sitting exactly on every threshold.
    for rule in &bundle.rules {
        for condition in &rule.conditions {
            let mut values = [100_000.0, 100.0, 50.0, 50.0, 0.0, 0.0];
            values[condition.feature.index()] = condition.threshold;
            probes.push(FeatureVector::from_array(values));
        }
    }

    for features in &probes {
        assert_eq!(matching_rules(&bundle, features).len(), 1, "{:?}", features);
        assert!(matches!(evaluate(&bundle, features), Evaluation::Matched { .. }));
    }
}

#[test]
fn test_training_is_reproducible() {
    let rows = random_rows(3, 200);
    let compiler = RuleCompiler::default();
    let a = compiler.train(&rows).unwrap();
    let b = compiler.train(&rows).unwrap();

    assert_eq!(a.rules, b.rules);
    assert_eq!(a.report, b.report);
    assert_ne!(a.bundle_id, b.bundle_id);
}

#[test]
fn test_depth_bound_is_respected() {
    let compiler = RuleCompiler::new(
        TrainingConfig {
            max_depth: 2,
            ..Default::default()
        },
        Margins::LABELING,
    );
    let bundle = compiler.train(&random_rows(11, 300)).unwrap();
    assert!(bundle.rules.len() <= 4);
    assert!(bundle.rules.iter().all(|r| r.conditions.len() <= 2));
    assert!(bundle.rules.iter().all(|r| r.sample_count >= 5));
}
