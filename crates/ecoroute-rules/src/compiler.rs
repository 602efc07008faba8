//! Training pipeline: dataset rows to a rule bundle.

use ecoroute_core::config::{EngineConfig, TrainingConfig};
use ecoroute_core::{Decision, Margins, RawTelemetryRow};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::bundle::{RuleBundle, TrainingReport};
use crate::error::{Result, RuleError};
use crate::tree::{DecisionTree, Sample, TreeParams};

/// Rows that survived cleaning.
#[derive(Debug, Clone, Default)]
pub struct CleanedDataset {
    pub samples: Vec<Sample>,
    pub derived_labels: usize,
    pub dropped_rows: usize,
}

impl CleanedDataset {
    /// Number of distinct outcome classes present.
    pub fn class_count(&self) -> usize {
        let cloud = self.samples.iter().any(|s| s.cloud);
        let local = self.samples.iter().any(|s| !s.cloud);
        cloud as usize + local as usize
    }
}

/// Trains decision trees and flattens them into rule bundles.
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    training: TrainingConfig,
    margins: Margins,
}

impl RuleCompiler {
    /// `margins` label rows whose outcome was not recorded.
    pub fn new(training: TrainingConfig, margins: Margins) -> Self {
        Self { training, margins }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.training.clone(), config.labeling)
    }

    /// Drop unusable rows and label the rest.
    pub fn clean(&self, rows: &[RawTelemetryRow]) -> CleanedDataset {
        let mut cleaned = CleanedDataset::default();
        for row in rows {
            match (row.feature_values(), row.label(&self.margins)) {
                (Some(features), Some(label)) => {
                    if label.derived {
                        cleaned.derived_labels += 1;
                    }
                    cleaned.samples.push(Sample {
                        features,
                        cloud: label.offload_better,
                    });
                }
                _ => cleaned.dropped_rows += 1,
            }
        }
        cleaned
    }

    /// Train a new, unversioned bundle.
    ///
    /// Fails with [`RuleError::InsufficientData`] when fewer than two outcome
    /// classes remain after cleaning.
    pub fn train(&self, rows: &[RawTelemetryRow]) -> Result<RuleBundle> {
        let cleaned = self.clean(rows);
        let classes = cleaned.class_count();
        if classes < 2 {
            return Err(RuleError::InsufficientData {
                classes,
                samples: cleaned.samples.len(),
            });
        }

        let (train, test) = self.stratified_split(&cleaned.samples);
        debug!(
            category = "rules",
            train = train.len(),
            test = test.len(),
            dropped = cleaned.dropped_rows,
            derived = cleaned.derived_labels,
            "Dataset prepared"
        );

        let tree = DecisionTree::fit(
            &train,
            TreeParams {
                max_depth: self.training.max_depth,
                min_samples_leaf: self.training.min_samples_leaf,
            },
        )?;

        let test_accuracy = (!test.is_empty()).then(|| {
            let correct = test
                .iter()
                .filter(|s| tree.predict(&s.features) == Decision::from_offload(s.cloud))
                .count();
            correct as f64 / test.len() as f64
        });

        let report = TrainingReport {
            train_samples: train.len(),
            test_samples: test.len(),
            test_accuracy,
            derived_labels: cleaned.derived_labels,
            dropped_rows: cleaned.dropped_rows,
        };
        let bundle = RuleBundle::new(tree.to_rules()).with_report(report);

        info!(
            category = "rules",
            rules = bundle.rules.len(),
            train = train.len(),
            test_accuracy = ?test_accuracy,
            "Rule bundle compiled"
        );
        Ok(bundle)
    }

    /// Seeded split holding out `test_fraction` of each class.
    ///
    /// Every class keeps at least one training row.
    fn stratified_split(&self, samples: &[Sample]) -> (Vec<Sample>, Vec<Sample>) {
        let mut rng = StdRng::seed_from_u64(self.training.seed);
        let mut train = Vec::with_capacity(samples.len());
        let mut test = Vec::new();

        for class in [false, true] {
            let mut members: Vec<Sample> =
                samples.iter().filter(|s| s.cloud == class).copied().collect();
            members.shuffle(&mut rng);

            let held_out = ((members.len() as f64 * self.training.test_fraction).floor() as usize)
                .min(members.len().saturating_sub(1));
            test.extend_from_slice(&members[..held_out]);
            train.extend_from_slice(&members[held_out..]);
        }

        (train, test)
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new(TrainingConfig::default(), Margins::LABELING)
    }
}
