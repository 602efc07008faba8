//! Rule bundle types.
//!
//! A bundle is the persisted output of training: an ordered list of
//! conjunctive rules over the fixed feature schema. Bundles are immutable
//! once stored; a new training run produces a new bundle.

use std::fmt;

use chrono::{DateTime, Utc};
use ecoroute_core::{Decision, FeatureName, FeatureVector};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, RuleError};

/// Bundle layout version written into every artifact.
pub const BUNDLE_FORMAT: u32 = 1;

/// Comparison used by a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `feature <= threshold`; the left branch of a split.
    #[serde(rename = "<=")]
    LessOrEqual,
    /// `feature > threshold`; the right branch of a split.
    #[serde(rename = ">")]
    GreaterThan,
}

impl Operator {
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::LessOrEqual => value <= threshold,
            Self::GreaterThan => value > threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
        }
    }
}

/// One comparison of a feature against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub feature: FeatureName,
    #[serde(rename = "op")]
    pub operator: Operator,
    pub threshold: f64,
}

impl Condition {
    pub fn new(feature: FeatureName, operator: Operator, threshold: f64) -> Self {
        Self {
            feature,
            operator,
            threshold,
        }
    }

    pub fn holds(&self, features: &FeatureVector) -> bool {
        self.operator
            .evaluate(features.value(self.feature), self.threshold)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.feature,
            self.operator.as_str(),
            self.threshold
        )
    }
}

/// A conjunction of conditions and the decision it implies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub conditions: Vec<Condition>,
    pub decision: Decision,
    /// Share of training samples at this leaf labelled Cloud.
    pub probability: f64,
    /// Training samples that reached this leaf.
    #[serde(rename = "samples")]
    pub sample_count: usize,
}

impl Rule {
    /// Whether every condition holds. A rule without conditions always matches.
    pub fn matches(&self, features: &FeatureVector) -> bool {
        self.conditions.iter().all(|c| c.holds(features))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            f.write_str("ALWAYS")?;
        } else {
            f.write_str("IF ")?;
            for (i, condition) in self.conditions.iter().enumerate() {
                if i > 0 {
                    f.write_str(" AND ")?;
                }
                write!(f, "{}", condition)?;
            }
        }
        write!(
            f,
            " THEN {} (p={:.2}, n={})",
            self.decision, self.probability, self.sample_count
        )
    }
}

/// Summary of the training run that produced a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_samples: usize,
    pub test_samples: usize,
    /// Accuracy on the held-out split, `None` when nothing was held out.
    pub test_accuracy: Option<f64>,
    /// Rows whose label was derived from the margins.
    pub derived_labels: usize,
    /// Rows discarded during cleaning.
    pub dropped_rows: usize,
}

/// Versioned, ordered rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBundle {
    pub format: u32,
    pub bundle_id: Uuid,
    /// Store-assigned version, 0 until persisted.
    #[serde(default)]
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    pub feature_schema: Vec<FeatureName>,
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<TrainingReport>,
}

impl RuleBundle {
    /// Create an unversioned bundle over the standard schema.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            format: BUNDLE_FORMAT,
            bundle_id: Uuid::new_v4(),
            version: 0,
            trained_at: Utc::now(),
            feature_schema: FeatureName::ALL.to_vec(),
            rules,
            report: None,
        }
    }

    pub fn with_report(mut self, report: TrainingReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Check that the bundle can be evaluated against [`FeatureVector`].
    pub fn validate(&self) -> Result<()> {
        if self.format != BUNDLE_FORMAT {
            return Err(RuleError::Validation(format!(
                "Unsupported bundle format {}",
                self.format
            )));
        }
        if self.feature_schema != FeatureName::ALL {
            return Err(RuleError::Validation(format!(
                "Feature schema mismatch: {:?}",
                self.feature_schema
            )));
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if !(0.0..=1.0).contains(&rule.probability) {
                return Err(RuleError::Validation(format!(
                    "Rule {} probability {} out of range",
                    index, rule.probability
                )));
            }
            if rule.conditions.iter().any(|c| !c.threshold.is_finite()) {
                return Err(RuleError::Validation(format!(
                    "Rule {} has a non-finite threshold",
                    index
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a JSON artifact.
    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: RuleBundle = serde_json::from_str(json)?;
        bundle.validate()?;
        Ok(bundle)
    }
}
