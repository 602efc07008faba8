//! First-match rule evaluation.

use ecoroute_core::{Decision, FeatureVector};
use serde::Serialize;
use tracing::debug;

use crate::bundle::RuleBundle;

/// Result of evaluating a bundle against one feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Evaluation {
    Matched {
        decision: Decision,
        probability: f64,
        rule_index: usize,
    },
    NoMatch,
}

impl Evaluation {
    /// The matched decision, or `default` on no match.
    pub fn decision_or(&self, default: Decision) -> Decision {
        match self {
            Evaluation::Matched { decision, .. } => *decision,
            Evaluation::NoMatch => default,
        }
    }
}

/// Scan the rules in order and return the first one whose conditions all hold.
///
/// Tree-derived bundles have exactly one matching rule per vector; hand-edited
/// bundles may have overlaps or gaps, which resolve to the earliest rule or
/// to [`Evaluation::NoMatch`].
pub fn evaluate(bundle: &RuleBundle, features: &FeatureVector) -> Evaluation {
    for (rule_index, rule) in bundle.rules.iter().enumerate() {
        if rule.matches(features) {
            debug!(
                category = "rules",
                rule_index,
                decision = %rule.decision,
                probability = rule.probability,
                "Rule matched"
            );
            return Evaluation::Matched {
                decision: rule.decision,
                probability: rule.probability,
                rule_index,
            };
        }
    }
    debug!(category = "rules", rules = bundle.rules.len(), "No rule matched");
    Evaluation::NoMatch
}

/// Indices of every rule that matches. Used to check bundle partitioning.
pub fn matching_rules(bundle: &RuleBundle, features: &FeatureVector) -> Vec<usize> {
    bundle
        .rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.matches(features))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Condition, Operator, Rule};
    use ecoroute_core::FeatureName;

    fn rule(conditions: Vec<Condition>, decision: Decision, probability: f64) -> Rule {
        Rule {
            conditions,
            decision,
            probability,
            sample_count: 10,
        }
    }

    fn features(rtt_ms: f64, cpu_percent: f64) -> FeatureVector {
        FeatureVector {
            input_size_bytes: 1024,
            rtt_ms,
            cpu_percent,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        let bundle = RuleBundle::new(vec![
            rule(
                vec![Condition::new(FeatureName::CpuPercent, Operator::GreaterThan, 50.0)],
                Decision::Cloud,
                0.8,
            ),
            rule(vec![], Decision::Local, 0.2),
        ]);

        assert_eq!(
            evaluate(&bundle, &features(10.0, 90.0)),
            Evaluation::Matched {
                decision: Decision::Cloud,
                probability: 0.8,
                rule_index: 0
            }
        );
        assert_eq!(
            evaluate(&bundle, &features(10.0, 20.0)).decision_or(Decision::Cloud),
            Decision::Local
        );
        assert_eq!(matching_rules(&bundle, &features(10.0, 90.0)), vec![0, 1]);
    }

    #[test]
    fn test_gap_is_no_match() {
        let bundle = RuleBundle::new(vec![rule(
            vec![Condition::new(FeatureName::RttMs, Operator::LessOrEqual, 100.0)],
            Decision::Local,
            0.1,
        )]);

        let outcome = evaluate(&bundle, &features(250.0, 10.0));
        assert_eq!(outcome, Evaluation::NoMatch);
        assert_eq!(outcome.decision_or(Decision::Cloud), Decision::Cloud);
    }

    #[test]
    fn test_empty_bundle_is_no_match() {
        let bundle = RuleBundle::new(vec![]);
        assert_eq!(evaluate(&bundle, &features(1.0, 1.0)), Evaluation::NoMatch);
    }

    #[test]
    fn test_unknown_battery_compares_as_negative_one() {
        let bundle = RuleBundle::new(vec![rule(
            vec![Condition::new(
                FeatureName::BatteryPercent,
                Operator::LessOrEqual,
                20.0,
            )],
            Decision::Cloud,
            0.7,
        )]);
        assert!(matches!(
            evaluate(&bundle, &features(10.0, 10.0)),
            Evaluation::Matched { .. }
        ));
    }
}
