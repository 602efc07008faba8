//! Local-vs-remote decision.
//!
//! Order of evaluation:
//!
//! 1. Battery override: a known battery level below the floor on a device
//!    known not to be charging forces `Cloud`.
//! 2. With a rule bundle, the first matching rule decides; no match means
//!    `Cloud`.
//! 3. Without a bundle, remote candidates are compared against the local
//!    baseline using the selection margins. The acceptable candidate with the
//!    lowest CO2 wins; if none is acceptable the task stays `Local`.
//!
//! Deciding never fails.

use ecoroute_core::config::{EngineConfig, PolicyConfig};
use ecoroute_core::{Decision, EnergyError, FeatureVector, Margins, SiteCost, estimate};
use ecoroute_rules::{Evaluation, RuleBundle, evaluate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Estimated cost of running the task at one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEstimate {
    pub name: String,
    pub time_seconds: f64,
    /// gCO2/kWh of the site's grid.
    pub intensity: f64,
    pub energy_kwh: f64,
    pub co2_grams: f64,
}

impl SiteEstimate {
    pub fn new(
        name: impl Into<String>,
        time_seconds: f64,
        power_watts: f64,
        intensity: f64,
    ) -> Result<Self, EnergyError> {
        let energy = estimate(time_seconds, power_watts, intensity)?;
        Ok(Self {
            name: name.into(),
            time_seconds,
            intensity,
            energy_kwh: energy.energy_kwh,
            co2_grams: energy.co2_grams,
        })
    }

    pub fn cost(&self) -> SiteCost {
        SiteCost::new(self.time_seconds, self.co2_grams)
    }
}

/// Local baseline and reachable remote candidates.
#[derive(Debug, Clone, Default)]
pub struct SiteEstimates {
    pub local: Option<SiteEstimate>,
    pub candidates: Vec<SiteEstimate>,
}

/// One candidate judged against the local baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateAssessment {
    #[serde(flatten)]
    pub site: SiteEstimate,
    pub acceptable: bool,
}

/// Result of the margin comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub local: SiteEstimate,
    pub candidates: Vec<CandidateAssessment>,
    /// Chosen candidate, `None` when the task stays local.
    pub chosen: Option<String>,
    /// Local CO2 minus the chosen site's CO2.
    pub co2_saved_grams: f64,
}

/// Why a decision was made.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionReason {
    BatteryOverride { battery_percent: f64 },
    RuleMatched { rule_index: usize, probability: f64 },
    NoRuleMatched,
    MarginComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub reason: DecisionReason,
    /// Remote candidate to use when the decision is `Cloud`.
    pub candidate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonReport>,
}

/// Decides where a task runs. Reads bundles, never writes them.
#[derive(Debug, Clone)]
pub struct DecisionOrchestrator {
    battery_floor_percent: f64,
    selection: Margins,
}

impl DecisionOrchestrator {
    pub fn new(policy: &PolicyConfig, selection: Margins) -> Self {
        Self {
            battery_floor_percent: policy.battery_floor_percent,
            selection,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.policy, config.selection)
    }

    pub fn decide(
        &self,
        features: &FeatureVector,
        bundle: Option<&RuleBundle>,
        sites: &SiteEstimates,
    ) -> DecisionOutcome {
        if features.battery_critical(self.battery_floor_percent) {
            let battery_percent = features.battery_percent.unwrap_or_default();
            info!(
                category = "decision",
                battery_percent,
                floor = self.battery_floor_percent,
                "Battery critical, offloading"
            );
            return DecisionOutcome {
                decision: Decision::Cloud,
                reason: DecisionReason::BatteryOverride { battery_percent },
                candidate: lowest_co2(&sites.candidates),
                comparison: None,
            };
        }

        if let Some(bundle) = bundle {
            let (decision, reason) = match evaluate(bundle, features) {
                Evaluation::Matched {
                    decision,
                    probability,
                    rule_index,
                } => (
                    decision,
                    DecisionReason::RuleMatched {
                        rule_index,
                        probability,
                    },
                ),
                Evaluation::NoMatch => (Decision::Cloud, DecisionReason::NoRuleMatched),
            };
            info!(
                category = "decision",
                decision = %decision,
                bundle_version = bundle.version,
                reason = ?reason,
                "Rule bundle decision"
            );
            return DecisionOutcome {
                decision,
                reason,
                candidate: match decision {
                    Decision::Cloud => lowest_co2(&sites.candidates),
                    Decision::Local => None,
                },
                comparison: None,
            };
        }

        let Some(local) = &sites.local else {
            debug!(category = "decision", "No bundle and no local estimate, staying local");
            return DecisionOutcome {
                decision: Decision::Local,
                reason: DecisionReason::MarginComparison,
                candidate: None,
                comparison: None,
            };
        };

        let report = self.compare(local, &sites.candidates);
        let decision = if report.chosen.is_some() {
            Decision::Cloud
        } else {
            Decision::Local
        };
        info!(
            category = "decision",
            decision = %decision,
            chosen = ?report.chosen,
            co2_saved_grams = report.co2_saved_grams,
            "Margin comparison decision"
        );
        DecisionOutcome {
            decision,
            reason: DecisionReason::MarginComparison,
            candidate: report.chosen.clone(),
            comparison: Some(report),
        }
    }

    /// Judge every candidate against the local baseline.
    pub fn compare(&self, local: &SiteEstimate, candidates: &[SiteEstimate]) -> ComparisonReport {
        let baseline = local.cost();
        let assessed: Vec<CandidateAssessment> = candidates
            .iter()
            .map(|site| CandidateAssessment {
                acceptable: self.selection.accepts(&baseline, &site.cost()),
                site: site.clone(),
            })
            .collect();

        let chosen = assessed
            .iter()
            .filter(|c| c.acceptable)
            .min_by(|a, b| a.site.co2_grams.total_cmp(&b.site.co2_grams));

        let co2_saved_grams = chosen
            .map(|c| local.co2_grams - c.site.co2_grams)
            .unwrap_or(0.0);

        ComparisonReport {
            local: local.clone(),
            chosen: chosen.map(|c| c.site.name.clone()),
            candidates: assessed,
            co2_saved_grams,
        }
    }
}

/// Name of the candidate with the lowest estimated CO2.
fn lowest_co2(candidates: &[SiteEstimate]) -> Option<String> {
    candidates
        .iter()
        .min_by(|a, b| a.co2_grams.total_cmp(&b.co2_grams))
        .map(|c| c.name.clone())
}
