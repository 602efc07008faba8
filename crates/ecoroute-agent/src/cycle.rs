//! One end-to-end decision cycle.
//!
//! probe → decide → execute → account → record. With a stored bundle only
//! the decided site runs. Without one, the cycle benchmarks: the task runs
//! locally and on every candidate, the margin comparison picks the winner,
//! and one telemetry row per candidate is recorded so the next retrain has
//! data to learn from.

use std::sync::Arc;
use std::time::Instant;

use ecoroute_carbon::CarbonIntensityProvider;
use ecoroute_core::config::{CandidateConfig, EngineConfig};
use ecoroute_core::{Decision, FeatureVector, TelemetryRow};
use ecoroute_storage::BundleStore;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::executor::{
    ExecutionError, HttpTaskExecutor, LocalExecutor, LocalRunner, RemoteExecutor, RemoteRun,
};
use crate::feedback::FeedbackLogger;
use crate::orchestrator::{DecisionOrchestrator, DecisionOutcome, SiteEstimate, SiteEstimates};
use crate::outcome::{OutcomeBuilder, RunPair};
use crate::probe::{FeatureProbe, SystemProbe};

/// Name used for the local site in reports.
pub const LOCAL_SITE: &str = "local";

/// What actually ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub site: String,
    pub success: bool,
    pub elapsed_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub features: FeatureVector,
    pub outcome: DecisionOutcome,
    pub execution: ExecutionSummary,
    /// Rows appended to the dataset during this cycle.
    pub recorded: Vec<TelemetryRow>,
    /// Output archive of the remote run that served the task.
    #[serde(skip)]
    pub output: Option<Vec<u8>>,
}

struct RemoteAttempt {
    candidate: CandidateConfig,
    elapsed_seconds: f64,
    result: std::result::Result<RemoteRun, ExecutionError>,
}

impl RemoteAttempt {
    fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            site: self.candidate.name.clone(),
            success: self.result.is_ok(),
            elapsed_seconds: self.elapsed_seconds,
            http_status: match &self.result {
                Ok(run) => Some(run.http_status),
                Err(e) => e.http_status(),
            },
            error: self.result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

pub struct DecisionCycle {
    config: EngineConfig,
    provider: Arc<CarbonIntensityProvider>,
    store: Arc<BundleStore>,
    feedback: FeedbackLogger,
    orchestrator: DecisionOrchestrator,
    outcomes: OutcomeBuilder,
    probe: Arc<dyn FeatureProbe>,
    local: Arc<dyn LocalExecutor>,
    remote: Arc<dyn RemoteExecutor>,
}

impl DecisionCycle {
    /// Build a cycle with the system probe and the configured executors.
    pub fn new(
        config: EngineConfig,
        provider: Arc<CarbonIntensityProvider>,
        store: Arc<BundleStore>,
        feedback: FeedbackLogger,
    ) -> std::result::Result<Self, ecoroute_core::Error> {
        let remote = HttpTaskExecutor::from_config(&config.executor)?;
        Ok(Self {
            orchestrator: DecisionOrchestrator::from_config(&config),
            outcomes: OutcomeBuilder::new(provider.clone(), config.local.clone(), config.labeling),
            probe: Arc::new(SystemProbe::new()),
            local: Arc::new(LocalRunner::from_config(&config.executor)),
            remote: Arc::new(remote),
            config,
            provider,
            store,
            feedback,
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn FeatureProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_local_executor(mut self, local: Arc<dyn LocalExecutor>) -> Self {
        self.local = local;
        self
    }

    pub fn with_remote_executor(mut self, remote: Arc<dyn RemoteExecutor>) -> Self {
        self.remote = remote;
        self
    }

    pub fn feedback(&self) -> &FeedbackLogger {
        &self.feedback
    }

    /// Stop the cycle, waiting for queued retraining.
    pub async fn shutdown(self) {
        self.feedback.shutdown().await;
    }

    /// Run one task archive through the full cycle.
    pub async fn run(&self, archive: Vec<u8>) -> Result<CycleReport> {
        let features = self.probe.collect(archive.len() as u64).await;

        let bundle = match self.store.latest() {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(category = "decision", error = %e, "Cannot read rule bundle, comparing margins");
                None
            }
        };

        match bundle {
            Some(bundle) => {
                let outcome =
                    self.orchestrator
                        .decide(&features, Some(&bundle), &SiteEstimates::default());
                let (execution, output) = self.execute_decided(&outcome, archive).await;
                Ok(CycleReport {
                    features,
                    outcome,
                    execution,
                    recorded: Vec::new(),
                    output,
                })
            }
            None => self.benchmark(features, archive).await,
        }
    }

    /// Run the task at the decided site. A failed remote attempt makes that
    /// candidate unavailable and the next one is tried, then local.
    async fn execute_decided(
        &self,
        outcome: &DecisionOutcome,
        archive: Vec<u8>,
    ) -> (ExecutionSummary, Option<Vec<u8>>) {
        if outcome.decision == Decision::Cloud {
            let mut order: Vec<&CandidateConfig> = Vec::new();
            if let Some(preferred) = outcome
                .candidate
                .as_deref()
                .and_then(|name| self.config.candidate(name))
            {
                order.push(preferred);
            }
            order.extend(
                self.config
                    .candidates
                    .iter()
                    .filter(|c| Some(c.name.as_str()) != outcome.candidate.as_deref()),
            );

            for candidate in order {
                let attempt = self.attempt_remote(candidate, archive.clone()).await;
                let summary = attempt.summary();
                match attempt.result {
                    Ok(run) => return (summary, Some(run.output)),
                    Err(e) => {
                        warn!(
                            category = "decision",
                            candidate = %candidate.name,
                            error = %e,
                            "Candidate unavailable"
                        );
                    }
                }
            }
            warn!(category = "decision", "No remote candidate available, running locally");
        }

        (self.run_local().await, None)
    }

    async fn run_local(&self) -> ExecutionSummary {
        let started = Instant::now();
        match self.local.run().await {
            Ok(run) => ExecutionSummary {
                site: LOCAL_SITE.to_string(),
                success: run.success,
                elapsed_seconds: run.elapsed_seconds,
                http_status: None,
                error: (!run.success).then(|| format!("exit code {:?}", run.exit_code)),
            },
            Err(e) => ExecutionSummary {
                site: LOCAL_SITE.to_string(),
                success: false,
                elapsed_seconds: started.elapsed().as_secs_f64(),
                http_status: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn attempt_remote(&self, candidate: &CandidateConfig, archive: Vec<u8>) -> RemoteAttempt {
        let started = Instant::now();
        let result = self.remote.execute(&candidate.endpoint, archive).await;
        let elapsed_seconds = match &result {
            Ok(run) => run.elapsed_seconds,
            Err(_) => started.elapsed().as_secs_f64(),
        };
        RemoteAttempt {
            candidate: candidate.clone(),
            elapsed_seconds,
            result,
        }
    }

    /// Run everywhere, compare, and record what was measured.
    async fn benchmark(&self, features: FeatureVector, archive: Vec<u8>) -> Result<CycleReport> {
        info!(
            category = "decision",
            candidates = self.config.candidates.len(),
            "No rule bundle, benchmarking all sites"
        );

        let local = self.run_local().await;
        let mut attempts = Vec::with_capacity(self.config.candidates.len());
        for candidate in &self.config.candidates {
            attempts.push(self.attempt_remote(candidate, archive.clone()).await);
        }

        let local_ci = self.provider.intensity(&self.config.local.zone).await.value;
        let mut sites = SiteEstimates {
            local: Some(SiteEstimate::new(
                LOCAL_SITE,
                local.elapsed_seconds,
                self.config.local.power_watts,
                local_ci,
            )?),
            candidates: Vec::new(),
        };
        for attempt in attempts.iter().filter(|a| a.result.is_ok()) {
            let ci = self.provider.intensity(&attempt.candidate.zone).await.value;
            sites.candidates.push(SiteEstimate::new(
                attempt.candidate.name.clone(),
                attempt.elapsed_seconds,
                attempt.candidate.power_watts,
                ci,
            )?);
        }

        let outcome = self.orchestrator.decide(&features, None, &sites);

        let mut recorded = Vec::with_capacity(attempts.len());
        for attempt in &attempts {
            let run = RunPair {
                local_time_s: local.elapsed_seconds,
                local_ok: local.success,
                cloud_time_s: attempt.elapsed_seconds,
                cloud_ok: attempt.result.is_ok(),
                cloud_http_status: attempt.summary().http_status.unwrap_or(0),
            };
            let row = self
                .outcomes
                .build(&features, &run, &attempt.candidate)
                .await?;
            self.feedback.record(&row)?;
            recorded.push(row);
        }

        let chosen = outcome
            .candidate
            .as_deref()
            .filter(|_| outcome.decision == Decision::Cloud)
            .and_then(|name| attempts.iter().find(|a| a.candidate.name == name));

        let (execution, output) = match chosen {
            Some(attempt) => (
                attempt.summary(),
                attempt.result.as_ref().ok().map(|run| run.output.clone()),
            ),
            None => (local, None),
        };

        Ok(CycleReport {
            features,
            outcome,
            execution,
            recorded,
            output,
        })
    }
}
