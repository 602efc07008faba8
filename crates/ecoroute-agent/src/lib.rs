//! Decision runtime for EcoRoute.
//!
//! Ties the carbon provider, rule bundles and the telemetry dataset into
//! one loop: probe the device, decide where a task runs, execute it,
//! account for energy and CO2, record the outcome and retrain.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ecoroute_agent::{DecisionCycle, FeedbackLogger};
//! use ecoroute_carbon::CarbonIntensityProvider;
//! use ecoroute_core::EngineConfig;
//! use ecoroute_rules::RuleCompiler;
//! use ecoroute_storage::{BundleStore, TelemetryDataset};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load(None)?;
//!     let provider = Arc::new(CarbonIntensityProvider::from_config(&config.carbon)?);
//!     let store = Arc::new(BundleStore::open(&config.storage.bundle_db_path)?);
//!     let dataset = Arc::new(TelemetryDataset::new(&config.storage.dataset_path));
//!     let feedback = FeedbackLogger::start(
//!         dataset,
//!         store.clone(),
//!         RuleCompiler::from_config(&config),
//!         config.feedback.retrain_every,
//!     );
//!
//!     let cycle = DecisionCycle::new(config, provider, store, feedback)?;
//!     let report = cycle.run(std::fs::read("task.zip")?).await?;
//!     println!("{:?} on {}", report.outcome.decision, report.execution.site);
//!     cycle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cycle;
pub mod error;
pub mod executor;
pub mod feedback;
pub mod orchestrator;
pub mod outcome;
pub mod probe;

pub use cycle::{CycleReport, DecisionCycle, ExecutionSummary, LOCAL_SITE};
pub use error::{AgentError, Result};
pub use executor::{
    ExecutionError, HttpTaskExecutor, LocalExecutor, LocalRun, LocalRunner, RemoteExecutor,
    RemoteFailure, RemoteRun,
};
pub use feedback::{FeedbackLogger, RetrainStatus};
pub use orchestrator::{
    CandidateAssessment, ComparisonReport, DecisionOrchestrator, DecisionOutcome, DecisionReason,
    SiteEstimate, SiteEstimates,
};
pub use outcome::{OutcomeBuilder, RunPair};
pub use probe::{BatteryState, FeatureProbe, RTT_UNREACHABLE_MS, StaticProbe, SystemProbe};
