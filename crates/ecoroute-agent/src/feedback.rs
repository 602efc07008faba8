//! Feedback loop: record outcomes, retrain in the background.
//!
//! [`FeedbackLogger::record`] appends a row and returns as soon as the row is
//! on disk; append errors are returned to the caller. Retraining runs on a
//! background worker fed by a single-slot channel, so requests made while
//! one is already queued coalesce into it. Retrain failures are logged and
//! counted, never returned from `record`, and never touch the stored bundle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ecoroute_core::TelemetryRow;
use ecoroute_rules::{RuleBundle, RuleCompiler};
use ecoroute_storage::{BundleStore, TelemetryDataset};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};

/// Counters describing background retraining.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrainStatus {
    pub attempts: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Version of the last bundle this logger stored.
    pub last_version: Option<u64>,
    pub last_error: Option<String>,
}

/// Reads the dataset, trains, stores the result.
struct Retrainer {
    dataset: Arc<TelemetryDataset>,
    store: Arc<BundleStore>,
    compiler: RuleCompiler,
    status: watch::Sender<RetrainStatus>,
}

impl Retrainer {
    fn retrain(&self) -> Result<RuleBundle> {
        let rows = self.dataset.read_all()?;
        let bundle = self.compiler.train(&rows)?;
        Ok(self.store.save(&bundle)?)
    }

    /// Run one retrain on the blocking pool and record the outcome.
    async fn run(self: Arc<Self>) -> Result<RuleBundle> {
        let worker = self.clone();
        let result = tokio::task::spawn_blocking(move || worker.retrain())
            .await
            .map_err(|e| AgentError::Retrain(format!("retrain task failed: {}", e)))
            .and_then(|r| r);

        match &result {
            Ok(bundle) => {
                info!(
                    category = "feedback",
                    version = bundle.version,
                    rules = bundle.rules.len(),
                    test_accuracy = ?bundle.report.as_ref().and_then(|r| r.test_accuracy),
                    "Retrained rule bundle"
                );
            }
            Err(e) if e.is_insufficient_data() => {
                warn!(category = "feedback", error = %e, "Retrain skipped, previous bundle retained");
            }
            Err(e) => {
                warn!(category = "feedback", error = %e, "Retrain failed, previous bundle retained");
            }
        }

        self.status.send_modify(|status| {
            status.attempts += 1;
            match &result {
                Ok(bundle) => {
                    status.succeeded += 1;
                    status.last_version = Some(bundle.version);
                    status.last_error = None;
                }
                Err(e) => {
                    status.failed += 1;
                    status.last_error = Some(e.to_string());
                }
            }
        });
        result
    }
}

/// Sole writer of the telemetry dataset.
pub struct FeedbackLogger {
    dataset: Arc<TelemetryDataset>,
    retrainer: Arc<Retrainer>,
    requests: mpsc::Sender<()>,
    worker: JoinHandle<()>,
    retrain_every: usize,
    appended_since_request: AtomicUsize,
    status: watch::Receiver<RetrainStatus>,
}

impl FeedbackLogger {
    /// Create the logger and spawn its retrain worker on the current runtime.
    pub fn start(
        dataset: Arc<TelemetryDataset>,
        store: Arc<BundleStore>,
        compiler: RuleCompiler,
        retrain_every: usize,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(RetrainStatus::default());
        let retrainer = Arc::new(Retrainer {
            dataset: dataset.clone(),
            store,
            compiler,
            status: status_tx,
        });

        let (requests, mut pending) = mpsc::channel::<()>(1);
        let worker_retrainer = retrainer.clone();
        let worker = tokio::spawn(async move {
            while pending.recv().await.is_some() {
                // Errors are logged and counted by `run`.
                let _ = worker_retrainer.clone().run().await;
            }
            debug!(category = "feedback", "Retrain worker stopped");
        });

        Self {
            dataset,
            retrainer,
            requests,
            worker,
            retrain_every: retrain_every.max(1),
            appended_since_request: AtomicUsize::new(0),
            status: status_rx,
        }
    }

    /// Append one row and, every `retrain_every` rows, request a retrain.
    pub fn record(&self, row: &TelemetryRow) -> Result<()> {
        self.dataset.append(row)?;

        let appended = self.appended_since_request.fetch_add(1, Ordering::SeqCst) + 1;
        if appended >= self.retrain_every {
            self.appended_since_request.store(0, Ordering::SeqCst);
            self.request_retrain();
        }
        Ok(())
    }

    /// Queue a retrain unless one is already queued.
    pub fn request_retrain(&self) {
        match self.requests.try_send(()) {
            Ok(()) => debug!(category = "feedback", "Retrain requested"),
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!(category = "feedback", "Retrain already pending")
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!(category = "feedback", "Retrain worker is not running")
            }
        }
    }

    /// Retrain now and wait for the result.
    pub async fn retrain_now(&self) -> Result<RuleBundle> {
        self.retrainer.clone().run().await
    }

    pub fn status(&self) -> RetrainStatus {
        self.status.borrow().clone()
    }

    /// Watch retrain counters as they change.
    pub fn subscribe(&self) -> watch::Receiver<RetrainStatus> {
        self.status.clone()
    }

    pub fn dataset(&self) -> &TelemetryDataset {
        &self.dataset
    }

    /// Stop accepting requests and wait for queued retraining to finish.
    pub async fn shutdown(self) {
        let Self {
            requests, worker, ..
        } = self;
        drop(requests);
        if let Err(e) = worker.await {
            warn!(category = "feedback", error = %e, "Retrain worker ended abnormally");
        }
    }
}
