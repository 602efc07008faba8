//! Task execution seams.
//!
//! The remote executor receives a task archive over HTTP, runs it and
//! returns an output archive. The local runner executes the entry command
//! in place. Both are bounded by a wall-clock timeout and report how long
//! the run took.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ecoroute_core::config::ExecutorConfig;
use ecoroute_core::Error;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

/// What a failed executor response reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailure {
    TimedOut,
    InvalidArchive,
    MissingEntrypoint,
    Other,
}

/// Why a task run failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("missing entrypoint: {0}")]
    MissingEntrypoint(String),

    #[error("remote returned HTTP {status}: {detail}")]
    Remote {
        status: u16,
        kind: RemoteFailure,
        detail: String,
    },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl ExecutionError {
    /// HTTP status carried by the failure, if a response arrived.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ExecutionError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the run hit a time limit, locally or on the executor.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ExecutionError::Timeout(_)
                | ExecutionError::Remote {
                    kind: RemoteFailure::TimedOut,
                    ..
                }
        )
    }
}

/// A completed remote run.
#[derive(Debug, Clone)]
pub struct RemoteRun {
    pub elapsed_seconds: f64,
    pub http_status: u16,
    /// Output archive returned by the executor.
    pub output: Vec<u8>,
}

/// Runs a task archive on a remote node.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Submit `archive` to the executor at `endpoint`.
    async fn execute(&self, endpoint: &str, archive: Vec<u8>)
    -> Result<RemoteRun, ExecutionError>;
}

/// `POST <endpoint>/run-task` with the archive in multipart field `file`.
pub struct HttpTaskExecutor {
    client: Client,
    timeout: Duration,
}

impl HttpTaskExecutor {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &ExecutorConfig) -> Result<Self, Error> {
        Self::new(Duration::from_secs(config.remote_timeout_secs))
    }
}

/// Map a failed response to an execution error using its `detail` text.
fn classify_failure(status: u16, detail: String) -> ExecutionError {
    let lower = detail.to_ascii_lowercase();
    let kind = if lower.contains("timed out") {
        RemoteFailure::TimedOut
    } else if lower.contains("invalid zip") || lower.contains("invalid archive") {
        RemoteFailure::InvalidArchive
    } else if lower.contains("no train.py") || lower.contains("entrypoint") {
        RemoteFailure::MissingEntrypoint
    } else {
        RemoteFailure::Other
    };
    ExecutionError::Remote {
        status,
        kind,
        detail,
    }
}

#[async_trait]
impl RemoteExecutor for HttpTaskExecutor {
    async fn execute(
        &self,
        endpoint: &str,
        archive: Vec<u8>,
    ) -> Result<RemoteRun, ExecutionError> {
        let url = format!("{}/run-task", endpoint.trim_end_matches('/'));
        let size = archive.len();
        let part = Part::bytes(archive)
            .file_name("task.zip")
            .mime_str("application/zip")
            .map_err(|e| ExecutionError::InvalidArchive(e.to_string()))?;
        let form = Form::new().part("file", part);

        debug!(category = "executor", url = %url, bytes = size, "Submitting task");
        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutionError::Timeout(self.timeout)
                } else {
                    ExecutionError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            warn!(
                category = "executor",
                url = %url,
                status = status.as_u16(),
                detail = %detail,
                "Remote execution failed"
            );
            return Err(classify_failure(status.as_u16(), detail));
        }

        let output = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ExecutionError::Timeout(self.timeout)
            } else {
                ExecutionError::Connection(e.to_string())
            }
        })?;
        let elapsed_seconds = started.elapsed().as_secs_f64();

        info!(
            category = "executor",
            url = %url,
            elapsed_seconds,
            output_bytes = output.len(),
            "Remote execution finished"
        );
        Ok(RemoteRun {
            elapsed_seconds,
            http_status: status.as_u16(),
            output: output.to_vec(),
        })
    }
}

/// A completed local run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalRun {
    pub elapsed_seconds: f64,
    pub success: bool,
    pub exit_code: Option<i32>,
}

/// Runs the task on this device.
#[async_trait]
pub trait LocalExecutor: Send + Sync {
    async fn run(&self) -> Result<LocalRun, ExecutionError>;
}

/// Runs the configured entry command in the task directory.
pub struct LocalRunner {
    command: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
}

impl LocalRunner {
    pub fn new(command: Vec<String>, workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command,
            workdir: workdir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.local_command.clone(),
            config.local_workdir.clone(),
            Duration::from_secs(config.local_timeout_secs),
        )
    }
}

#[async_trait]
impl LocalExecutor for LocalRunner {
    async fn run(&self) -> Result<LocalRun, ExecutionError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ExecutionError::MissingEntrypoint("empty local command".into()))?;

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .current_dir(&self.workdir)
            .kill_on_drop(true);

        let started = Instant::now();
        let status = match tokio::time::timeout(self.timeout, command.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExecutionError::MissingEntrypoint(format!(
                    "{} (in {})",
                    self.command.join(" "),
                    self.workdir.display()
                )));
            }
            Ok(Err(e)) => return Err(ExecutionError::Io(e.to_string())),
            Err(_) => {
                warn!(category = "executor", timeout = ?self.timeout, "Local run timed out");
                return Err(ExecutionError::Timeout(self.timeout));
            }
        };
        let elapsed_seconds = started.elapsed().as_secs_f64();

        info!(
            category = "executor",
            elapsed_seconds,
            code = ?status.code(),
            "Local run finished"
        );
        Ok(LocalRun {
            elapsed_seconds,
            success: status.success(),
            exit_code: status.code(),
        })
    }
}
