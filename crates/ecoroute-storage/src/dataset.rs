//! Append-only telemetry dataset on disk.
//!
//! One CSV file with a fixed 19-column header, written once when the file
//! is created. Rows are never rewritten. Reading is permissive: a record
//! that cannot be decoded at all is skipped, and cells that are not numbers
//! come back as `None` for the training pipeline to judge.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ecoroute_core::telemetry::COLUMNS;
use ecoroute_core::{RawTelemetryRow, TelemetryRow};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Handle to the dataset file. The only writer of the file.
#[derive(Debug)]
pub struct TelemetryDataset {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TelemetryDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, creating the file and header if needed.
    pub fn append(&self, row: &TelemetryRow) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Storage("dataset lock poisoned".into()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;

        debug!(
            category = "storage",
            path = %self.path.display(),
            header = needs_header,
            "Telemetry row appended"
        );
        Ok(())
    }

    /// Read every decodable row. A missing file is an empty dataset.
    pub fn read_all(&self) -> Result<Vec<RawTelemetryRow>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Storage("dataset lock poisoned".into()))?;

        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        let missing: Vec<&str> = COLUMNS
            .iter()
            .copied()
            .filter(|c| !headers.iter().any(|h| h == *c))
            .collect();
        if !missing.is_empty() {
            warn!(
                category = "storage",
                path = %self.path.display(),
                missing = ?missing,
                "Dataset header is missing columns"
            );
        }

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for record in reader.deserialize::<RawTelemetryRow>() {
            match record {
                Ok(row) => rows.push(row),
                Err(e) => {
                    skipped += 1;
                    debug!(category = "storage", error = %e, "Skipping undecodable record");
                }
            }
        }

        if skipped > 0 {
            warn!(category = "storage", skipped, "Skipped undecodable dataset records");
        }
        Ok(rows)
    }

    /// Number of data rows on disk.
    pub fn len(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        Ok(reader.records().filter(|r| r.is_ok()).count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
