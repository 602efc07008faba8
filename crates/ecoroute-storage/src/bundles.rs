//! Versioned rule bundle store.
//!
//! Bundles are kept in a redb table keyed by version. Saving assigns the
//! next version and commits in one write transaction, so a failed save
//! leaves the previous latest bundle in place.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ecoroute_rules::RuleBundle;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::info;

use crate::error::{Error, Result};

const BUNDLES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("rule_bundles");

/// Persistent store of rule bundles.
pub struct BundleStore {
    db: Arc<Database>,
}

impl BundleStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        write_txn.open_table(BUNDLES_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Persist a bundle under the next version and return the stored copy.
    pub fn save(&self, bundle: &RuleBundle) -> Result<RuleBundle> {
        bundle.validate()?;

        let write_txn = self.db.begin_write()?;
        let stored = {
            let mut table = write_txn.open_table(BUNDLES_TABLE)?;
            let next = match table.last()? {
                Some((version, _)) => version.value() + 1,
                None => 1,
            };

            let mut stored = bundle.clone();
            stored.version = next;
            let value = serde_json::to_vec(&stored)?;
            table.insert(next, value.as_slice())?;
            stored
        };
        write_txn.commit()?;

        info!(
            category = "storage",
            version = stored.version,
            rules = stored.rules.len(),
            "Rule bundle saved"
        );
        Ok(stored)
    }

    /// The most recent bundle, if any.
    pub fn latest(&self) -> Result<Option<RuleBundle>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BUNDLES_TABLE)?;

        let last = table.last()?;
        match last {
            Some((_, bytes)) => Ok(Some(serde_json::from_slice(bytes.value())?)),
            None => Ok(None),
        }
    }

    pub fn get(&self, version: u64) -> Result<Option<RuleBundle>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BUNDLES_TABLE)?;

        let found = table.get(version)?;
        match found {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes.value())?)),
            None => Ok(None),
        }
    }

    /// Stored versions in ascending order.
    pub fn versions(&self) -> Result<Vec<u64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BUNDLES_TABLE)?;

        let mut versions = Vec::new();
        for item in table.iter()? {
            let (version, _) = item?;
            versions.push(version.value());
        }
        Ok(versions)
    }

    /// Write a bundle (latest when `version` is `None`) to a JSON file.
    pub fn export_json(&self, version: Option<u64>, path: &Path) -> Result<RuleBundle> {
        let bundle = match version {
            Some(v) => self.get(v)?,
            None => self.latest()?,
        }
        .ok_or_else(|| match version {
            Some(v) => Error::NotFound(format!("rule bundle version {}", v)),
            None => Error::NotFound("no rule bundle stored".into()),
        })?;

        fs::write(path, bundle.to_json()?)?;
        info!(
            category = "storage",
            version = bundle.version,
            path = %path.display(),
            "Rule bundle exported"
        );
        Ok(bundle)
    }

    /// Read a JSON artifact and store it as a new version.
    pub fn import_json(&self, path: &Path) -> Result<RuleBundle> {
        let content = fs::read_to_string(path)?;
        let bundle = RuleBundle::from_json(&content)?;
        self.save(&bundle)
    }
}
