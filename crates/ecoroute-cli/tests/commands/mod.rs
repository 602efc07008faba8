//! Command-specific CLI tests.

use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

mod bundle_test;
mod decide_test;
mod estimate_test;
mod intensity_test;

/// A throwaway workspace with a config file pointing all storage into it.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = format!(
            r#"
[storage]
dataset_path = '{}'
bundle_db_path = '{}'

[local]
zone = "DE"
power_watts = 65.0

[[candidates]]
name = "stockholm"
endpoint = "http://127.0.0.1:9"
zone = "SE-SE4"
power_watts = 15.0
"#,
            dir.path().join("telemetry.csv").display(),
            dir.path().join("bundles.redb").display(),
        );
        std::fs::write(dir.path().join("ecoroute.toml"), config).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The CLI, run inside the workspace with its config file.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ecoroute").unwrap();
        cmd.current_dir(self.path())
            .env_remove("ECOROUTE_CONFIG")
            .env_remove("ECOROUTE_DATASET_PATH")
            .env_remove("ECOROUTE_BUNDLE_DB")
            .env_remove("ECOROUTE_CARBON_API_TOKEN")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.path().join("ecoroute.toml"));
        cmd
    }
}
