//! Command-line interface for EcoRoute.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ecoroute_agent::{
    DecisionCycle, DecisionOrchestrator, FeatureProbe, FeedbackLogger, LOCAL_SITE, SiteEstimate,
    SiteEstimates, SystemProbe,
};
use ecoroute_carbon::CarbonIntensityProvider;
use ecoroute_core::config::env_vars;
use ecoroute_core::{EngineConfig, FeatureVector, TelemetryRow, estimate};
use ecoroute_rules::RuleCompiler;
use ecoroute_storage::{BundleStore, TelemetryDataset};
use serde_json::json;
use tracing::{debug, info, warn};

/// EcoRoute - carbon and latency aware task offloading.
#[derive(Parser, Debug)]
#[command(name = "ecoroute")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Look up the carbon intensity of a grid zone.
    Intensity {
        /// Zone code, e.g. IN-WE or SE-SE4.
        zone: String,
    },
    /// Estimate energy and CO2 for one run.
    Estimate {
        /// Runtime in seconds.
        #[arg(long)]
        runtime: f64,
        /// Average power draw in watts.
        #[arg(long)]
        power: f64,
        /// Grid carbon intensity in gCO2/kWh.
        #[arg(long)]
        intensity: f64,
    },
    /// Collect the current device features.
    Probe {
        /// Task archive size in bytes.
        #[arg(long, default_value_t = 0)]
        input_size: u64,
    },
    /// Decide where a task should run.
    Decide {
        #[command(flatten)]
        features: FeatureArgs,
        /// Expected runtime at a site, as NAME=SECONDS. Use `local` for this device.
        #[arg(long = "estimate", value_parser = parse_estimate)]
        estimates: Vec<(String, f64)>,
    },
    /// Train a rule bundle from the telemetry dataset and store it.
    Train,
    /// Append a telemetry row (JSON) to the dataset.
    Record {
        /// Row as JSON. Read from stdin when omitted.
        row: Option<String>,
    },
    /// Rule bundle management.
    Bundle {
        #[command(subcommand)]
        bundle_cmd: BundleCommand,
    },
    /// Run a packed task archive through the full decision cycle.
    Run {
        /// Zip archive containing the task.
        #[arg(long, required = true)]
        archive: PathBuf,
        /// Where to write the output archive of a remote run.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Bundle subcommands.
#[derive(Subcommand, Debug)]
enum BundleCommand {
    /// List stored bundle versions.
    List,
    /// Print a bundle's rules.
    Show {
        /// Version to show (latest when omitted).
        #[arg(long)]
        version: Option<u64>,
    },
    /// Write a bundle to a JSON file.
    Export {
        #[arg(required = true)]
        path: PathBuf,
        /// Version to export (latest when omitted).
        #[arg(long)]
        version: Option<u64>,
    },
    /// Store a bundle read from a JSON file as a new version.
    Import {
        #[arg(required = true)]
        path: PathBuf,
    },
}

/// Feature values given on the command line.
#[derive(clap::Args, Debug)]
struct FeatureArgs {
    /// Read features from this device instead of the flags below.
    #[arg(long)]
    probe: bool,
    #[arg(long, default_value_t = 0)]
    input_size: u64,
    #[arg(long, default_value_t = 0.0)]
    rtt_ms: f64,
    #[arg(long, default_value_t = 0.0)]
    cpu_percent: f64,
    #[arg(long)]
    battery_percent: Option<f64>,
    #[arg(long)]
    charging: Option<bool>,
    #[arg(long)]
    gpu: bool,
}

impl FeatureArgs {
    async fn collect(&self) -> FeatureVector {
        if self.probe {
            return SystemProbe::new().collect(self.input_size).await;
        }
        FeatureVector {
            input_size_bytes: self.input_size,
            rtt_ms: self.rtt_ms,
            cpu_percent: self.cpu_percent,
            battery_percent: self.battery_percent,
            is_charging: self.charging,
            gpu_available: self.gpu,
        }
    }
}

fn parse_estimate(s: &str) -> std::result::Result<(String, f64), String> {
    let (name, seconds) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=SECONDS, got '{}'", s))?;
    let seconds: f64 = seconds
        .trim()
        .parse()
        .map_err(|_| format!("invalid seconds in '{}'", s))?;
    Ok((name.trim().to_string(), seconds))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if args.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("ecoroute={}", default_level))
            .add_directive(tracing::Level::WARN.into())
    });

    // Command output goes to stdout; logs go to stderr.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }

    let config = EngineConfig::load(args.config.as_deref())?;
    debug!(category = "config", candidates = config.candidates.len(), "Configuration loaded");

    match args.command {
        Command::Intensity { zone } => show_intensity(&config, &zone).await,
        Command::Estimate {
            runtime,
            power,
            intensity,
        } => {
            let est = estimate(runtime, power, intensity)?;
            print_json(&est)
        }
        Command::Probe { input_size } => {
            let features = SystemProbe::new().collect(input_size).await;
            print_json(&features)
        }
        Command::Decide {
            features,
            estimates,
        } => run_decide(&config, &features, &estimates).await,
        Command::Train => run_train(&config).await,
        Command::Record { row } => run_record(&config, row).await,
        Command::Bundle { bundle_cmd } => run_bundle_cmd(&config, bundle_cmd),
        Command::Run { archive, output } => run_task(config, &archive, output.as_deref()).await,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(config: &EngineConfig) -> Result<BundleStore> {
    let path = &config.storage.bundle_db_path;
    BundleStore::open(path).with_context(|| format!("Cannot open bundle store {}", path.display()))
}

fn start_feedback(config: &EngineConfig, store: Arc<BundleStore>) -> FeedbackLogger {
    let dataset = Arc::new(TelemetryDataset::new(&config.storage.dataset_path));
    FeedbackLogger::start(
        dataset,
        store,
        RuleCompiler::from_config(config),
        config.feedback.retrain_every,
    )
}

async fn show_intensity(config: &EngineConfig, zone: &str) -> Result<()> {
    let provider = CarbonIntensityProvider::from_config(&config.carbon)?;
    let sample = provider.intensity(zone).await;
    print_json(&sample)
}

async fn run_decide(
    config: &EngineConfig,
    features: &FeatureArgs,
    estimates: &[(String, f64)],
) -> Result<()> {
    let features = features.collect().await;
    let bundle = match open_store(config).and_then(|store| Ok(store.latest()?)) {
        Ok(bundle) => bundle,
        Err(e) => {
            warn!(
                category = "decision",
                error = %e,
                "Cannot read rule bundle, comparing margins"
            );
            None
        }
    };

    let provider = CarbonIntensityProvider::from_config(&config.carbon)?;
    let mut sites = SiteEstimates::default();
    for (name, seconds) in estimates {
        if name == LOCAL_SITE {
            let ci = provider.intensity(&config.local.zone).await.value;
            sites.local = Some(SiteEstimate::new(
                LOCAL_SITE,
                *seconds,
                config.local.power_watts,
                ci,
            )?);
        } else {
            let Some(candidate) = config.candidate(name) else {
                bail!("Unknown candidate: {}", name);
            };
            let ci = provider.intensity(&candidate.zone).await.value;
            sites.candidates.push(SiteEstimate::new(
                candidate.name.clone(),
                *seconds,
                candidate.power_watts,
                ci,
            )?);
        }
    }

    let outcome = DecisionOrchestrator::from_config(config).decide(&features, bundle.as_ref(), &sites);
    print_json(&json!({
        "features": features,
        "bundleVersion": bundle.map(|b| b.version),
        "outcome": outcome,
    }))
}

async fn run_train(config: &EngineConfig) -> Result<()> {
    let store = Arc::new(open_store(config)?);
    let feedback = start_feedback(config, store);

    let result = feedback.retrain_now().await;
    feedback.shutdown().await;

    let bundle = result.context("Training failed, stored bundle unchanged")?;
    info!(category = "rules", version = bundle.version, "Bundle stored");
    for rule in &bundle.rules {
        println!("{}", rule);
    }
    print_json(&json!({
        "version": bundle.version,
        "bundleId": bundle.bundle_id,
        "rules": bundle.rules.len(),
        "report": bundle.report,
    }))
}

async fn run_record(config: &EngineConfig, row: Option<String>) -> Result<()> {
    let content = match row {
        Some(row) => row,
        None => std::io::read_to_string(std::io::stdin()).context("Cannot read row from stdin")?,
    };
    let row: TelemetryRow = serde_json::from_str(&content).context("Invalid telemetry row")?;

    let store = Arc::new(open_store(config)?);
    let feedback = start_feedback(config, store);
    let recorded = feedback.record(&row);
    // Wait for any retrain the append queued.
    feedback.shutdown().await;
    recorded?;

    info!(
        category = "feedback",
        path = %config.storage.dataset_path.display(),
        "Row recorded"
    );
    Ok(())
}

fn run_bundle_cmd(config: &EngineConfig, cmd: BundleCommand) -> Result<()> {
    let store = open_store(config)?;
    match cmd {
        BundleCommand::List => {
            for version in store.versions()? {
                println!("{}", version);
            }
        }
        BundleCommand::Show { version } => {
            let bundle = match version {
                Some(v) => store.get(v)?,
                None => store.latest()?,
            };
            let Some(bundle) = bundle else {
                bail!("No rule bundle stored");
            };
            println!(
                "version {} ({}) trained {}",
                bundle.version, bundle.bundle_id, bundle.trained_at
            );
            for (index, rule) in bundle.rules.iter().enumerate() {
                println!("{:>3}. {}", index, rule);
            }
        }
        BundleCommand::Export { path, version } => {
            let bundle = store.export_json(version, &path)?;
            println!("exported version {} to {}", bundle.version, path.display());
        }
        BundleCommand::Import { path } => {
            let bundle = store
                .import_json(&path)
                .with_context(|| format!("Cannot import {}", path.display()))?;
            println!("imported as version {}", bundle.version);
        }
    }
    Ok(())
}

async fn run_task(config: EngineConfig, archive: &Path, output: Option<&Path>) -> Result<()> {
    let bytes = std::fs::read(archive)
        .with_context(|| format!("Cannot read archive {}", archive.display()))?;

    let provider = Arc::new(CarbonIntensityProvider::from_config(&config.carbon)?);
    let store = Arc::new(open_store(&config)?);
    let feedback = start_feedback(&config, store.clone());
    let cycle = DecisionCycle::new(config, provider, store, feedback)?;

    let result = cycle.run(bytes).await;
    cycle.shutdown().await;
    let report = result?;

    if let (Some(path), Some(data)) = (output, report.output.as_ref()) {
        std::fs::write(path, data)
            .with_context(|| format!("Cannot write output {}", path.display()))?;
        info!(category = "executor", path = %path.display(), "Output archive written");
    }
    print_json(&report)
}
