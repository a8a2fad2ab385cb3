//! # DR Validator
//!
//! Command-line entry point for the validation harness. Loads and validates
//! configuration, runs one orchestration pass against fixture-backed probes,
//! persists the JSON report, and exits with the run's status code:
//! 0 when everything passed or was skipped, 1 when any resource failed,
//! 2 when the harness could not start (configuration or setup error).

use anyhow::Context;
use clap::{Parser, Subcommand};
use drsentinel::clock::SystemClock;
use drsentinel::config::SentinelConfig;
use drsentinel::dispatch::{FileReportSink, LogDispatcher, NotificationDispatcher, ReportSink};
use drsentinel::evaluator::RunHistory;
use drsentinel::logging;
use drsentinel::orchestration::TestOrchestrator;
use drsentinel::probe::fixture::FixtureDocument;
use drsentinel::probe::ResourceProbe;
use drsentinel::snapshot::ResourceKind;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dr-validator")]
#[command(about = "Validate backup and disaster-recovery posture against RPO/RTO targets")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (JSON or TOML); defaults plus DRSENTINEL_* env vars apply either way
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the operating environment (e.g. production, staging)
    #[arg(short, long)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one validation pass and emit the report
    Run {
        /// Fixture document with recorded resource observations
        #[arg(long)]
        fixture: PathBuf,

        /// Prior-run history file enabling WARNING -> CRITICAL escalation
        #[arg(long)]
        history: Option<PathBuf>,

        /// Resource kinds to mark as skipped (repeatable)
        #[arg(long, value_name = "KIND")]
        skip: Vec<String>,

        /// Print the full report as JSON instead of the text summary
        #[arg(long)]
        json: bool,
    },

    /// Load and validate configuration, then exit
    ValidateConfig,
}

#[tokio::main]
async fn main() {
    logging::init_logging();
    let cli = Cli::parse();

    let mut config = match SentinelConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "configuration rejected");
            process::exit(2);
        }
    };
    if let Some(environment) = cli.environment {
        config.environment = environment;
    }

    match cli.command {
        Commands::ValidateConfig => {
            info!(
                environment = %config.environment,
                rpo_threshold_minutes = config.rpo_threshold_minutes,
                rto_threshold_minutes = config.rto_threshold_minutes,
                "configuration is valid"
            );
        }
        Commands::Run {
            fixture,
            history,
            skip,
            json,
        } => {
            let exit = match run(config, fixture, history, skip, json).await {
                Ok(code) => code,
                Err(err) => {
                    error!(error = %format!("{err:#}"), "validation harness could not start");
                    2
                }
            };
            process::exit(exit);
        }
    }
}

async fn run(
    config: SentinelConfig,
    fixture: PathBuf,
    history_path: Option<PathBuf>,
    skip: Vec<String>,
    json: bool,
) -> anyhow::Result<i32> {
    let skip_kinds = parse_skip_kinds(&skip)?;
    let document = FixtureDocument::from_path(&fixture)?;
    let probes: Vec<Arc<dyn ResourceProbe>> = document.probes();

    let history = match &history_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read history {}", path.display()))?;
            Some(serde_json::from_str::<RunHistory>(&raw).with_context(|| {
                format!("invalid history document {}", path.display())
            })?)
        }
        None => None,
    };

    let report_dir = config.report_dir.clone();
    // Skips requested on the command line override probe applicability.
    let probes = probes
        .into_iter()
        .map(|probe| {
            if skip_kinds.contains(&probe.kind()) {
                Arc::new(SkippedProbe { inner: probe }) as Arc<dyn ResourceProbe>
            } else {
                probe
            }
        })
        .collect();

    let orchestrator = TestOrchestrator::new(config, Arc::new(SystemClock), probes)?;
    let report = orchestrator.run(history.as_ref()).await;

    if let (Some(path), Some(mut history)) = (history_path, history) {
        history.observe(&report.alerts);
        std::fs::write(&path, serde_json::to_vec_pretty(&history)?)
            .with_context(|| format!("cannot update history {}", path.display()))?;
    }

    FileReportSink::new(report_dir).persist(&report).await?;
    LogDispatcher.dispatch(&report).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary_text());
    }

    Ok(report.exit_code())
}

fn parse_skip_kinds(skip: &[String]) -> anyhow::Result<Vec<ResourceKind>> {
    skip.iter()
        .map(|raw| {
            raw.parse::<ResourceKind>()
                .map_err(|err| anyhow::anyhow!(err))
        })
        .collect()
}

/// Wraps a probe so it reports as inapplicable, forcing a SKIPPED outcome.
struct SkippedProbe {
    inner: Arc<dyn ResourceProbe>,
}

#[async_trait::async_trait]
impl ResourceProbe for SkippedProbe {
    fn kind(&self) -> ResourceKind {
        self.inner.kind()
    }

    fn applicable(&self, _environment: &str) -> bool {
        false
    }

    async fn observe(
        &self,
        region: &str,
    ) -> Result<drsentinel::probe::Observation, drsentinel::ProbeError> {
        self.inner.observe(region).await
    }
}
