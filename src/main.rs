use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use toll_recovery::models::{Match, ReportConfiguration, RunStatus, SubmissionReport};
use toll_recovery::portal::{
    DryRunPortal, EnvCredentials, FallbackCredentials, FileCredentials, StrategyPortal,
    WebDriverPage,
};
use toll_recovery::service::EvidenceCapture;
use toll_recovery::store::{load_tolls, load_trips};
use toll_recovery::{AppConfig, MatchStore, ReportWriter, SubmissionOrchestrator, TollMatcher};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toll-recovery", about = "Correlate toll charges with trips and file recovery claims")]
struct Cli {
    /// Config file (defaults to ./toll-recovery.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Match toll transactions to trips and save the artifact
    Match {
        #[arg(long)]
        tolls: Option<PathBuf>,
        #[arg(long)]
        trips: Option<PathBuf>,
    },
    /// Submit claims for a saved match artifact (latest by default)
    Submit {
        #[arg(long)]
        matches: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Match, then submit
    Run {
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    info!("Starting with config: {:?}", cfg);

    let status = match cli.command {
        Command::Match { tolls, trips } => {
            run_match(&cfg, tolls, trips)?;
            RunStatus::Completed
        }
        Command::Submit { matches, dry_run } => {
            let store = MatchStore::new(&cfg.paths.data_dir);
            let (path, artifact) = match matches {
                Some(path) => {
                    let artifact = store.load(&path)?;
                    (path, artifact)
                }
                None => store.load_latest()?,
            };
            info!(
                "Loaded {} matches ({} eligible) from {}",
                artifact.matches.len(),
                artifact.eligible().count(),
                path.display()
            );
            run_submit(&cfg, &artifact.matches, dry_run).await?
        }
        Command::Run { dry_run } => {
            let path = run_match(&cfg, None, None)?;
            let artifact = MatchStore::new(&cfg.paths.data_dir).load(&path)?;
            run_submit(&cfg, &artifact.matches, dry_run).await?
        }
    };

    if status == RunStatus::Aborted {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_match(
    cfg: &AppConfig,
    tolls: Option<PathBuf>,
    trips: Option<PathBuf>,
) -> anyhow::Result<PathBuf> {
    let tolls_path = tolls.unwrap_or_else(|| cfg.paths.tolls_file.clone());
    let trips_path = trips.unwrap_or_else(|| cfg.paths.trips_file.clone());

    // 1. Load snapshots
    let tolls = load_tolls(&tolls_path)
        .with_context(|| format!("loading tolls from {}", tolls_path.display()))?;
    let trips = load_trips(&trips_path)
        .with_context(|| format!("loading trips from {}", trips_path.display()))?;
    info!("Loaded {} tolls and {} trips", tolls.len(), trips.len());

    // 2. Match
    let outcome = TollMatcher::new().match_records(&tolls, &trips);

    // 3. Persist
    let path = MatchStore::new(&cfg.paths.data_dir).save(outcome)?;
    Ok(path)
}

async fn run_submit(cfg: &AppConfig, matches: &[Match], dry_run: bool) -> anyhow::Result<RunStatus> {
    let sub = &cfg.submission;
    let evidence = EvidenceCapture::new(&cfg.paths.evidence_dir, sub.step_timeout());
    let credentials = FallbackCredentials::new(
        EnvCredentials::new(&cfg.credentials.identifier_var, &cfg.credentials.secret_var),
        FileCredentials::new(&cfg.credentials.fallback_file),
    );

    let report = if dry_run || sub.dry_run {
        info!("Dry run: no claims will be sent");
        let mut orchestrator =
            SubmissionOrchestrator::new(DryRunPortal::new(), credentials, sub, evidence);
        orchestrator.run(matches).await
    } else {
        match WebDriverPage::connect(&cfg.portal.webdriver_url, sub.step_timeout()).await {
            Ok(page) => {
                let portal = StrategyPortal::new(page, &cfg.portal.base_url);
                let mut orchestrator = SubmissionOrchestrator::new(portal, credentials, sub, evidence);
                let report = orchestrator.run(matches).await;
                orchestrator.into_portal().into_driver().close().await;
                report
            }
            Err(e) => {
                tracing::error!("Cannot reach WebDriver at {}: {}", cfg.portal.webdriver_url, e);
                SubmissionReport::new(
                    Vec::new(),
                    ReportConfiguration {
                        request_delay: sub.request_delay().as_millis() as u64,
                        submission_delay: sub.submission_delay().as_millis() as u64,
                        max_retries: sub.max_retries,
                    },
                    RunStatus::Aborted,
                    Some(format!("browser session: {e}")),
                )
            }
        }
    };

    let path = ReportWriter::new(&cfg.paths.report_dir).save(&report)?;
    info!(
        "Run {:?}: {} submitted, {} failed, report at {}",
        report.run_status,
        report.summary.successful_submissions,
        report.summary.failed_submissions,
        path.display()
    );
    if let Some(reason) = &report.abort_reason {
        tracing::error!("Run aborted: {}", reason);
    }
    Ok(report.run_status)
}
