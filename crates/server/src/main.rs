// crates/server/src/main.rs
//! Claude ledger binary.
//!
//! Opens the store, runs one sync with a progress spinner, then serves the
//! HTTP API. With `--sync-interval` a background task keeps syncing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use claude_ledger_core::{LedgerConfig, Plan};
use claude_ledger_db::{Database, IngestError, Ingestor};
use claude_ledger_server::{create_app, init_metrics, record_sync, record_sync_failure};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "claude-ledger",
    version,
    about = "Ingest Claude Code session logs and report usage per 5-hour window"
)]
struct Cli {
    /// Directory holding one folder per project (default ~/.claude/projects)
    #[arg(long, env = "CLAUDE_LEDGER_PROJECTS_DIR")]
    projects_dir: Option<PathBuf>,

    /// SQLite database file (default <cache>/claude-ledger/ledger.db)
    #[arg(long, env = "CLAUDE_LEDGER_DB")]
    db: Option<PathBuf>,

    /// Plan for token limits: pro, max5, max20 or a token count
    #[arg(long, env = "CLAUDE_LEDGER_PLAN", default_value = "pro")]
    plan: Plan,

    #[arg(long, env = "CLAUDE_LEDGER_PORT", default_value_t = 47893)]
    port: u16,

    /// Seconds between background syncs; off when unset
    #[arg(long, env = "CLAUDE_LEDGER_SYNC_INTERVAL")]
    sync_interval: Option<u64>,
}

impl Cli {
    fn config(&self) -> Result<LedgerConfig> {
        let defaults = LedgerConfig::from_default_paths();
        let projects_dir = match &self.projects_dir {
            Some(dir) => dir.clone(),
            None => defaults
                .as_ref()
                .map(|d| d.projects_dir.clone())
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("no --projects-dir given")?,
        };
        let db_path = match &self.db {
            Some(path) => path.clone(),
            None => defaults
                .as_ref()
                .map(|d| d.db_path.clone())
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("no --db given")?,
        };
        Ok(LedgerConfig::new(projects_dir, db_path).with_plan(self.plan))
    }
}

async fn initial_sync(ingestor: &Ingestor) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("  {spinner} Syncing {msg}")?);
    pb.set_message(ingestor.config().projects_dir.display().to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    match ingestor.sync().await {
        Ok(report) => {
            record_sync(&report);
            pb.finish_and_clear();
            eprintln!(
                "  \u{2713} Synced {} files ({} unchanged), {} lines in {}ms",
                report.files_processed,
                report.files_unchanged,
                report.lines_processed,
                report.duration_ms,
            );
            if report.lines_failed > 0 || report.records_failed > 0 || report.files_failed > 0 {
                eprintln!(
                    "  ! {} malformed lines, {} rejected records, {} unreadable files",
                    report.lines_failed, report.records_failed, report.files_failed,
                );
            }
            Ok(())
        }
        Err(e) => {
            record_sync_failure("error");
            pb.finish_and_clear();
            Err(e).context("initial sync failed")
        }
    }
}

fn spawn_periodic_sync(ingestor: Arc<Ingestor>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick fires immediately; the initial sync already ran.
        interval.tick().await;
        loop {
            interval.tick().await;
            match ingestor.sync().await {
                Ok(report) => record_sync(&report),
                Err(IngestError::AlreadyRunning) => {
                    record_sync_failure("rejected");
                    tracing::debug!("Periodic sync skipped, another sync is running");
                }
                Err(e) => {
                    record_sync_failure("error");
                    tracing::warn!(error = %e, "Periodic sync failed");
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,claude_ledger=info".into()),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    init_metrics();

    eprintln!("\n  claude-ledger v{}\n", env!("CARGO_PKG_VERSION"));

    let db = Database::new(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let ingestor = Arc::new(Ingestor::new(db, config));

    initial_sync(&ingestor).await?;

    if let Some(secs) = cli.sync_interval.filter(|s| *s > 0) {
        spawn_periodic_sync(ingestor.clone(), Duration::from_secs(secs));
    }

    let app = create_app(ingestor);
    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    eprintln!("  \u{2192} http://localhost:{}\n", cli.port);
    tracing::info!(%addr, plan = %cli.plan, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
