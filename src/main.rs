use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Datelike;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod amplitude;
mod calendar;
mod compare;
mod config;
mod error;
mod models;
mod monitor;
mod report;
mod series;
mod server;
mod source;

use crate::amplitude::AmplitudeClient;
use crate::config::{AmplitudeArgs, AmplitudeConfig, MonitorArgs, MonitorSettings};
use crate::models::Granularity;
use crate::source::{ActivitySource, CsvSource};

#[derive(Parser)]
#[command(name = "active-users-monitor")]
#[command(about = "Active user monitoring with weekday-aligned year-over-year comparisons", long_about = None)]
struct Cli {
    #[command(flatten)]
    amplitude: AmplitudeArgs,
    #[command(flatten)]
    monitor: MonitorArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard JSON API
    Serve {
        #[arg(long, env = "MONITOR_ADDR", default_value = "127.0.0.1:4321")]
        addr: SocketAddr,
    },
    /// Generate a markdown report for one granularity
    Report {
        #[arg(long, value_enum, default_value_t = Granularity::Week)]
        granularity: Granularity,
        #[arg(long, default_value_t = 12)]
        count: u32,
        /// Report one calendar month of daily data instead of the last `count` days
        #[arg(long, requires = "month")]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Also write the trend as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Read series from a granularity,date,value CSV instead of Amplitude
        #[arg(long)]
        source_csv: Option<PathBuf>,
    },
    /// Check connectivity to the analytics API
    Check {
        #[arg(long)]
        source_csv: Option<PathBuf>,
    },
}

fn build_source(
    amplitude: AmplitudeArgs,
    source_csv: Option<PathBuf>,
) -> anyhow::Result<Arc<dyn ActivitySource>> {
    if let Some(path) = source_csv {
        tracing::info!(path = %path.display(), "reading series from CSV");
        return Ok(Arc::new(CsvSource::new(path)));
    }

    let config = AmplitudeConfig::try_from(amplitude)?;
    let client = AmplitudeClient::new(config).context("failed to build HTTP client")?;
    tracing::info!(
        base_url = %client.config().base_url,
        project_id = client.config().project_id.as_deref().unwrap_or("-"),
        "using Amplitude API"
    );
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = MonitorSettings::try_from(cli.monitor)?;

    match cli.command {
        Commands::Serve { addr } => {
            let source = build_source(cli.amplitude, None)?;
            let app = server::router(server::AppState { source, settings });

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            tracing::info!("listening on http://{addr}");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("shutting down");
                })
                .await?;
        }
        Commands::Report {
            granularity,
            count,
            year,
            month,
            out,
            csv,
            source_csv,
        } => {
            let source = build_source(cli.amplitude, source_csv)?;
            let today = settings.today();
            let window = match month {
                Some(month) => {
                    calendar::month_of_days(year.unwrap_or(today.year()), month, today)?
                }
                None => calendar::build_window(granularity, today, count, today)?,
            };

            let report =
                monitor::build_monitor(source.as_ref(), window, &settings.thresholds).await?;
            std::fs::write(&out, report::build_report(&report))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());

            if let Some(path) = csv {
                let rows = report::write_trend_csv(&report, &path)?;
                println!("Wrote {rows} trend rows to {}.", path.display());
            }
        }
        Commands::Check { source_csv } => {
            let source = build_source(cli.amplitude, source_csv)?;
            let results = source.diagnostics().await;
            let passed = results.iter().filter(|result| result.success).count();

            for result in &results {
                match &result.error {
                    None => println!("- {} passed in {}ms", result.test, result.duration_ms),
                    Some(error) => println!(
                        "- {} failed in {}ms: {}",
                        result.test, result.duration_ms, error
                    ),
                }
            }
            println!("{passed}/{} checks passed.", results.len());

            if passed < results.len() {
                anyhow::bail!("connectivity checks failed");
            }
        }
    }

    Ok(())
}
