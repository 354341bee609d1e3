//! Application entry point for `kwh-rollup`.
//!
//! Subcommands:
//! - `aggregate` – batch mode: read a JSON document of readings and write
//!   `hourly_data.csv` / `daily_data.csv` (optionally print them too)
//! - `import` – upsert a JSON document of readings into the store
//! - `serve` – run the hourly and daily aggregation cycles and the HTTP API
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required** for `import`/`serve`) – SQLite connection string
//! - see `config.rs` for the optional ones
//! - `ROLLUP_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `ROLLUP_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{
    env,
    io::IsTerminal,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use kwh_rollup::{config, load_raw_readings, parse_readings, report, routes};
use kwh_rollup::{aggregate_raw, Granularity, Scheduler, Store};

/// Hourly and daily rollups of energy consumption readings.
#[derive(Parser)]
#[command(name = "kwh-rollup", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate a JSON file of readings into CSV reports.
    Aggregate {
        /// JSON array of {"timestamp", "kWh_value"} objects.
        #[arg(short, long, default_value = "data.json")]
        input: PathBuf,

        /// Directory for hourly_data.csv and daily_data.csv.
        #[arg(short, long, default_value = "output_data")]
        output_dir: PathBuf,

        /// Also print both tables to stdout.
        #[arg(long)]
        print: bool,
    },

    /// Upsert a JSON file of readings into the store.
    Import {
        /// JSON array of {"timestamp", "kWh_value"} objects.
        #[arg(short, long, default_value = "data.json")]
        input: PathBuf,
    },

    /// Run the aggregation cycles and the HTTP API.
    Serve,
}

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Aggregate {
            input,
            output_dir,
            print,
        } => run_aggregate(&input, &output_dir, print),
        Command::Import { input } => run_import(&input).await,
        Command::Serve => run_serve().await,
    }
}

fn run_aggregate(input: &Path, output_dir: &Path, print: bool) -> Result<()> {
    // ---
    let raw = load_raw_readings(input)?;
    let aggregation = aggregate_raw(&raw);
    if aggregation.skipped > 0 {
        tracing::warn!(
            "{} of {} readings had an invalid timestamp and were skipped",
            aggregation.skipped,
            raw.len()
        );
    }

    if print {
        report::print_tables(&mut std::io::stdout().lock(), &aggregation.totals)
            .context("Failed to print tables")?;
    }

    report::save_reports(output_dir, &aggregation.totals)?;

    println!("Data saved successfully.");
    Ok(())
}

async fn run_import(input: &Path) -> Result<()> {
    // ---
    let cfg = config::load_from_env()?;
    cfg.log_config();

    let raw = load_raw_readings(input)?;
    let (readings, skipped) = parse_readings(&raw);

    let store = Store::connect(&cfg)
        .await
        .with_context(|| format!("Failed to open store '{}'", cfg.db_url))?;
    let imported = Scheduler::new(store.clone()).ingest(&readings).await?;
    store.close().await;

    tracing::info!("Imported {} readings, skipped {}", imported, skipped);
    Ok(())
}

async fn run_serve() -> Result<()> {
    // ---
    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Opening store: {}", cfg.db_url);
    let store = Store::connect(&cfg)
        .await
        .with_context(|| format!("Failed to open store '{}'", cfg.db_url))?;
    tracing::info!("Store ready");

    let scheduler = Scheduler::new(store);
    let _hourly = scheduler.spawn(Granularity::Hourly, cfg.hourly_interval);
    let _daily = scheduler.spawn(Granularity::Daily, cfg.daily_interval);

    let app = routes::router(scheduler);

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Color output follows TTY detection unless `FORCE_COLOR` is set
///   (`1|true|yes` on, `0|false|no` off)
/// - `ROLLUP_SPAN_EVENTS`: `"full"` emits ENTER, EXIT and CLOSE events,
///   `"enter_exit"` ENTER and EXIT only, anything else CLOSE only
/// - `RUST_LOG` wins over `ROLLUP_LOG_LEVEL`
///
/// Call once, before any logging macro runs.
fn init_tracing() {
    // ---
    let span_events = match env::var("ROLLUP_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("ROLLUP_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    // Logs go to stderr so `aggregate --print` output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
