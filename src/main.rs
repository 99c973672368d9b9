//! CLI entry point for the probe locator.
//!
//! Provides subcommands for ranking candidate locations of a device from its
//! probed SSIDs, managing the base location, and refreshing cached lookups.

mod infra;

use crate::infra::wigle::client::WigleClient;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use probe_locator::aggregate::CandidateAggregator;
use probe_locator::base::BaseLocationStore;
use probe_locator::cache::ResultCache;
use probe_locator::config::{AppConfig, DEFAULT_CONFIG_PATH, cache_scope};
use probe_locator::geo::GeoPoint;
use probe_locator::output::{append_records, present, print_json, print_pretty};
use probe_locator::types::{DeviceProbeSet, ReportOutcome};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "probe_locator")]
#[command(about = "Rank likely past locations of a device from its Wi-Fi probe requests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank candidate locations for a device
    Candidates {
        /// MAC address of the probing device
        #[arg(short, long)]
        mac: String,

        /// SSID the device probed for (repeatable)
        #[arg(short, long = "ssid", value_name = "SSID", required = true)]
        ssids: Vec<String>,

        /// Only show candidates scoring at least 0.5
        #[arg(short, long, default_value_t = false)]
        likely_only: bool,

        /// Log the full report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// CSV file to append the shown candidates to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show, set or clear the base location used for proximity scoring
    Base {
        #[command(subcommand)]
        action: BaseAction,
    },
    /// Drop cached WiGLE results so the next lookup fetches fresh data
    Invalidate {
        /// SSID to refresh (repeatable)
        #[arg(short, long = "ssid", value_name = "SSID", required = true)]
        ssids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum BaseAction {
    Show,
    Set {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/probe_locator.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("probe_locator.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config_path =
        std::env::var("PROBE_LOCATOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load(&config_path)
        .with_context(|| format!("Invalid configuration in {config_path}"))?;

    match cli.command {
        Commands::Candidates {
            mac,
            ssids,
            likely_only,
            json,
            output,
        } => {
            let device = DeviceProbeSet::new(&mac, ssids);
            candidates(&cfg, &device, likely_only, json, output.as_deref()).await?;
        }
        Commands::Base { action } => {
            let store = open_base(&cfg);
            match action {
                BaseAction::Show => match store.get() {
                    Some(p) => info!(lat = p.latitude, lon = p.longitude, "Base location"),
                    None => info!("No base location set"),
                },
                BaseAction::Set { lat, lon } => {
                    let point = GeoPoint::new(lat, lon)
                        .ok_or_else(|| anyhow!("lat/lon out of range: {lat}, {lon}"))?;
                    store.set(point)?;
                }
                BaseAction::Clear => store.clear()?,
            }
        }
        Commands::Invalidate { ssids } => {
            let cache = open_cache(&cfg);
            for ssid in &ssids {
                cache.invalidate(ssid).await;
                info!(ssid = %ssid, "Cache entry dropped");
            }
        }
    }

    Ok(())
}

fn open_cache(cfg: &AppConfig) -> ResultCache {
    let scope = cache_scope(cfg.wigle.bbox.as_ref());
    match &cfg.cache.path {
        Some(path) => ResultCache::open(path, scope),
        None => ResultCache::in_memory(scope),
    }
}

fn open_base(cfg: &AppConfig) -> BaseLocationStore {
    match &cfg.base.path {
        Some(path) => BaseLocationStore::open(path),
        None => BaseLocationStore::new(),
    }
}

/// Correlates one device against WiGLE and reports the ranked candidates.
#[tracing::instrument(skip(cfg, device), fields(mac = %device.mac))]
async fn candidates(
    cfg: &AppConfig,
    device: &DeviceProbeSet,
    likely_only: bool,
    json: bool,
    output: Option<&str>,
) -> Result<()> {
    let api_name = std::env::var("WIGLE_API_NAME").context("WIGLE_API_NAME must be set")?;
    let api_token = std::env::var("WIGLE_API_TOKEN").context("WIGLE_API_TOKEN must be set")?;
    let wigle = WigleClient::new(&cfg.wigle.base_url, api_name, api_token)?;

    let aggregator = CandidateAggregator::new(
        open_cache(cfg),
        Arc::new(wigle),
        cfg.wigle.bbox,
        cfg.fetch_concurrency,
    );
    let base = open_base(cfg).get();

    let report = aggregator.build_candidates(device, base, &cfg.scoring).await;

    for failure in &report.failures {
        warn!(ssid = %failure.ssid, error = %failure.error, "SSID could not be resolved");
    }

    match report.outcome() {
        ReportOutcome::NoProbedSsids => info!("Device has no probed SSIDs"),
        ReportOutcome::NoCandidates => info!("No candidates"),
        ReportOutcome::Ranked(total) => {
            let shown = present(&report.candidates, likely_only);
            info!(total, shown = shown.len(), base_set = base.is_some(), "Candidates ranked");
            for (rank, c) in shown.iter().enumerate() {
                info!(
                    rank = rank + 1,
                    ssid = %c.ssid,
                    lat = c.point.latitude,
                    lon = c.point.longitude,
                    score = c.score,
                    rarity = c.rarity,
                    proximity = c.proximity,
                    co_probe = c.co_probe,
                    "Candidate"
                );
            }
            if let Some(path) = output {
                append_records(path, &report.mac, shown)?;
                info!(path, rows = shown.len(), "Candidates written");
            }
        }
    }

    if json {
        print_json(&report)?;
    } else {
        print_pretty(&report);
    }

    Ok(())
}
