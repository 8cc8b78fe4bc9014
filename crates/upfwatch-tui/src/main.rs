//! `upfwatch-tui`: Live terminal dashboard for UPF telemetry.
//!
//! Built on [ratatui](https://ratatui.rs) over `upfwatch-core`'s
//! [`MetricsStore`](upfwatch_core::MetricsStore): a supervisor keeps the
//! store fed from the backend's push channel and a periodic poll, and a
//! data bridge task forwards every new view into the TUI action loop.
//!
//! Logs are written to a file (default `/tmp/upfwatch-tui.log`) to avoid
//! corrupting the terminal UI.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use upfwatch_config::{ConfigError, Profile};
use upfwatch_core::{DashboardConfig, MetricsStore, Supervisor};

use crate::app::{App, FaultSettings};

/// Terminal dashboard for a UPF telemetry backend.
#[derive(Parser, Debug)]
#[command(name = "upfwatch-tui", version, about)]
struct Cli {
    /// Backend base URL (e.g., http://upf-host:8080)
    #[arg(short = 'u', long, env = "UPFWATCH_URL")]
    url: Option<String>,

    /// Config profile to use (defaults to the file's default_profile)
    #[arg(short = 'p', long, env = "UPFWATCH_PROFILE")]
    profile: Option<String>,

    /// Disable the push channel and rely on polling alone
    #[arg(long)]
    no_push: bool,

    /// Fault type sent by the inject-fault key
    #[arg(long, default_value = "invalid_teid")]
    fault_type: String,

    /// Packets per injected fault
    #[arg(long, default_value_t = 10)]
    fault_count: u32,

    /// Log file path (defaults to /tmp/upfwatch-tui.log)
    #[arg(long, default_value = "/tmp/upfwatch-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Set up file-based tracing. We MUST NOT log to stdout/stderr; that would
/// corrupt the TUI output. The returned guard flushes logs on drop.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "upfwatch_tui={log_level},upfwatch_core={log_level},upfwatch_api={log_level}"
        ))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("upfwatch-tui.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

/// Resolve the dashboard config. Priority: CLI flags > config file.
fn resolve_config(cli: &Cli) -> Result<DashboardConfig> {
    let path = upfwatch_config::config_path();
    let cfg = upfwatch_config::load_config()
        .wrap_err_with(|| format!("failed to load {}", path.display()))?;

    let mut profile = match cfg.profile(cli.profile.as_deref()) {
        Ok((name, profile)) => {
            info!(profile = %name, "using config profile");
            profile.clone()
        }
        // A bare --url needs no profile at all.
        Err(ConfigError::UnknownProfile { .. }) if cli.url.is_some() && cli.profile.is_none() => {
            Profile::new("")
        }
        Err(e) => {
            return Err(e).wrap_err("no backend configured; pass --url or add a profile");
        }
    };

    if let Some(ref url) = cli.url {
        profile.url.clone_from(url);
    }

    let mut config = upfwatch_config::profile_to_dashboard_config(&profile, &cfg.defaults)?;
    if cli.no_push {
        config.push_enabled = false;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Install panic/error hooks BEFORE entering the terminal
    tui::install_hooks()?;

    // Tracing to file; hold the guard so logs flush on exit
    let _log_guard = setup_tracing(&cli);

    let config = resolve_config(&cli)?;
    info!(
        url = %config.url,
        push = config.push_enabled,
        "starting upfwatch-tui"
    );

    let client = config.client()?;

    // Reachability check; the dashboard still starts if it fails.
    match client.fetch_health().await {
        Ok(health) => info!(status = %health.status, "backend health"),
        Err(e) => warn!(error = %e, "backend health check failed"),
    }

    let store = Arc::new(MetricsStore::new());
    let mut supervisor = Supervisor::connect(client.clone(), &config, Arc::clone(&store))?;

    let fault = FaultSettings {
        fault_type: cli.fault_type.clone(),
        count: cli.fault_count,
    };
    let mut app = App::new(&supervisor, client, config.chart, fault);
    let outcome = app.run().await;

    supervisor.shutdown().await?;
    outcome
}
