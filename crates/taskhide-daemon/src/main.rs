//! Taskhide Daemon
//!
//! Headless service: watches the foreground window and hides the taskbar
//! while a listed target is in front. Runs until Ctrl+C, then restores the
//! taskbar.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskhide_core::{FileSource, FocusSink, FocusStrategy, LogNotifier, Service, Settings, SharedRegistry};
use taskhide_listener::{startup, Desktop};
use tracing::info;

#[derive(Parser)]
#[command(name = "taskhide-daemon")]
#[command(about = "Hide the taskbar while a listed game is in the foreground")]
#[command(version)]
struct Args {
    /// Target list file (overrides TASKHIDE_TARGETS)
    #[arg(long)]
    targets: Option<PathBuf>,

    /// Focus source: hook or poll (overrides TASKHIDE_STRATEGY)
    #[arg(long)]
    strategy: Option<FocusStrategy>,

    /// Poll interval in milliseconds for the poll source (overrides TASKHIDE_POLL_MS)
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Register this executable to start at logon
    #[arg(long)]
    autostart: bool,
}

impl Args {
    fn settings(&self) -> Settings {
        let mut settings = Settings::from_env();
        if let Some(path) = &self.targets {
            settings.targets_path = path.clone();
        }
        if let Some(strategy) = self.strategy {
            settings.strategy = strategy;
        }
        if let Some(ms) = self.poll_ms.filter(|ms| *ms > 0) {
            settings.poll_interval = Duration::from_millis(ms);
        }
        settings
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskhide=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let settings = args.settings();

    info!("Taskhide daemon starting...");

    if args.autostart {
        startup::register_current_exe();
    }

    let source = FileSource::new(&settings.targets_path);
    source.ensure_exists()?;
    let registry = Arc::new(SharedRegistry::load(Box::new(source))?);

    let parts = Desktop::native().into_parts(registry, Box::new(LogNotifier), &settings);
    let mut service = Service::start(parts).context("Failed to start foreground service")?;

    let sink = FocusSink::new(service.sender());
    let mut focus = taskhide_listener::start_focus_source(settings.strategy, settings.poll_interval, sink)?;
    info!("Watching foreground changes via {} (press Ctrl+C to stop)...", focus.name());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    focus.stop();
    service.shutdown();

    info!("Taskhide daemon stopped");
    Ok(())
}
