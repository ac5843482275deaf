//! OS side of Taskhide
//!
//! Implements the capability traits of `taskhide-core` on top of the native
//! APIs: the foreground-change hook and probe, process lookup and exit
//! watching, taskbar show/hide and auto-hide, window placement, and logon
//! startup registration.

pub mod platform;
pub mod startup;

use std::sync::Arc;
use std::time::Duration;
use taskhide_core::{
    FocusSink, FocusSource, FocusStrategy, MachineParts, Notifier, PollingSource, ProcessControl, Settings,
    ShellSurface, SharedRegistry, SourceError, WindowPlacer,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Failed to start focus source: {0}")]
    Source(#[from] SourceError),
    #[error("Platform error: {0}")]
    Platform(String),
    #[error("Startup registration failed: {0}")]
    Startup(String),
    #[error("Unsupported platform")]
    Unsupported,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ListenerError>;

/// The native capabilities for the current platform
pub struct Desktop {
    pub shell: Box<dyn ShellSurface>,
    pub processes: Arc<dyn ProcessControl>,
    pub placer: Box<dyn WindowPlacer>,
}

impl Desktop {
    /// Capabilities for the platform this binary was built for
    pub fn native() -> Self {
        platform::desktop()
    }

    /// Bundle with the registry and notifier into machine inputs
    pub fn into_parts(
        self,
        registry: Arc<SharedRegistry>,
        notifier: Box<dyn Notifier>,
        settings: &Settings,
    ) -> MachineParts {
        MachineParts {
            registry,
            shell: self.shell,
            processes: self.processes,
            placer: self.placer,
            notifier,
            presets: settings.presets,
        }
    }
}

/// Polling source over the platform's foreground probe
pub fn polling_source(interval: Duration) -> Result<Box<dyn FocusSource>> {
    let probe = platform::foreground_probe()?;
    Ok(Box::new(PollingSource::new(probe, interval)))
}

/// Start the focus source selected by `strategy`.
///
/// If the foreground hook cannot be installed, falls back to polling.
pub fn start_focus_source(
    strategy: FocusStrategy,
    interval: Duration,
    sink: FocusSink,
) -> Result<Box<dyn FocusSource>> {
    if strategy == FocusStrategy::Hook {
        match platform::hook_source() {
            Ok(mut source) => match source.start(sink.clone()) {
                Ok(()) => {
                    info!("Foreground hook installed");
                    return Ok(source);
                }
                Err(e) => warn!("Foreground hook failed: {}. Falling back to polling.", e),
            },
            Err(e) => warn!("Foreground hook unavailable: {}. Falling back to polling.", e),
        }
    }

    let mut source = polling_source(interval)?;
    source.start(sink)?;
    Ok(source)
}
