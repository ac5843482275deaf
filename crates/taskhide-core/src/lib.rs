//! Taskhide Core Library
//!
//! Provides the target registry, taskbar visibility control, tracked-session
//! lifecycle and the foreground state machine for Taskhide. Everything that
//! touches the operating system goes through the capability traits defined
//! here, so the whole state machine runs against fakes in tests.

pub mod config;
pub mod machine;
pub mod notify;
pub mod registry;
pub mod service;
pub mod session;
pub mod source;
pub mod visibility;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{FocusStrategy, Placement, PlacementPresets, Settings};
pub use machine::{FocusOutcome, ForegroundMachine, MachineParts};
pub use notify::{LogNotifier, Notification, NotificationKind, Notifier};
pub use registry::{
    FileSource, SharedRegistry, StaticSource, TargetConfig, TargetEntry, TargetRegistry, TargetSource,
};
pub use service::{Command, CommandSender, Service};
pub use session::{
    ExitNotifier, ExitSubscription, PlacementError, ProcessControl, ProcessError, SessionError, SessionId,
    TrackedSession, WindowPlacer,
};
pub use source::{FocusSink, FocusSource, ForegroundProbe, PollingSource, SourceError};
pub use visibility::{ShellError, ShellSurface, VisibilityController};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// OS process identifier
pub type Pid = u32;

/// Opaque top-level window handle (an `HWND` on Windows, an XID on X11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// A single "foreground window changed" signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusEvent {
    pub window: WindowHandle,
    pub pid: Pid,
}

impl FocusEvent {
    pub fn new(window: WindowHandle, pid: Pid) -> Self {
        Self { window, pid }
    }
}

/// Shared cancellation flag for background waits (exit watchers, poll loops)
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Get the data directory for Taskhide
pub fn data_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("com", "taskhide", "taskhide")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            directories::BaseDirs::new()
                .map(|d| d.home_dir().join(".taskhide"))
                .unwrap_or_else(|| std::path::PathBuf::from(".taskhide"))
        })
}

/// Get the config directory for Taskhide
pub fn config_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("com", "taskhide", "taskhide")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(data_dir)
}

/// Get the default target list path
pub fn targets_path() -> std::path::PathBuf {
    config_dir().join("process_names.txt")
}
