//! The tracked target process
//!
//! A session exists from the moment a configured target is first seen in the
//! foreground until its process exits or the user refreshes. Its exit watcher
//! only ever posts a notice back to the state machine; it never touches the
//! session itself.

use crate::config::{Placement, PlacementPresets};
use crate::registry::TargetConfig;
use crate::visibility::VisibilityController;
use crate::{CancelToken, Pid, WindowHandle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Process {0} not found")]
    NotFound(Pid),
    #[error("Access denied to process {0}")]
    AccessDenied(Pid),
    #[error("Process query failed: {0}")]
    Query(String),
    #[error("Process control is not supported on this platform")]
    Unsupported,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("No window to place")]
    NoWindow,
    #[error("Failed to move window: {0}")]
    MoveFailed(String),
    #[error("Window placement is not supported on this platform")]
    Unsupported,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Process {pid} ({name}) exited before it could be tracked")]
    ProcessVanished { pid: Pid, name: String },
    #[error("Cannot watch process {pid} ({name}) for exit: {source}")]
    ExitWatch {
        pid: Pid,
        name: String,
        #[source]
        source: ProcessError,
    },
}

/// Callback run once when a watched process exits
pub type ExitNotifier = Box<dyn FnOnce() + Send + 'static>;

/// Live exit subscription; dropping it cancels the watch
#[derive(Debug)]
pub struct ExitSubscription {
    token: CancelToken,
}

impl ExitSubscription {
    pub fn new(token: CancelToken) -> Self {
        Self { token }
    }
}

impl Drop for ExitSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// OS process capabilities the core depends on
pub trait ProcessControl: Send + Sync {
    /// Resolve a PID to its executable name
    fn process_name(&self, pid: Pid) -> Result<String, ProcessError>;

    /// Main top-level window of a process, if it has one mapped yet
    fn main_window(&self, pid: Pid) -> Option<WindowHandle>;

    /// Run `on_exit` once when the process exits.
    ///
    /// Fails with `NotFound` if the process is already gone.
    fn watch_exit(&self, pid: Pid, on_exit: ExitNotifier) -> Result<ExitSubscription, ProcessError>;
}

/// Moves a window to a placement preset
pub trait WindowPlacer: Send {
    fn move_window(&mut self, window: WindowHandle, placement: Placement) -> Result<(), PlacementError>;
}

/// Monotonic session identifier; stale exit notices carry an old id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The single currently tracked target process
#[derive(Debug)]
pub struct TrackedSession {
    id: SessionId,
    pid: Pid,
    name: String,
    config: TargetConfig,
    window: Option<WindowHandle>,
    started_at: DateTime<Utc>,
    _exit: ExitSubscription,
}

impl TrackedSession {
    /// Start tracking `pid`.
    ///
    /// Subscribes to the process exit first; if the process is already gone no
    /// session is created and the taskbar is left alone. Otherwise applies the
    /// target's auto-hide flag and hides the taskbar, since the target is the
    /// window that was just focused.
    pub fn start(
        id: SessionId,
        pid: Pid,
        name: &str,
        config: TargetConfig,
        processes: &dyn ProcessControl,
        visibility: &mut VisibilityController,
        on_exit: ExitNotifier,
    ) -> Result<Self, SessionError> {
        let window = processes.main_window(pid);

        let exit = processes.watch_exit(pid, on_exit).map_err(|e| {
            debug!("Exit watch for {} ({}) failed: {}", name, pid, e);
            match e {
                ProcessError::NotFound(_) => SessionError::ProcessVanished {
                    pid,
                    name: name.to_string(),
                },
                source => SessionError::ExitWatch {
                    pid,
                    name: name.to_string(),
                    source,
                },
            }
        })?;

        if config.auto_hide {
            visibility.set_auto_hide(true);
        }
        visibility.hide();

        info!("Tracking {} (pid {}, session {})", name, pid, id);

        Ok(Self {
            id,
            pid,
            name: name.to_string(),
            config,
            window,
            started_at: Utc::now(),
            _exit: exit,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> TargetConfig {
        self.config
    }

    pub fn window(&self) -> Option<WindowHandle> {
        self.window
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Resolve the main window if it was not mapped when the session started
    pub fn refresh_window(&mut self, processes: &dyn ProcessControl) -> Option<WindowHandle> {
        if self.window.is_none() {
            self.window = processes.main_window(self.pid);
            if let Some(window) = self.window {
                debug!("Resolved main window {:?} for {}", window, self.name);
            }
        }
        self.window
    }

    /// Record `window` as the main window if none is known yet
    pub fn adopt_window(&mut self, window: WindowHandle) {
        if self.window.is_none() && !window.is_null() {
            debug!("Adopting foreground window {:?} for {}", window, self.name);
            self.window = Some(window);
        }
    }

    /// Move the session window to the preset selected by `alt_position`
    pub fn resize(
        &mut self,
        processes: &dyn ProcessControl,
        placer: &mut dyn WindowPlacer,
        presets: &PlacementPresets,
    ) -> Result<Placement, PlacementError> {
        let window = self.refresh_window(processes).ok_or(PlacementError::NoWindow)?;
        let placement = presets.select(self.config.alt_position);

        placer.move_window(window, placement)?;

        info!(
            "Moved {} to {},{} {}x{}",
            self.name, placement.x, placement.y, placement.width, placement.height
        );
        Ok(placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlacer, FakeProcesses, FakeShell};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_notifier(count: &Arc<AtomicUsize>) -> ExitNotifier {
        let count = Arc::clone(count);
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_start_hides_and_applies_auto_hide() {
        let shell = FakeShell::new();
        let mut visibility = VisibilityController::new(Box::new(shell.clone()));
        let processes = FakeProcesses::new();
        processes.spawn(42, "game.exe", Some(WindowHandle(100)));

        let config = TargetConfig { alt_position: false, auto_hide: true };
        let exits = Arc::new(AtomicUsize::new(0));
        let session = TrackedSession::start(
            SessionId(1),
            42,
            "game.exe",
            config,
            &processes,
            &mut visibility,
            counter_notifier(&exits),
        )
        .unwrap();

        assert_eq!(session.window(), Some(WindowHandle(100)));
        assert!(visibility.is_hidden());
        assert!(visibility.auto_hide_enabled());
        assert_eq!(shell.visible_calls(), 1);
    }

    #[test]
    fn test_vanished_process_leaves_taskbar_alone() {
        let shell = FakeShell::new();
        let mut visibility = VisibilityController::new(Box::new(shell.clone()));
        let processes = FakeProcesses::new();

        let exits = Arc::new(AtomicUsize::new(0));
        let result = TrackedSession::start(
            SessionId(1),
            42,
            "game.exe",
            TargetConfig { alt_position: false, auto_hide: true },
            &processes,
            &mut visibility,
            counter_notifier(&exits),
        );

        assert!(matches!(result, Err(SessionError::ProcessVanished { pid: 42, .. })));
        assert!(!visibility.is_hidden());
        assert!(!visibility.auto_hide_enabled());
        assert_eq!(shell.visible_calls(), 0);
    }

    #[test]
    fn test_watch_failure_distinct_from_vanished() {
        let shell = FakeShell::new();
        let mut visibility = VisibilityController::new(Box::new(shell.clone()));
        let processes = FakeProcesses::new();
        processes.spawn(42, "game.exe", Some(WindowHandle(100)));
        processes.deny_watch(42);

        let result = TrackedSession::start(
            SessionId(1),
            42,
            "game.exe",
            TargetConfig::default(),
            &processes,
            &mut visibility,
            Box::new(|| {}),
        );

        match result {
            Err(SessionError::ExitWatch { pid, source, .. }) => {
                assert_eq!(pid, 42);
                assert_eq!(source, ProcessError::AccessDenied(42));
            }
            other => panic!("expected an exit watch failure, got {:?}", other),
        }
        assert!(!visibility.is_hidden());
        assert_eq!(shell.visible_calls(), 0);
    }

    #[test]
    fn test_exit_fires_once_and_drop_cancels() {
        let mut visibility = VisibilityController::new(Box::new(FakeShell::new()));
        let processes = FakeProcesses::new();
        processes.spawn(42, "game.exe", None);

        let exits = Arc::new(AtomicUsize::new(0));
        let session = TrackedSession::start(
            SessionId(1),
            42,
            "game.exe",
            TargetConfig::default(),
            &processes,
            &mut visibility,
            counter_notifier(&exits),
        )
        .unwrap();

        processes.kill(42);
        processes.kill(42);
        assert_eq!(exits.load(Ordering::SeqCst), 1);

        drop(session);
        assert!(processes.watch_cancelled(42));
    }

    #[test]
    fn test_resize_uses_preset_and_late_window() {
        let mut visibility = VisibilityController::new(Box::new(FakeShell::new()));
        let processes = FakeProcesses::new();
        processes.spawn(7, "game.exe", None);
        let mut placer = FakePlacer::new();
        let presets = PlacementPresets::default();

        let mut session = TrackedSession::start(
            SessionId(3),
            7,
            "game.exe",
            TargetConfig { alt_position: true, auto_hide: false },
            &processes,
            &mut visibility,
            Box::new(|| {}),
        )
        .unwrap();

        // Window not mapped yet
        assert_eq!(
            session.resize(&processes, &mut placer, &presets),
            Err(PlacementError::NoWindow)
        );

        processes.set_window(7, WindowHandle(55));
        let placement = session.resize(&processes, &mut placer, &presets).unwrap();
        assert_eq!(placement, presets.alternate);
        assert_eq!(placer.moves(), vec![(WindowHandle(55), presets.alternate)]);
    }
}
