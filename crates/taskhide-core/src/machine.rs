//! Foreground state machine
//!
//! Two states: idle, or tracking exactly one target session. Focus events
//! start a session (idle) or flip taskbar visibility (tracking); the session's
//! exit notice returns the machine to idle. The machine is only ever driven
//! from the service thread.

use crate::config::PlacementPresets;
use crate::notify::{Notification, Notifier};
use crate::registry::SharedRegistry;
use crate::service::{Command, CommandSender};
use crate::session::{ExitNotifier, ProcessControl, SessionError, SessionId, TrackedSession, WindowPlacer};
use crate::visibility::{ShellSurface, VisibilityController};
use crate::FocusEvent;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the machine needs from the outside world
pub struct MachineParts {
    pub registry: Arc<SharedRegistry>,
    pub shell: Box<dyn ShellSurface>,
    pub processes: Arc<dyn ProcessControl>,
    pub placer: Box<dyn WindowPlacer>,
    pub notifier: Box<dyn Notifier>,
    pub presets: PlacementPresets,
}

/// What a focus event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    /// Null window or PID, or an untracked process while idle
    Ignored,
    /// The PID could not be resolved to a name, or the process could not be watched
    Unresolved,
    /// A target matched but exited before it could be tracked
    Vanished,
    /// A new session was started and the taskbar hidden
    Started(SessionId),
    /// The tracked window came back to the foreground
    Hidden,
    /// Another window took the foreground from the tracked one
    Shown,
    /// Visibility was already correct
    Unchanged,
}

enum State {
    Idle,
    Tracking(TrackedSession),
}

pub struct ForegroundMachine {
    registry: Arc<SharedRegistry>,
    visibility: VisibilityController,
    processes: Arc<dyn ProcessControl>,
    placer: Box<dyn WindowPlacer>,
    notifier: Box<dyn Notifier>,
    presets: PlacementPresets,
    commands: CommandSender,
    state: State,
    next_session: u64,
}

impl ForegroundMachine {
    /// Create an idle machine. The taskbar is forced visible as a known baseline.
    pub fn new(parts: MachineParts, commands: CommandSender) -> Self {
        let mut visibility = VisibilityController::new(parts.shell);
        visibility.force_show();

        Self {
            registry: parts.registry,
            visibility,
            processes: parts.processes,
            placer: parts.placer,
            notifier: parts.notifier,
            presets: parts.presets,
            commands,
            state: State::Idle,
            next_session: 1,
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, State::Tracking(_))
    }

    pub fn session(&self) -> Option<&TrackedSession> {
        match &self.state {
            State::Tracking(session) => Some(session),
            State::Idle => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility.is_hidden()
    }

    pub fn auto_hide_enabled(&self) -> bool {
        self.visibility.auto_hide_enabled()
    }

    /// Handle a foreground change
    pub fn on_focus(&mut self, event: FocusEvent) -> FocusOutcome {
        if event.window.is_null() || event.pid == 0 {
            return FocusOutcome::Ignored;
        }

        // An unmanageable process (access denied, already gone) cannot be acted on
        let name = match self.processes.process_name(event.pid) {
            Ok(name) => name,
            Err(e) => {
                debug!("Dropping focus event for pid {}: {}", event.pid, e);
                return FocusOutcome::Unresolved;
            }
        };

        match &mut self.state {
            State::Idle => self.try_track(event, &name),
            State::Tracking(session) => {
                let tracked = match session.refresh_window(self.processes.as_ref()) {
                    Some(window) => window == event.window,
                    None if session.pid() == event.pid => {
                        session.adopt_window(event.window);
                        true
                    }
                    None => false,
                };

                if tracked && !self.visibility.is_hidden() {
                    self.visibility.hide();
                    debug!("{} is foreground again, taskbar hidden", session.name());
                    FocusOutcome::Hidden
                } else if !tracked && self.visibility.is_hidden() {
                    self.visibility.show();
                    debug!("{} lost the foreground to {}, taskbar shown", session.name(), name);
                    FocusOutcome::Shown
                } else {
                    FocusOutcome::Unchanged
                }
            }
        }
    }

    fn try_track(&mut self, event: FocusEvent, name: &str) -> FocusOutcome {
        let config = match self.registry.snapshot().lookup(name) {
            Some(entry) => entry.config,
            None => return FocusOutcome::Ignored,
        };

        let id = SessionId(self.next_session);
        self.next_session += 1;
        let on_exit = self.exit_notifier(id);

        match TrackedSession::start(
            id,
            event.pid,
            name,
            config,
            self.processes.as_ref(),
            &mut self.visibility,
            on_exit,
        ) {
            Ok(mut session) => {
                session.adopt_window(event.window);
                self.state = State::Tracking(session);
                self.notifier.notify(&Notification::target_started(name));
                FocusOutcome::Started(id)
            }
            Err(SessionError::ProcessVanished { pid, name }) => {
                debug!("{} (pid {}) vanished before tracking started", name, pid);
                FocusOutcome::Vanished
            }
            Err(e @ SessionError::ExitWatch { .. }) => {
                warn!("Not tracking: {}", e);
                FocusOutcome::Unresolved
            }
        }
    }

    fn exit_notifier(&self, id: SessionId) -> ExitNotifier {
        let commands = self.commands.clone();
        Box::new(move || {
            if !commands.send(Command::SessionExited(id)) {
                debug!("Session {} exited after the service stopped", id);
            }
        })
    }

    /// Handle the exit notice of a session. Returns false for stale notices.
    pub fn on_session_exit(&mut self, id: SessionId) -> bool {
        let name = match &self.state {
            State::Tracking(session) if session.id() == id => session.name().to_string(),
            _ => {
                debug!("Ignoring exit notice for inactive session {}", id);
                return false;
            }
        };

        self.state = State::Idle;
        self.visibility.show();
        // Always reset to disabled; any auto-hide the user had before is not restored
        self.visibility.force_auto_hide(false);

        info!("{} exited, session {} ended", name, id);
        self.notifier.notify(&Notification::target_exited(&name));
        true
    }

    /// Re-read the target list. The active session keeps the config it started with.
    pub fn reload(&mut self) {
        match self.registry.reload() {
            Ok(registry) => {
                info!("Target list updated ({} targets)", registry.len());
                self.notifier.notify(&Notification::targets_updated());
            }
            Err(e) => warn!("Target list reload failed: {}", e),
        }
    }

    /// Forget the tracked process and show the taskbar
    pub fn refresh(&mut self) {
        self.end_session();
        self.visibility.show();
        info!("Refreshed, waiting for a new target");
        self.notifier.notify(&Notification::refreshed());
    }

    /// Move the tracked window to its placement preset. No-op when idle.
    pub fn resize(&mut self) {
        match &mut self.state {
            State::Tracking(session) => {
                if let Err(e) = session.resize(self.processes.as_ref(), self.placer.as_mut(), &self.presets) {
                    warn!("Resize of {} failed: {}", session.name(), e);
                }
            }
            State::Idle => debug!("Resize requested with no tracked target"),
        }
    }

    /// Drop any session and leave the taskbar visible
    pub fn shutdown(&mut self) {
        self.end_session();
        self.visibility.force_show();
        info!("Foreground machine shut down");
    }

    fn end_session(&mut self) {
        if let State::Tracking(session) = std::mem::replace(&mut self.state, State::Idle) {
            if session.config().auto_hide {
                self.visibility.set_auto_hide(false);
            }
            debug!("Dropped session {} for {}", session.id(), session.name());
        }
    }
}

impl std::fmt::Debug for ForegroundMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForegroundMachine")
            .field("session", &self.session().map(|s| (s.id(), s.name().to_string())))
            .field("visibility", &self.visibility)
            .finish()
    }
}
