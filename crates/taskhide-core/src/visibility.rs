//! Taskbar visibility controller
//!
//! Sole owner of the hidden/shown state and the auto-hide flag. OS calls are
//! best-effort: a failure is logged and the tracked state still moves, since
//! the shell surface is assumed resolvable on a running desktop session.

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("Shell surface not found: {0}")]
    NotFound(String),
    #[error("Shell call failed: {0}")]
    CallFailed(String),
    #[error("Shell control is not supported on this platform")]
    Unsupported,
}

/// OS primitives for the shell surface (taskbar plus its start button)
pub trait ShellSurface: Send {
    /// Show or hide the shell surface and its companion control
    fn set_visible(&mut self, visible: bool) -> Result<(), ShellError>;

    /// Set the OS-level auto-hide behavior
    fn set_auto_hide(&mut self, enabled: bool) -> Result<(), ShellError>;

    /// Read the OS-level auto-hide behavior
    fn auto_hide(&self) -> Result<bool, ShellError>;
}

/// Idempotent show/hide on top of a [`ShellSurface`]
pub struct VisibilityController {
    shell: Box<dyn ShellSurface>,
    hidden: bool,
    auto_hide: bool,
}

impl VisibilityController {
    pub fn new(shell: Box<dyn ShellSurface>) -> Self {
        let auto_hide = match shell.auto_hide() {
            Ok(enabled) => enabled,
            Err(e) => {
                debug!("Could not read shell auto-hide state: {}", e);
                false
            }
        };

        Self {
            shell,
            hidden: false,
            auto_hide,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn auto_hide_enabled(&self) -> bool {
        self.auto_hide
    }

    /// Show the taskbar. Returns whether this was a transition.
    pub fn show(&mut self) -> bool {
        if !self.hidden {
            return false;
        }
        self.apply_visible(true);
        true
    }

    /// Hide the taskbar. Returns whether this was a transition.
    pub fn hide(&mut self) -> bool {
        if self.hidden {
            return false;
        }
        self.apply_visible(false);
        true
    }

    /// Show the taskbar regardless of the tracked state
    pub fn force_show(&mut self) {
        self.apply_visible(true);
    }

    /// Toggle OS auto-hide. Returns whether this was a transition.
    pub fn set_auto_hide(&mut self, enabled: bool) -> bool {
        if self.auto_hide == enabled {
            return false;
        }

        if let Err(e) = self.shell.set_auto_hide(enabled) {
            warn!("Failed to set taskbar auto-hide to {}: {}", enabled, e);
        }
        self.auto_hide = enabled;
        true
    }

    /// Set OS auto-hide regardless of the tracked flag, which may be stale
    /// if something else changed the setting
    pub fn force_auto_hide(&mut self, enabled: bool) {
        if let Err(e) = self.shell.set_auto_hide(enabled) {
            warn!("Failed to set taskbar auto-hide to {}: {}", enabled, e);
        }
        self.auto_hide = enabled;
    }

    fn apply_visible(&mut self, visible: bool) {
        if let Err(e) = self.shell.set_visible(visible) {
            warn!("Failed to {} taskbar: {}", if visible { "show" } else { "hide" }, e);
        }
        self.hidden = !visible;
        debug!("Taskbar {}", if visible { "shown" } else { "hidden" });
    }
}

impl std::fmt::Debug for VisibilityController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityController")
            .field("hidden", &self.hidden)
            .field("auto_hide", &self.auto_hide)
            .finish()
    }
}
