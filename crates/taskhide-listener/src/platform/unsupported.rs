//! Stand-ins for capabilities a platform does not offer

use taskhide_core::{
    ExitNotifier, ExitSubscription, Pid, Placement, PlacementError, ProcessControl, ProcessError, ShellError,
    ShellSurface, WindowHandle, WindowPlacer,
};

/// Shell surface that refuses every call; the visibility controller logs and moves on
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedShell;

impl ShellSurface for UnsupportedShell {
    fn set_visible(&mut self, _visible: bool) -> Result<(), ShellError> {
        Err(ShellError::Unsupported)
    }

    fn set_auto_hide(&mut self, _enabled: bool) -> Result<(), ShellError> {
        Err(ShellError::Unsupported)
    }

    fn auto_hide(&self) -> Result<bool, ShellError> {
        Err(ShellError::Unsupported)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPlacer;

impl WindowPlacer for UnsupportedPlacer {
    fn move_window(&mut self, _window: WindowHandle, _placement: Placement) -> Result<(), PlacementError> {
        Err(PlacementError::Unsupported)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedProcesses;

impl ProcessControl for UnsupportedProcesses {
    fn process_name(&self, _pid: Pid) -> Result<String, ProcessError> {
        Err(ProcessError::Unsupported)
    }

    fn main_window(&self, _pid: Pid) -> Option<WindowHandle> {
        None
    }

    fn watch_exit(&self, _pid: Pid, _on_exit: ExitNotifier) -> Result<ExitSubscription, ProcessError> {
        Err(ProcessError::Unsupported)
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub struct NoProbe;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
impl taskhide_core::ForegroundProbe for NoProbe {
    fn foreground(&self) -> Option<taskhide_core::FocusEvent> {
        None
    }
}
