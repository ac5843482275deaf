//! Platform-specific capability implementations

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
mod linux;

mod unsupported;

pub use unsupported::{UnsupportedPlacer, UnsupportedProcesses, UnsupportedShell};

use crate::{Desktop, Result};
use taskhide_core::{FocusSource, ForegroundProbe};

#[cfg(target_os = "windows")]
pub use self::windows::{Win32Placer, Win32Probe, Win32Processes, Win32Shell, WinEventSource};

#[cfg(target_os = "linux")]
pub use linux::{ProcFsProcesses, X11Probe};

/// Native capabilities
#[cfg(target_os = "windows")]
pub fn desktop() -> Desktop {
    Desktop {
        shell: Box::new(Win32Shell::new()),
        processes: std::sync::Arc::new(Win32Processes::new()),
        placer: Box::new(Win32Placer),
    }
}

// No shell surface to toggle outside Windows; focus tracking still works for testing setups
#[cfg(target_os = "linux")]
pub fn desktop() -> Desktop {
    Desktop {
        shell: Box::new(UnsupportedShell),
        processes: std::sync::Arc::new(ProcFsProcesses::new()),
        placer: Box::new(UnsupportedPlacer),
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub fn desktop() -> Desktop {
    Desktop {
        shell: Box::new(UnsupportedShell),
        processes: std::sync::Arc::new(UnsupportedProcesses),
        placer: Box::new(UnsupportedPlacer),
    }
}

/// Event-driven foreground source
#[cfg(target_os = "windows")]
pub fn hook_source() -> Result<Box<dyn FocusSource>> {
    Ok(Box::new(WinEventSource::new()))
}

#[cfg(not(target_os = "windows"))]
pub fn hook_source() -> Result<Box<dyn FocusSource>> {
    Err(crate::ListenerError::Unsupported)
}

/// One-shot foreground query for the polling source
#[cfg(target_os = "windows")]
pub fn foreground_probe() -> Result<impl ForegroundProbe + 'static> {
    Ok(Win32Probe)
}

#[cfg(target_os = "linux")]
pub fn foreground_probe() -> Result<impl ForegroundProbe + 'static> {
    X11Probe::connect().map_err(|e| crate::ListenerError::Platform(e.to_string()))
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub fn foreground_probe() -> Result<impl ForegroundProbe + 'static> {
    Err::<unsupported::NoProbe, _>(crate::ListenerError::Unsupported)
}
