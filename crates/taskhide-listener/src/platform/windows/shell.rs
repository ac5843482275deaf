//! Taskbar and window placement via the Win32 shell

use std::mem;
use taskhide_core::{Placement, PlacementError, ShellError, ShellSurface, WindowHandle, WindowPlacer};
use tracing::debug;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM};
use windows::Win32::UI::Shell::{SHAppBarMessage, APPBARDATA};
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowExW, FindWindowW, GetDesktopWindow, MoveWindow, ShowWindow, SW_HIDE, SW_SHOW,
};

const ABM_GETSTATE: u32 = 0x0000_0004;
const ABM_SETSTATE: u32 = 0x0000_000A;
const ABS_AUTOHIDE: u32 = 0x0000_0001;
const ABS_ALWAYSONTOP: u32 = 0x0000_0002;

/// The primary taskbar plus the detached start button.
///
/// Handles are looked up on every call so an Explorer restart does not leave
/// us holding a dead window.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Shell;

impl Win32Shell {
    pub fn new() -> Self {
        Self
    }

    fn taskbar() -> Result<HWND, ShellError> {
        let hwnd = unsafe { FindWindowW(w!("Shell_TrayWnd"), PCWSTR::null()) };
        if hwnd.0 == 0 {
            return Err(ShellError::NotFound("Shell_TrayWnd".to_string()));
        }
        Ok(hwnd)
    }

    fn start_button() -> Option<HWND> {
        let hwnd = unsafe { FindWindowExW(GetDesktopWindow(), HWND(0), w!("Button"), PCWSTR::null()) };
        (hwnd.0 != 0).then_some(hwnd)
    }

    fn app_bar_data(taskbar: HWND) -> APPBARDATA {
        APPBARDATA {
            cbSize: mem::size_of::<APPBARDATA>() as u32,
            hWnd: taskbar,
            ..Default::default()
        }
    }
}

impl ShellSurface for Win32Shell {
    fn set_visible(&mut self, visible: bool) -> Result<(), ShellError> {
        let taskbar = Self::taskbar()?;
        let cmd = if visible { SW_SHOW } else { SW_HIDE };

        unsafe {
            // The return value is the previous visibility, not a success flag
            let _ = ShowWindow(taskbar, cmd);
            match Self::start_button() {
                Some(button) => {
                    let _ = ShowWindow(button, cmd);
                }
                None => debug!("No detached start button found"),
            }
        }
        Ok(())
    }

    fn set_auto_hide(&mut self, enabled: bool) -> Result<(), ShellError> {
        let taskbar = Self::taskbar()?;
        let mut data = Self::app_bar_data(taskbar);
        data.lParam = LPARAM(if enabled { ABS_AUTOHIDE } else { ABS_ALWAYSONTOP } as isize);

        unsafe {
            SHAppBarMessage(ABM_SETSTATE, &mut data);
        }
        Ok(())
    }

    fn auto_hide(&self) -> Result<bool, ShellError> {
        let taskbar = Self::taskbar()?;
        let mut data = Self::app_bar_data(taskbar);

        let state = unsafe { SHAppBarMessage(ABM_GETSTATE, &mut data) } as u32;
        Ok(state & ABS_AUTOHIDE != 0)
    }
}

/// Moves top-level windows with `MoveWindow`
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Placer;

impl WindowPlacer for Win32Placer {
    fn move_window(&mut self, window: WindowHandle, placement: Placement) -> Result<(), PlacementError> {
        if window.is_null() {
            return Err(PlacementError::NoWindow);
        }

        unsafe {
            MoveWindow(
                HWND(window.0),
                placement.x,
                placement.y,
                placement.width,
                placement.height,
                true,
            )
        }
        .map_err(|e| PlacementError::MoveFailed(e.to_string()))
    }
}
