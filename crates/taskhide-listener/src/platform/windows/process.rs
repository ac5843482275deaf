//! Win32 process lookup and exit watching

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use std::path::Path;
use std::thread;
use taskhide_core::{CancelToken, ExitNotifier, ExitSubscription, Pid, ProcessControl, ProcessError, WindowHandle};
use tracing::{debug, warn};
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, BOOL, E_ACCESSDENIED, E_INVALIDARG, HANDLE, HWND, LPARAM};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, WaitForSingleObject, PROCESS_ACCESS_RIGHTS,
    PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SYNCHRONIZE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowTextLengthW, GetWindowThreadProcessId, IsWindowVisible,
};

const WAIT_OBJECT_0: u32 = 0x0000_0000;
const WAIT_TIMEOUT: u32 = 0x0000_0102;

/// How long an exit watcher blocks before re-checking for cancellation
const EXIT_WAIT_SLICE_MS: u32 = 250;

/// Process handle closed on drop
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

fn open(pid: Pid, access: PROCESS_ACCESS_RIGHTS) -> Result<OwnedHandle, ProcessError> {
    match unsafe { OpenProcess(access, false, pid) } {
        Ok(handle) => Ok(OwnedHandle(handle)),
        Err(e) if e.code() == E_ACCESSDENIED => Err(ProcessError::AccessDenied(pid)),
        // OpenProcess reports a PID that no longer exists as an invalid parameter
        Err(e) if e.code() == E_INVALIDARG => Err(ProcessError::NotFound(pid)),
        Err(e) => Err(ProcessError::Query(format!("OpenProcess({}): {}", pid, e))),
    }
}

struct WindowSearch {
    pid: Pid,
    found: Option<HWND>,
}

unsafe extern "system" fn find_main_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let search = &mut *(lparam.0 as *mut WindowSearch);

    let mut owner = 0u32;
    GetWindowThreadProcessId(hwnd, Some(&mut owner));

    if owner == search.pid && IsWindowVisible(hwnd).as_bool() && GetWindowTextLengthW(hwnd) > 0 {
        search.found = Some(hwnd);
        return BOOL(0);
    }
    BOOL(1)
}

/// Process capabilities backed by the Win32 API
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Processes;

impl Win32Processes {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessControl for Win32Processes {
    fn process_name(&self, pid: Pid) -> Result<String, ProcessError> {
        // Limited information is enough for the image path and works for most elevated processes
        let handle = open(pid, PROCESS_QUERY_LIMITED_INFORMATION)?;

        let mut buf = [0u16; 1024];
        let mut len = buf.len() as u32;
        unsafe { QueryFullProcessImageNameW(handle.0, Default::default(), PWSTR(buf.as_mut_ptr()), &mut len) }
            .map_err(|e| ProcessError::Query(format!("QueryFullProcessImageNameW({}): {}", pid, e)))?;

        let path = OsString::from_wide(&buf[..len as usize]);
        Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ProcessError::Query(format!("empty image name for {}", pid)))
    }

    fn main_window(&self, pid: Pid) -> Option<WindowHandle> {
        let mut search = WindowSearch { pid, found: None };
        unsafe {
            // Returns an error when the callback stops the enumeration early
            let _ = EnumWindows(Some(find_main_window), LPARAM(&mut search as *mut WindowSearch as isize));
        }
        search.found.map(|hwnd| WindowHandle(hwnd.0))
    }

    fn watch_exit(&self, pid: Pid, on_exit: ExitNotifier) -> Result<ExitSubscription, ProcessError> {
        let handle = open(pid, PROCESS_SYNCHRONIZE)?;

        // A handle can still be opened for a process that has just exited
        if unsafe { WaitForSingleObject(handle.0, 0) }.0 == WAIT_OBJECT_0 {
            return Err(ProcessError::NotFound(pid));
        }

        let token = CancelToken::new();
        let watch_token = token.clone();

        thread::Builder::new()
            .name(format!("taskhide-exit-{}", pid))
            .spawn(move || loop {
                if watch_token.is_cancelled() {
                    debug!("Exit watch for {} cancelled", pid);
                    return;
                }

                let status = unsafe { WaitForSingleObject(handle.0, EXIT_WAIT_SLICE_MS) }.0;
                if status == WAIT_TIMEOUT {
                    continue;
                }
                if watch_token.is_cancelled() {
                    return;
                }
                if status != WAIT_OBJECT_0 {
                    warn!("Waiting on process {} failed (status {:#x}), treating it as exited", pid, status);
                }

                on_exit();
                return;
            })
            .map_err(|e| ProcessError::Query(format!("failed to spawn exit watcher: {}", e)))?;

        Ok(ExitSubscription::new(token))
    }
}
