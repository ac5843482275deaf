//! Foreground change notification via `SetWinEventHook`

use std::cell::RefCell;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use taskhide_core::{FocusEvent, FocusSink, FocusSource, ForegroundProbe, SourceError, WindowHandle};
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{HMODULE, HWND, LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetForegroundWindow, GetMessageW, GetWindowThreadProcessId, PeekMessageW,
    PostThreadMessageW, TranslateMessage, MSG, PM_NOREMOVE, WM_QUIT, WM_USER,
};

const EVENT_SYSTEM_FOREGROUND: u32 = 0x0003;
const WINEVENT_OUTOFCONTEXT: u32 = 0x0000;
const WINEVENT_SKIPOWNPROCESS: u32 = 0x0002;

thread_local! {
    // Out-of-context callbacks run on the thread that installed the hook
    static SINK: RefCell<Option<FocusSink>> = RefCell::new(None);
}

fn focus_event(hwnd: HWND) -> Option<FocusEvent> {
    if hwnd.0 == 0 {
        return None;
    }

    let mut pid = 0u32;
    unsafe {
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
    }
    if pid == 0 {
        return None;
    }

    Some(FocusEvent::new(WindowHandle(hwnd.0), pid))
}

unsafe extern "system" fn on_foreground(
    _hook: HWINEVENTHOOK,
    _event: u32,
    hwnd: HWND,
    _id_object: i32,
    _id_child: i32,
    _event_thread: u32,
    _event_time: u32,
) {
    let Some(event) = focus_event(hwnd) else {
        return;
    };

    SINK.with(|sink| {
        if let Some(sink) = sink.borrow().as_ref() {
            if !sink.emit(event) {
                debug!("Focus consumer gone, dropping foreground event");
            }
        }
    });
}

/// Event-driven source: one event per foreground transition
#[derive(Debug, Default)]
pub struct WinEventSource {
    thread_id: Option<u32>,
    handle: Option<JoinHandle<()>>,
}

impl WinEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(sink: FocusSink, ready: mpsc::Sender<Result<u32, String>>) {
        SINK.with(|slot| *slot.borrow_mut() = Some(sink));

        let hook = unsafe {
            SetWinEventHook(
                EVENT_SYSTEM_FOREGROUND,
                EVENT_SYSTEM_FOREGROUND,
                HMODULE::default(),
                Some(on_foreground),
                0,
                0,
                WINEVENT_OUTOFCONTEXT | WINEVENT_SKIPOWNPROCESS,
            )
        };

        if hook.0 == 0 {
            let _ = ready.send(Err("SetWinEventHook returned a null hook".to_string()));
            SINK.with(|slot| slot.borrow_mut().take());
            return;
        }

        let mut msg = MSG::default();
        let thread_id = unsafe {
            // Make sure the thread has a message queue before anyone posts WM_QUIT to it
            let _ = PeekMessageW(&mut msg, HWND(0), WM_USER, WM_USER, PM_NOREMOVE);
            GetCurrentThreadId()
        };
        let _ = ready.send(Ok(thread_id));

        unsafe {
            // GetMessageW returns -1 on error, 0 on WM_QUIT
            while GetMessageW(&mut msg, HWND(0), 0, 0).0 > 0 {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
            let _ = UnhookWinEvent(hook);
        }

        SINK.with(|slot| slot.borrow_mut().take());
        debug!("WinEvent message loop exited");
    }
}

impl FocusSource for WinEventSource {
    fn start(&mut self, sink: FocusSink) -> Result<(), SourceError> {
        if self.handle.is_some() {
            return Err(SourceError::AlreadyRunning);
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("taskhide-winevent".to_string())
            .spawn(move || Self::run(sink, ready_tx))
            .map_err(|e| SourceError::StartFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                info!("Foreground hook running on thread {}", thread_id);
                self.thread_id = Some(thread_id);
                self.handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(SourceError::StartFailed(e))
            }
            Err(_) => {
                let _ = handle.join();
                Err(SourceError::StartFailed("hook thread exited during startup".to_string()))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(thread_id) = self.thread_id.take() {
            if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
                warn!("Failed to post WM_QUIT to hook thread: {}", e);
            }
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Hook thread panicked");
            }
            info!("Foreground hook removed");
        }
    }

    fn name(&self) -> &'static str {
        "hook"
    }
}

impl Drop for WinEventSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `GetForegroundWindow` probe for the polling fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Probe;

impl ForegroundProbe for Win32Probe {
    fn foreground(&self) -> Option<FocusEvent> {
        let hwnd = unsafe { GetForegroundWindow() };
        focus_event(hwnd)
    }
}
