//! Linux foreground detection over X11 and process lookup through procfs

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use taskhide_core::{
    CancelToken, ExitNotifier, ExitSubscription, FocusEvent, ForegroundProbe, Pid, ProcessControl, ProcessError,
    WindowHandle,
};
use thiserror::Error;
use tracing::{debug, trace};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

/// How often an exit watcher checks that `/proc/<pid>` still exists
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum X11Error {
    #[error("X11 connection failed: {0}")]
    Connect(String),
    #[error("Failed to intern atom {0}: {1}")]
    Atom(&'static str, String),
}

/// Reads `_NET_ACTIVE_WINDOW` and its `_NET_WM_PID` from the root window
pub struct X11Probe {
    conn: RustConnection,
    root: Window,
    active_window: Atom,
    wm_pid: Atom,
}

impl X11Probe {
    pub fn connect() -> Result<Self, X11Error> {
        let (conn, screen_num) = RustConnection::connect(None).map_err(|e| X11Error::Connect(e.to_string()))?;
        let root = conn.setup().roots[screen_num].root;

        let active_window = intern(&conn, "_NET_ACTIVE_WINDOW")?;
        let wm_pid = intern(&conn, "_NET_WM_PID")?;

        Ok(Self {
            conn,
            root,
            active_window,
            wm_pid,
        })
    }

    fn property32(&self, window: Window, property: Atom, kind: AtomEnum) -> Option<u32> {
        let reply = self
            .conn
            .get_property(false, window, property, kind, 0, 1)
            .ok()?
            .reply()
            .ok()?;
        let mut values = reply.value32()?;
        values.next()
    }
}

fn intern(conn: &RustConnection, name: &'static str) -> Result<Atom, X11Error> {
    conn.intern_atom(false, name.as_bytes())
        .map_err(|e| X11Error::Atom(name, e.to_string()))?
        .reply()
        .map(|reply| reply.atom)
        .map_err(|e| X11Error::Atom(name, e.to_string()))
}

impl ForegroundProbe for X11Probe {
    fn foreground(&self) -> Option<FocusEvent> {
        let window = self.property32(self.root, self.active_window, AtomEnum::WINDOW)?;
        if window == 0 {
            return None;
        }

        let Some(pid) = self.property32(window, self.wm_pid, AtomEnum::CARDINAL) else {
            trace!("Active window {:#x} has no _NET_WM_PID", window);
            return None;
        };

        Some(FocusEvent::new(WindowHandle(window as isize), pid))
    }
}

/// Process lookup through `/proc`
#[derive(Debug, Clone)]
pub struct ProcFsProcesses {
    root: PathBuf,
}

impl ProcFsProcesses {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn process_dir(&self, pid: Pid) -> PathBuf {
        self.root.join(pid.to_string())
    }
}

impl Default for ProcFsProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for ProcFsProcesses {
    fn process_name(&self, pid: Pid) -> Result<String, ProcessError> {
        let dir = self.process_dir(pid);

        // The exe link carries the full name; comm is truncated to 15 bytes.
        // Kernel threads and zombies have no exe link, so any failure falls through.
        match fs::read_link(dir.join("exe")) {
            Ok(exe) => {
                if let Some(name) = exe.file_name() {
                    return Ok(name.to_string_lossy().into_owned());
                }
            }
            Err(e) => debug!("Cannot read exe link for {}: {}", pid, e),
        }

        match fs::read_to_string(dir.join("comm")) {
            Ok(comm) => Ok(comm.trim_end().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ProcessError::NotFound(pid)),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(ProcessError::AccessDenied(pid)),
            Err(e) => Err(ProcessError::Query(format!("{}: {}", dir.display(), e))),
        }
    }

    fn main_window(&self, _pid: Pid) -> Option<WindowHandle> {
        None
    }

    fn watch_exit(&self, pid: Pid, on_exit: ExitNotifier) -> Result<ExitSubscription, ProcessError> {
        let dir = self.process_dir(pid);
        if !dir.exists() {
            return Err(ProcessError::NotFound(pid));
        }

        let token = CancelToken::new();
        let watch_token = token.clone();

        thread::Builder::new()
            .name(format!("taskhide-exit-{}", pid))
            .spawn(move || {
                while dir.exists() {
                    if watch_token.is_cancelled() {
                        debug!("Exit watch for {} cancelled", pid);
                        return;
                    }
                    thread::sleep(EXIT_POLL_INTERVAL);
                }
                if !watch_token.is_cancelled() {
                    on_exit();
                }
            })
            .map_err(|e| ProcessError::Query(format!("failed to spawn exit watcher: {}", e)))?;

        Ok(ExitSubscription::new(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_own_process_name() {
        let procs = ProcFsProcesses::new();
        let name = procs.process_name(std::process::id()).unwrap();
        assert!(!name.is_empty());
    }

    #[test]
    fn test_missing_process() {
        let dir = tempfile::tempdir().unwrap();
        let procs = ProcFsProcesses::with_root(dir.path());

        assert_eq!(procs.process_name(42), Err(ProcessError::NotFound(42)));
        assert!(matches!(
            procs.watch_exit(42, Box::new(|| {})),
            Err(ProcessError::NotFound(42))
        ));
    }

    #[test]
    fn test_comm_fallback() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("7")).unwrap();
        fs::write(dir.path().join("7").join("comm"), "game.exe\n").unwrap();

        let procs = ProcFsProcesses::with_root(dir.path());
        assert_eq!(procs.process_name(7).unwrap(), "game.exe");
    }

    #[test]
    fn test_exit_fires_when_dir_disappears() {
        let dir = tempfile::tempdir().unwrap();
        let proc_dir = dir.path().join("9");
        fs::create_dir(&proc_dir).unwrap();

        let procs = ProcFsProcesses::with_root(dir.path());
        let (tx, rx) = mpsc::channel();
        let _sub = procs
            .watch_exit(
                9,
                Box::new(move || {
                    let _ = tx.send(());
                }),
            )
            .unwrap();

        fs::remove_dir(&proc_dir).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_dropped_subscription_never_fires() {
        let dir = tempfile::tempdir().unwrap();
        let proc_dir = dir.path().join("11");
        fs::create_dir(&proc_dir).unwrap();

        let procs = ProcFsProcesses::with_root(dir.path());
        let (tx, rx) = mpsc::channel();
        let sub = procs
            .watch_exit(
                11,
                Box::new(move || {
                    let _ = tx.send(());
                }),
            )
            .unwrap();

        drop(sub);
        thread::sleep(EXIT_POLL_INTERVAL * 2);
        fs::remove_dir(&proc_dir).unwrap();
        assert!(rx.recv_timeout(EXIT_POLL_INTERVAL * 4).is_err());
    }
}
