//! Serialized event loop around the state machine
//!
//! Focus events, exit notices and user actions all arrive as [`Command`]s on
//! one channel and are applied by a single thread, so the machine never sees
//! two mutations at once.

use crate::machine::{ForegroundMachine, MachineParts};
use crate::session::SessionId;
use crate::FocusEvent;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Input to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The foreground window changed
    Focus(FocusEvent),
    /// The process behind the given session exited
    SessionExited(SessionId),
    /// Re-read the target list
    Reload,
    /// Forget the tracked process and show the taskbar
    Refresh,
    /// Move the tracked window to its placement preset
    Resize,
    /// Restore the taskbar and stop the loop
    Shutdown,
}

/// Cloneable handle for posting commands
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    pub fn new(tx: Sender<Command>) -> Self {
        Self { tx }
    }

    /// Post a command. Returns false once the loop has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Owns the machine thread
pub struct Service {
    commands: CommandSender,
    handle: Option<JoinHandle<()>>,
}

impl Service {
    /// Build the machine and start its thread
    pub fn start(parts: MachineParts) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let commands = CommandSender::new(tx);
        let machine = ForegroundMachine::new(parts, commands.clone());

        let handle = thread::Builder::new()
            .name("taskhide-machine".to_string())
            .spawn(move || run(machine, rx))?;

        info!("Foreground service started");
        Ok(Self {
            commands,
            handle: Some(handle),
        })
    }

    /// Handle for focus sources and UI actions
    pub fn sender(&self) -> CommandSender {
        self.commands.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Restore the taskbar and join the machine thread. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.commands.send(Command::Shutdown);
            if handle.join().is_err() {
                error!("Foreground service thread panicked");
            }
            info!("Foreground service stopped");
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Apply commands until `Shutdown` arrives or every sender is gone
pub fn run(mut machine: ForegroundMachine, commands: Receiver<Command>) {
    for command in commands.iter() {
        debug!("Command: {:?}", command);
        match command {
            Command::Focus(event) => {
                machine.on_focus(event);
            }
            Command::SessionExited(id) => {
                machine.on_session_exit(id);
            }
            Command::Reload => machine.reload(),
            Command::Refresh => machine.refresh(),
            Command::Resize => machine.resize(),
            Command::Shutdown => break,
        }
    }

    machine.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationKind;
    use crate::testing::Harness;
    use crate::WindowHandle;
    use std::time::{Duration, Instant};

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_focus_and_exit_through_queue() {
        let harness = Harness::new("game.exe&&");
        harness.processes.spawn(42, "game.exe", Some(WindowHandle(100)));

        let mut service = Service::start(harness.parts()).unwrap();
        let sender = service.sender();

        assert!(sender.send(Command::Focus(FocusEvent::new(WindowHandle(100), 42))));
        assert!(wait_for(|| harness.shell.visible() == Some(false)));
        assert!(harness.shell.auto_hide_flag());

        // Exit fires on another thread, like the OS watcher does
        let processes = harness.processes.clone();
        thread::spawn(move || processes.kill(42)).join().unwrap();

        assert!(wait_for(|| harness.notifier.count(NotificationKind::TargetExited) == 1));
        assert_eq!(harness.shell.visible(), Some(true));
        assert!(!harness.shell.auto_hide_flag());

        service.shutdown();
        service.shutdown();
        assert!(!service.is_running());
        assert!(!sender.send(Command::Refresh));
    }

    #[test]
    fn test_shutdown_restores_taskbar() {
        let harness = Harness::new("game.exe");
        harness.processes.spawn(42, "game.exe", Some(WindowHandle(100)));

        let mut service = Service::start(harness.parts()).unwrap();
        service.sender().send(Command::Focus(FocusEvent::new(WindowHandle(100), 42)));
        assert!(wait_for(|| harness.shell.visible() == Some(false)));

        service.shutdown();
        assert_eq!(harness.shell.visible(), Some(true));
        assert!(harness.processes.watch_cancelled(42));
    }
}
