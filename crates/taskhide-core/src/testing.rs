//! In-memory fakes for the OS capabilities

use crate::config::{Placement, PlacementPresets};
use crate::machine::{ForegroundMachine, MachineParts};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::registry::{SharedRegistry, StaticSource};
use crate::service::{Command, CommandSender};
use crate::session::{
    ExitNotifier, ExitSubscription, PlacementError, ProcessControl, ProcessError, SessionId, WindowPlacer,
};
use crate::source::ForegroundProbe;
use crate::visibility::{ShellError, ShellSurface};
use crate::{CancelToken, FocusEvent, Pid, WindowHandle};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ShellState {
    visible: Option<bool>,
    show_calls: usize,
    hide_calls: usize,
    auto_hide: bool,
    auto_hide_calls: usize,
    fail: bool,
}

/// Records every shell call
#[derive(Debug, Clone, Default)]
pub struct FakeShell {
    state: Arc<Mutex<ShellState>>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shell whose every call fails
    pub fn failing() -> Self {
        let shell = Self::default();
        shell.state.lock().unwrap().fail = true;
        shell
    }

    pub fn visible(&self) -> Option<bool> {
        self.state.lock().unwrap().visible
    }

    pub fn visible_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.show_calls + state.hide_calls
    }

    pub fn show_calls(&self) -> usize {
        self.state.lock().unwrap().show_calls
    }

    pub fn hide_calls(&self) -> usize {
        self.state.lock().unwrap().hide_calls
    }

    pub fn auto_hide_flag(&self) -> bool {
        self.state.lock().unwrap().auto_hide
    }

    pub fn auto_hide_calls(&self) -> usize {
        self.state.lock().unwrap().auto_hide_calls
    }
}

impl ShellSurface for FakeShell {
    fn set_visible(&mut self, visible: bool) -> Result<(), ShellError> {
        let mut state = self.state.lock().unwrap();
        if visible {
            state.show_calls += 1;
        } else {
            state.hide_calls += 1;
        }
        if state.fail {
            return Err(ShellError::CallFailed("ShowWindow".to_string()));
        }
        state.visible = Some(visible);
        Ok(())
    }

    fn set_auto_hide(&mut self, enabled: bool) -> Result<(), ShellError> {
        let mut state = self.state.lock().unwrap();
        state.auto_hide_calls += 1;
        if state.fail {
            return Err(ShellError::CallFailed("SHAppBarMessage".to_string()));
        }
        state.auto_hide = enabled;
        Ok(())
    }

    fn auto_hide(&self) -> Result<bool, ShellError> {
        let state = self.state.lock().unwrap();
        if state.fail {
            return Err(ShellError::NotFound("Shell_TrayWnd".to_string()));
        }
        Ok(state.auto_hide)
    }
}

struct Watch {
    on_exit: Option<ExitNotifier>,
    token: CancelToken,
}

#[derive(Default)]
struct ProcessState {
    processes: HashMap<Pid, (String, Option<WindowHandle>)>,
    denied: HashSet<Pid>,
    vanish_on_watch: HashSet<Pid>,
    watch_denied: HashSet<Pid>,
    watches: HashMap<Pid, Watch>,
    watch_count: usize,
}

/// Scripted process table
#[derive(Clone, Default)]
pub struct FakeProcesses {
    state: Arc<Mutex<ProcessState>>,
}

impl FakeProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, pid: Pid, name: &str, window: Option<WindowHandle>) {
        let mut state = self.state.lock().unwrap();
        state.processes.insert(pid, (name.to_string(), window));
        state.vanish_on_watch.remove(&pid);
    }

    pub fn set_window(&self, pid: Pid, window: WindowHandle) {
        if let Some(entry) = self.state.lock().unwrap().processes.get_mut(&pid) {
            entry.1 = Some(window);
        }
    }

    /// Name queries for `pid` fail with access denied
    pub fn deny(&self, pid: Pid) {
        self.state.lock().unwrap().denied.insert(pid);
    }

    pub fn allow(&self, pid: Pid) {
        self.state.lock().unwrap().denied.remove(&pid);
    }

    /// The process disappears between name resolution and the exit subscription
    pub fn vanish_on_watch(&self, pid: Pid) {
        self.state.lock().unwrap().vanish_on_watch.insert(pid);
    }

    /// Exit subscriptions for `pid` fail with access denied
    pub fn deny_watch(&self, pid: Pid) {
        self.state.lock().unwrap().watch_denied.insert(pid);
    }

    /// Terminate a process, firing its exit watch unless it was cancelled
    pub fn kill(&self, pid: Pid) {
        let notifier = {
            let mut state = self.state.lock().unwrap();
            state.processes.remove(&pid);
            state
                .watches
                .get_mut(&pid)
                .filter(|w| !w.token.is_cancelled())
                .and_then(|w| w.on_exit.take())
        };

        if let Some(on_exit) = notifier {
            on_exit();
        }
    }

    pub fn watch_cancelled(&self, pid: Pid) -> bool {
        self.state
            .lock()
            .unwrap()
            .watches
            .get(&pid)
            .map(|w| w.token.is_cancelled())
            .unwrap_or(false)
    }

    pub fn watch_count(&self) -> usize {
        self.state.lock().unwrap().watch_count
    }
}

impl ProcessControl for FakeProcesses {
    fn process_name(&self, pid: Pid) -> Result<String, ProcessError> {
        let state = self.state.lock().unwrap();
        if state.denied.contains(&pid) {
            return Err(ProcessError::AccessDenied(pid));
        }
        state
            .processes
            .get(&pid)
            .map(|(name, _)| name.clone())
            .ok_or(ProcessError::NotFound(pid))
    }

    fn main_window(&self, pid: Pid) -> Option<WindowHandle> {
        self.state.lock().unwrap().processes.get(&pid).and_then(|(_, w)| *w)
    }

    fn watch_exit(&self, pid: Pid, on_exit: ExitNotifier) -> Result<ExitSubscription, ProcessError> {
        let mut state = self.state.lock().unwrap();
        if !state.processes.contains_key(&pid) || state.vanish_on_watch.contains(&pid) {
            return Err(ProcessError::NotFound(pid));
        }
        if state.watch_denied.contains(&pid) {
            return Err(ProcessError::AccessDenied(pid));
        }

        let token = CancelToken::new();
        state.watches.insert(
            pid,
            Watch {
                on_exit: Some(on_exit),
                token: token.clone(),
            },
        );
        state.watch_count += 1;
        Ok(ExitSubscription::new(token))
    }
}

/// Records window moves
#[derive(Debug, Clone, Default)]
pub struct FakePlacer {
    moves: Arc<Mutex<Vec<(WindowHandle, Placement)>>>,
}

impl FakePlacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn moves(&self) -> Vec<(WindowHandle, Placement)> {
        self.moves.lock().unwrap().clone()
    }
}

impl WindowPlacer for FakePlacer {
    fn move_window(&mut self, window: WindowHandle, placement: Placement) -> Result<(), PlacementError> {
        self.moves.lock().unwrap().push((window, placement));
        Ok(())
    }
}

/// Keeps every notification
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.sent.lock().unwrap().iter().filter(|n| n.kind == kind).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.sent.lock().unwrap().push(notification.clone());
    }
}

/// Returns a fixed sequence of probe results, then `None` forever
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Option<FocusEvent>>>,
    drained: Arc<AtomicBool>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<Option<FocusEvent>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            drained: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag raised once the script has been consumed
    pub fn drained(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.drained)
    }
}

impl ForegroundProbe for ScriptedProbe {
    fn foreground(&self) -> Option<FocusEvent> {
        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(step) => step,
            None => {
                self.drained.store(true, Ordering::SeqCst);
                None
            }
        }
    }
}

/// A full set of fakes wired the way the service wires the real ones
pub struct Harness {
    pub shell: FakeShell,
    pub processes: FakeProcesses,
    pub placer: FakePlacer,
    pub notifier: RecordingNotifier,
    pub source: StaticSource,
    pub registry: Arc<SharedRegistry>,
    tx: Sender<Command>,
    rx: Receiver<Command>,
}

impl Harness {
    pub fn new(targets: &str) -> Self {
        let source = StaticSource::new(targets);
        let registry = Arc::new(SharedRegistry::load(Box::new(source.clone())).unwrap());
        let (tx, rx) = mpsc::channel();

        Self {
            shell: FakeShell::new(),
            processes: FakeProcesses::new(),
            placer: FakePlacer::new(),
            notifier: RecordingNotifier::default(),
            source,
            registry,
            tx,
            rx,
        }
    }

    pub fn parts(&self) -> MachineParts {
        MachineParts {
            registry: Arc::clone(&self.registry),
            shell: Box::new(self.shell.clone()),
            processes: Arc::new(self.processes.clone()),
            placer: Box::new(self.placer.clone()),
            notifier: Box::new(self.notifier.clone()),
            presets: PlacementPresets::default(),
        }
    }

    /// A machine whose exit notices land in this harness' queue
    pub fn machine(&self) -> ForegroundMachine {
        ForegroundMachine::new(self.parts(), CommandSender::new(self.tx.clone()))
    }

    pub fn drain_exits(&self) -> Vec<SessionId> {
        self.rx
            .try_iter()
            .filter_map(|c| match c {
                Command::SessionExited(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}
