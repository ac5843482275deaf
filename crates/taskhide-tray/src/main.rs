//! Taskhide System Tray App
//!
//! Runs the foreground service behind a tray icon with actions to edit and
//! reload the target list, forget the tracked game, resize its window, and
//! exit. Notifications show up in the tray tooltip and the log.

use anyhow::{Context, Result};
use std::path::Path;
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;
use taskhide_core::{
    Command, CommandSender, FileSource, FocusSink, FocusSource, Notification, Notifier, Service, Settings,
    SharedRegistry,
};
use taskhide_listener::{startup, Desktop};
use tao::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy},
    window::WindowBuilder,
};
use tracing::{error, info, warn};
use tray_icon::{
    menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem},
    TrayIcon, TrayIconBuilder,
};

const TOOLTIP: &str = "Taskhide";

/// Events injected into the tray event loop from other threads
#[derive(Debug)]
enum UserEvent {
    Menu(MenuEvent),
    Notify(Notification),
}

/// Forwards machine notifications to the UI thread
struct TrayNotifier {
    proxy: EventLoopProxy<UserEvent>,
}

impl Notifier for TrayNotifier {
    fn notify(&self, notification: &Notification) {
        info!("{}: {}", notification.title, notification.message);
        if self.proxy.send_event(UserEvent::Notify(notification.clone())).is_err() {
            warn!("Tray event loop closed, dropping notification");
        }
    }
}

struct MenuIds {
    edit: MenuId,
    reload: MenuId,
    refresh: MenuId,
    resize: MenuId,
    exit: MenuId,
}

/// What a menu click asks for
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Edit,
    Post(Command),
    Exit,
}

impl MenuIds {
    fn action(&self, id: &MenuId) -> Option<Action> {
        if *id == self.edit {
            Some(Action::Edit)
        } else if *id == self.reload {
            Some(Action::Post(Command::Reload))
        } else if *id == self.refresh {
            Some(Action::Post(Command::Refresh))
        } else if *id == self.resize {
            Some(Action::Post(Command::Resize))
        } else if *id == self.exit {
            Some(Action::Exit)
        } else {
            None
        }
    }
}

/// Service and focus source, torn down together on exit
struct Running {
    service: Service,
    focus: Box<dyn FocusSource>,
}

impl Running {
    fn sender(&self) -> CommandSender {
        self.service.sender()
    }

    fn stop(mut self) {
        self.focus.stop();
        self.service.shutdown();
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskhide=info".parse()?),
        )
        .init();

    let settings = Settings::from_env();

    // A failed registration must not keep the app from running
    startup::register_current_exe();

    let source = FileSource::new(&settings.targets_path);
    source.ensure_exists()?;
    let targets_path = source.path().to_path_buf();
    let registry = Arc::new(SharedRegistry::load(Box::new(source))?);

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();

    // Create a hidden window (required on some platforms)
    let _window = WindowBuilder::new().with_visible(false).build(&event_loop)?;

    let tray_menu = Menu::new();
    let edit = MenuItem::new("Edit Targets", true, None);
    let reload = MenuItem::new("Reload Targets", true, None);
    let refresh = MenuItem::new("Refresh", true, None);
    let resize = MenuItem::new("Resize", true, None);
    let exit = MenuItem::new("Exit", true, None);

    tray_menu.append(&edit)?;
    tray_menu.append(&reload)?;
    tray_menu.append(&PredefinedMenuItem::separator())?;
    tray_menu.append(&refresh)?;
    tray_menu.append(&resize)?;
    tray_menu.append(&PredefinedMenuItem::separator())?;
    tray_menu.append(&exit)?;

    let ids = MenuIds {
        edit: edit.id().clone(),
        reload: reload.id().clone(),
        refresh: refresh.id().clone(),
        resize: resize.id().clone(),
        exit: exit.id().clone(),
    };

    let tray_icon = TrayIconBuilder::new()
        .with_menu(Box::new(tray_menu))
        .with_tooltip(TOOLTIP)
        .with_icon(load_icon()?)
        .build()?;

    // Menu events arrive on the UI thread's hook; route them through the loop
    let menu_proxy = Mutex::new(event_loop.create_proxy());
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        if let Ok(proxy) = menu_proxy.lock() {
            let _ = proxy.send_event(UserEvent::Menu(event));
        }
    }));

    let notifier = TrayNotifier {
        proxy: event_loop.create_proxy(),
    };
    let parts = Desktop::native().into_parts(registry, Box::new(notifier), &settings);
    let service = Service::start(parts).context("Failed to start foreground service")?;
    let focus = taskhide_listener::start_focus_source(
        settings.strategy,
        settings.poll_interval,
        FocusSink::new(service.sender()),
    )?;
    info!("Taskhide tray running, watching foreground via {}", focus.name());

    let mut running = Some(Running { service, focus });

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::UserEvent(UserEvent::Menu(event)) => match ids.action(&event.id) {
                Some(Action::Edit) => {
                    if let Some(running) = &running {
                        edit_targets(&targets_path, running.sender());
                    }
                }
                Some(Action::Post(command)) => {
                    if let Some(running) = &running {
                        if !running.sender().send(command) {
                            error!("Foreground service is not running");
                        }
                    }
                }
                Some(Action::Exit) => {
                    if let Some(running) = running.take() {
                        running.stop();
                    }
                    *control_flow = ControlFlow::Exit;
                }
                None => {}
            },
            Event::UserEvent(UserEvent::Notify(notification)) => {
                show_notification(&tray_icon, &notification);
            }
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                if let Some(running) = running.take() {
                    running.stop();
                }
                *control_flow = ControlFlow::Exit;
            }
            _ => {}
        }
    });
}

/// Editor process for the target list; the list is reloaded when it exits
fn editor_command(path: &Path) -> Option<process::Command> {
    if cfg!(target_os = "windows") {
        // `start` returns at once, so launch the editor itself to have something to wait on
        let mut command = process::Command::new("notepad.exe");
        command.arg(path);
        Some(command)
    } else {
        open::commands(path).into_iter().next()
    }
}

/// Open the target list and reload it once the editor closes
fn edit_targets(path: &Path, commands: CommandSender) {
    let Some(command) = editor_command(path) else {
        error!("No editor available for {:?}", path);
        return;
    };

    let spawned = thread::Builder::new()
        .name("taskhide-editor".to_string())
        .spawn(move || edit_then_reload(command, &commands));
    if let Err(e) = spawned {
        error!("Failed to start editor thread: {}", e);
    }
}

/// Run `editor` to completion, then post a reload. Returns whether a reload was posted.
fn edit_then_reload(mut editor: process::Command, commands: &CommandSender) -> bool {
    let status = match editor.spawn().and_then(|mut child| child.wait()) {
        Ok(status) => status,
        Err(e) => {
            error!("Failed to run editor {:?}: {}", editor.get_program(), e);
            return false;
        }
    };

    if !status.success() {
        warn!("Editor exited with {}", status);
    }
    commands.send(Command::Reload)
}

fn show_notification(tray_icon: &TrayIcon, notification: &Notification) {
    let text = format!("{} - {}: {}", TOOLTIP, notification.title, notification.message);
    if let Err(e) = tray_icon.set_tooltip(Some(text)) {
        warn!("Failed to update tray tooltip: {}", e);
    }
}

const ICON_SIZE: usize = 16;

/// A small monitor with a dashed-out taskbar strip along the bottom
fn icon_rgba(size: usize) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(size * size * 4);

    for y in 0..size {
        for x in 0..size {
            let in_screen = (1..size - 1).contains(&x) && (2..size - 3).contains(&y);
            let is_border = in_screen && (x == 1 || x == size - 2 || y == 2 || y == size - 4);
            let in_bar = in_screen && y == size - 5 && x % 2 == 0;

            if is_border {
                rgba.extend_from_slice(&[60, 60, 60, 255]);
            } else if in_bar {
                rgba.extend_from_slice(&[200, 200, 200, 255]);
            } else if in_screen {
                rgba.extend_from_slice(&[40, 120, 220, 255]);
            } else {
                rgba.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }

    rgba
}

fn load_icon() -> Result<tray_icon::Icon> {
    let icon = tray_icon::Icon::from_rgba(icon_rgba(ICON_SIZE), ICON_SIZE as u32, ICON_SIZE as u32)
        .context("Failed to create tray icon")?;
    Ok(icon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_buffer_size() {
        let rgba = icon_rgba(ICON_SIZE);
        assert_eq!(rgba.len(), ICON_SIZE * ICON_SIZE * 4);
        // Corners stay transparent
        assert_eq!(rgba[3], 0);
        assert_eq!(rgba[rgba.len() - 1], 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_editor_exit_posts_reload() {
        let (tx, rx) = std::sync::mpsc::channel();
        let commands = CommandSender::new(tx);

        assert!(edit_then_reload(process::Command::new("true"), &commands));
        assert_eq!(rx.try_recv().ok(), Some(Command::Reload));
    }

    #[test]
    fn test_missing_editor_posts_nothing() {
        let (tx, rx) = std::sync::mpsc::channel();
        let commands = CommandSender::new(tx);

        let editor = process::Command::new("taskhide-no-such-editor");
        assert!(!edit_then_reload(editor, &commands));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_menu_actions() {
        let ids = MenuIds {
            edit: MenuId::new("edit"),
            reload: MenuId::new("reload"),
            refresh: MenuId::new("refresh"),
            resize: MenuId::new("resize"),
            exit: MenuId::new("exit"),
        };

        assert_eq!(ids.action(&MenuId::new("edit")), Some(Action::Edit));
        assert_eq!(ids.action(&MenuId::new("reload")), Some(Action::Post(Command::Reload)));
        assert_eq!(ids.action(&MenuId::new("refresh")), Some(Action::Post(Command::Refresh)));
        assert_eq!(ids.action(&MenuId::new("resize")), Some(Action::Post(Command::Resize)));
        assert_eq!(ids.action(&MenuId::new("exit")), Some(Action::Exit));
        assert_eq!(ids.action(&MenuId::new("other")), None);
    }
}
