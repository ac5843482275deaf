//! Windows implementation: WinEvent foreground hook, Win32 process queries,
//! `Shell_TrayWnd` visibility and app-bar auto-hide.

mod hook;
mod process;
mod shell;

pub use hook::{Win32Probe, WinEventSource};
pub use process::Win32Processes;
pub use shell::{Win32Placer, Win32Shell};
