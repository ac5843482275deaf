//! Logon startup registration through the Task Scheduler
//!
//! The task runs with highest privileges so the taskbar can be hidden over
//! elevated games.

use crate::{ListenerError, Result};
use std::path::Path;
#[cfg(target_os = "windows")]
use std::process::Command;
#[cfg(target_os = "windows")]
use tracing::info;

/// Scheduled task name
pub const TASK_NAME: &str = "Taskhide";

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn create_args(exe: &Path) -> Vec<String> {
    vec![
        "/Create".to_string(),
        "/TN".to_string(),
        TASK_NAME.to_string(),
        "/TR".to_string(),
        format!("\"{}\"", exe.display()),
        "/SC".to_string(),
        "ONLOGON".to_string(),
        "/RL".to_string(),
        "HIGHEST".to_string(),
        "/F".to_string(),
    ]
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn delete_args() -> Vec<String> {
    vec!["/Delete".to_string(), "/TN".to_string(), TASK_NAME.to_string(), "/F".to_string()]
}

#[cfg(target_os = "windows")]
fn schtasks(args: &[String]) -> Result<std::process::Output> {
    Ok(Command::new("schtasks").args(args).output()?)
}

/// Register `exe` to start at logon, replacing an existing registration
#[cfg(target_os = "windows")]
pub fn register(exe: &Path) -> Result<()> {
    let output = schtasks(&create_args(exe))?;
    if !output.status.success() {
        return Err(ListenerError::Startup(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    info!("Registered {} to start at logon", exe.display());
    Ok(())
}

/// Remove the logon registration
#[cfg(target_os = "windows")]
pub fn unregister() -> Result<()> {
    let output = schtasks(&delete_args())?;
    if !output.status.success() {
        return Err(ListenerError::Startup(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    info!("Removed logon registration");
    Ok(())
}

#[cfg(target_os = "windows")]
pub fn is_registered() -> Result<bool> {
    let output = schtasks(&["/Query".to_string(), "/TN".to_string(), TASK_NAME.to_string()])?;
    Ok(output.status.success())
}

#[cfg(not(target_os = "windows"))]
pub fn register(_exe: &Path) -> Result<()> {
    Err(ListenerError::Unsupported)
}

#[cfg(not(target_os = "windows"))]
pub fn unregister() -> Result<()> {
    Err(ListenerError::Unsupported)
}

#[cfg(not(target_os = "windows"))]
pub fn is_registered() -> Result<bool> {
    Err(ListenerError::Unsupported)
}

/// Register the running executable, logging instead of failing
pub fn register_current_exe() {
    let result = std::env::current_exe()
        .map_err(ListenerError::from)
        .and_then(|exe| register(&exe));

    if let Err(e) = result {
        tracing::warn!("Could not register for startup: {}", e);
    }
}
