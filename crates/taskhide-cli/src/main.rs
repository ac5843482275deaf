//! Taskhide CLI
//!
//! Manage the target list, check names against it, and control the taskbar
//! by hand (useful after a crash left it hidden).

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use taskhide_core::registry::{normalize_name, ALT_POSITION_MARKER, AUTO_HIDE_MARKER};
use taskhide_core::{FileSource, Settings, TargetConfig, TargetEntry, TargetRegistry};
use taskhide_listener::{startup, Desktop};
use tabled::{settings::Style, Table, Tabled};

#[derive(Parser)]
#[command(name = "taskhide")]
#[command(about = "Hide the taskbar while a listed game is in the foreground")]
#[command(version)]
struct Cli {
    /// Target list file (overrides TASKHIDE_TARGETS)
    #[arg(long, global = true)]
    targets: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured targets
    Targets {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a process name is a target
    Check {
        /// Process name, with or without .exe
        name: String,
    },

    /// Add a target
    Add {
        /// Process name, with or without .exe
        name: String,

        /// Use the alternate placement preset on resize
        #[arg(long)]
        alt_position: bool,

        /// Turn on taskbar auto-hide while this target runs
        #[arg(long)]
        auto_hide: bool,
    },

    /// Remove a target
    Remove {
        /// Process name, with or without .exe
        name: String,
    },

    /// Print the target list location
    Path,

    /// Show the taskbar and turn auto-hide off
    Show,

    /// Hide the taskbar
    Hide,

    /// Manage startup at logon
    Autostart {
        #[command(subcommand)]
        action: AutostartAction,
    },

    /// Show daemon, startup and taskbar status
    Status,
}

#[derive(Subcommand)]
enum AutostartAction {
    /// Start the tray app at logon
    Enable {
        /// Executable to register (defaults to taskhide-tray next to this binary)
        #[arg(long)]
        exe: Option<PathBuf>,
    },
    /// Stop starting at logon
    Disable,
}

#[derive(Tabled)]
struct TargetRow {
    #[tabled(rename = "Process")]
    name: String,
    #[tabled(rename = "Alt Position")]
    alt_position: String,
    #[tabled(rename = "Auto-Hide")]
    auto_hide: String,
}

impl From<&TargetEntry> for TargetRow {
    fn from(entry: &TargetEntry) -> Self {
        Self {
            name: entry.name.clone(),
            alt_position: yes_no(entry.config.alt_position),
            auto_hide: yes_no(entry.config.auto_hide),
        }
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn yes_no(flag: bool) -> String {
    let label = if flag { "yes" } else { "-" };
    label.to_string()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskhide=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(path) = cli.targets {
        settings.targets_path = path;
    }
    let source = FileSource::new(&settings.targets_path);

    match cli.command {
        Commands::Targets { json } => list_targets(&source, json),
        Commands::Check { name } => check_target(&source, &name),
        Commands::Add {
            name,
            alt_position,
            auto_hide,
        } => add_target(&source, &name, TargetConfig { alt_position, auto_hide }),
        Commands::Remove { name } => remove_target(&source, &name),
        Commands::Path => {
            println!("{}", source.path().display());
            Ok(())
        }
        Commands::Show => set_taskbar(true),
        Commands::Hide => set_taskbar(false),
        Commands::Autostart { action } => autostart(action),
        Commands::Status => show_status(&source),
    }
}

fn list_targets(source: &FileSource, json: bool) -> Result<()> {
    let registry = TargetRegistry::load(source)?;
    let entries = registry.entries();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("\n{}", "No targets configured.".yellow());
        println!("Add one with: taskhide add <process.exe>");
        return Ok(());
    }

    println!("\n{}", format!("Targets ({})", source.path().display()).bold().cyan());
    println!("{}", "─".repeat(50));

    let rows: Vec<TargetRow> = entries.into_iter().map(TargetRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    Ok(())
}

fn check_target(source: &FileSource, name: &str) -> Result<()> {
    let registry = TargetRegistry::load(source)?;

    match registry.lookup(name) {
        Some(entry) => {
            println!("{} {}", "✓".green(), format!("{} is a target", entry.name).green());
            println!("  alt position: {}", yes_no(entry.config.alt_position));
            println!("  auto-hide:    {}", yes_no(entry.config.auto_hide));
        }
        None => println!("{}", format!("✗ {} is not a target", name).red()),
    }

    Ok(())
}

fn add_target(source: &FileSource, name: &str, config: TargetConfig) -> Result<()> {
    let name = name.trim();
    if name.contains(ALT_POSITION_MARKER) || name.contains(AUTO_HIDE_MARKER) {
        return Err(anyhow!(
            "process name must not contain {} or {}; use --alt-position and --auto-hide",
            ALT_POSITION_MARKER,
            AUTO_HIDE_MARKER
        ));
    }
    if normalize_name(name).is_empty() {
        return Err(anyhow!("process name must not be empty"));
    }

    let registry = TargetRegistry::load(source)?;
    if let Some(existing) = registry.lookup(name) {
        if existing.config == config {
            println!("{}", format!("{} is already a target", existing.name).yellow());
            return Ok(());
        }
        // Replace rather than append a second record for the same name
        source.remove(name)?;
    }

    source.append(name, config)?;
    println!("{} {}", "✓".green(), format!("Added {}", name).green());
    println!("Use \"Reload Targets\" in the tray to apply it to a running instance.");
    Ok(())
}

fn remove_target(source: &FileSource, name: &str) -> Result<()> {
    match source.remove(name)? {
        0 => println!("{}", format!("{} is not a target", name).yellow()),
        n => println!("{} {}", "✓".green(), format!("Removed {} ({} record(s))", name, n).green()),
    }
    Ok(())
}

fn set_taskbar(visible: bool) -> Result<()> {
    let mut shell = Desktop::native().shell;

    shell.set_visible(visible)?;
    if visible {
        shell.set_auto_hide(false)?;
        println!("{}", "✓ Taskbar shown".green());
    } else {
        println!("{}", "✓ Taskbar hidden".green());
    }

    Ok(())
}

fn autostart(action: AutostartAction) -> Result<()> {
    match action {
        AutostartAction::Enable { exe } => {
            let exe = match exe {
                Some(exe) => exe,
                None => default_tray_exe()?,
            };
            startup::register(&exe)?;
            println!("{} {}", "✓".green(), format!("{} will start at logon", exe.display()).green());
        }
        AutostartAction::Disable => {
            startup::unregister()?;
            println!("{}", "✓ Startup at logon disabled".green());
        }
    }
    Ok(())
}

fn default_tray_exe() -> Result<PathBuf> {
    let current = std::env::current_exe()?;
    let dir = current
        .parent()
        .ok_or_else(|| anyhow!("cannot locate the directory of {}", current.display()))?;
    Ok(dir.join(format!("taskhide-tray{}", std::env::consts::EXE_SUFFIX)))
}

fn show_status(source: &FileSource) -> Result<()> {
    let mut rows = vec![
        StatusRow {
            item: "Tray app".to_string(),
            status: running_label("taskhide-tray"),
        },
        StatusRow {
            item: "Daemon".to_string(),
            status: running_label("taskhide-daemon"),
        },
    ];

    rows.push(StatusRow {
        item: "Start at logon".to_string(),
        status: match startup::is_registered() {
            Ok(true) => "enabled".to_string(),
            Ok(false) => "disabled".to_string(),
            Err(e) => format!("unknown ({})", e),
        },
    });

    rows.push(StatusRow {
        item: "Targets".to_string(),
        status: match TargetRegistry::load(source) {
            Ok(registry) => format!("{} in {}", registry.len(), source.path().display()),
            Err(e) => format!("unreadable ({})", e),
        },
    });

    rows.push(StatusRow {
        item: "Taskbar auto-hide".to_string(),
        status: match Desktop::native().shell.auto_hide() {
            Ok(true) => "on".to_string(),
            Ok(false) => "off".to_string(),
            Err(e) => format!("unknown ({})", e),
        },
    });

    println!("\n{}", "Taskhide Status".bold().cyan());
    println!("{}", "─".repeat(40));
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    Ok(())
}

fn running_label(binary: &str) -> String {
    if is_running(binary) {
        "running".green().to_string()
    } else {
        "not running".red().to_string()
    }
}

#[cfg(unix)]
fn is_running(binary: &str) -> bool {
    use std::process::Command;

    Command::new("pgrep")
        .args(["-f", binary])
        .output()
        .map(|out| !out.stdout.is_empty())
        .unwrap_or(false)
}

#[cfg(windows)]
fn is_running(binary: &str) -> bool {
    use std::process::Command;

    let image = format!("{}.exe", binary);
    Command::new("tasklist")
        .args(["/FI", &format!("IMAGENAME eq {}", image)])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&image))
        .unwrap_or(false)
}
