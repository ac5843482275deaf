//! Target registry: which processes hide the taskbar
//!
//! The target list is plain text, one process name per line. Two markers may
//! decorate a line, in any order: `**` selects the alternate window placement
//! and `&&` enables shell auto-hide while the target is tracked.

use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ALT_POSITION_MARKER: &str = "**";
pub const AUTO_HIDE_MARKER: &str = "&&";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read target list {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write target list {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Per-target flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TargetConfig {
    pub alt_position: bool,
    pub auto_hide: bool,
}

/// A parsed target record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetEntry {
    /// Name as written in the target list, markers removed
    pub name: String,
    pub config: TargetConfig,
}

/// Normalize a process name into a registry key.
///
/// Lookups are case-insensitive and ignore a trailing `.exe`, so `Game`,
/// `game.exe` and `GAME.EXE` all resolve to the same record.
pub fn normalize_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => lower,
    }
}

/// Parse one line of the target list. Returns `None` for blank or malformed lines.
pub fn parse_record(line: &str) -> Option<TargetEntry> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let config = TargetConfig {
        alt_position: trimmed.contains(ALT_POSITION_MARKER),
        auto_hide: trimmed.contains(AUTO_HIDE_MARKER),
    };

    let name = trimmed
        .replace(ALT_POSITION_MARKER, "")
        .replace(AUTO_HIDE_MARKER, "")
        .trim()
        .to_string();

    if name.is_empty() {
        return None;
    }

    Some(TargetEntry { name, config })
}

/// Render a record the way `parse_record` reads it back
pub fn format_record(name: &str, config: TargetConfig) -> String {
    let mut line = name.trim().to_string();
    if config.alt_position {
        line.push_str(ALT_POSITION_MARKER);
    }
    if config.auto_hide {
        line.push_str(AUTO_HIDE_MARKER);
    }
    line
}

/// Where the target list text comes from
pub trait TargetSource: Send + Sync {
    /// Read the full text of the target list
    fn read(&self) -> Result<String>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}

/// Target list backed by a file; the file is created empty if missing
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file (and its parent directory) if it does not exist yet
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }

        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&self.path, "").map_err(write_err)?;
        info!("Created empty target list at {:?}", self.path);
        Ok(())
    }

    /// Append a record to the file
    pub fn append(&self, name: &str, config: TargetConfig) -> Result<()> {
        self.ensure_exists()?;
        let mut text = self.read()?;
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format_record(name, config));
        text.push('\n');
        self.write(&text)
    }

    /// Remove every record whose name matches `name`. Returns how many were removed.
    pub fn remove(&self, name: &str) -> Result<usize> {
        let key = normalize_name(name);
        let text = self.read()?;

        let mut removed = 0;
        let kept: Vec<&str> = text
            .lines()
            .filter(|line| match parse_record(line) {
                Some(entry) if normalize_name(&entry.name) == key => {
                    removed += 1;
                    false
                }
                _ => true,
            })
            .collect();

        if removed > 0 {
            let mut out = kept.join("\n");
            if !out.is_empty() {
                out.push('\n');
            }
            self.write(&out)?;
        }

        Ok(removed)
    }

    fn write(&self, text: &str) -> Result<()> {
        fs::write(&self.path, text).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl TargetSource for FileSource {
    fn read(&self) -> Result<String> {
        self.ensure_exists()?;
        fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory target list
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    text: Arc<RwLock<String>>,
}

impl StaticSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::new(RwLock::new(text.into())),
        }
    }

    /// Replace the text; visible on the next reload
    pub fn set(&self, text: impl Into<String>) {
        if let Ok(mut guard) = self.text.write() {
            *guard = text.into();
        }
    }
}

impl TargetSource for StaticSource {
    fn read(&self) -> Result<String> {
        Ok(self.text.read().map(|t| t.clone()).unwrap_or_default())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

/// Immutable snapshot of the target list
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    entries: HashMap<String, TargetEntry>,
}

impl TargetRegistry {
    /// Parse target list text. Never fails: blank and malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();

        for (index, line) in text.lines().enumerate() {
            match parse_record(line) {
                Some(entry) => {
                    entries.insert(normalize_name(&entry.name), entry);
                }
                None if !line.trim().is_empty() => {
                    debug!("Skipping malformed target record on line {}: {:?}", index + 1, line);
                }
                None => {}
            }
        }

        Self { entries }
    }

    /// Read and parse a source
    pub fn load(source: &dyn TargetSource) -> Result<Self> {
        let text = source.read()?;
        Ok(Self::parse(&text))
    }

    /// Case-insensitive lookup by process name
    pub fn lookup(&self, name: &str) -> Option<&TargetEntry> {
        self.entries.get(&normalize_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by name
    pub fn entries(&self) -> Vec<&TargetEntry> {
        let mut entries: Vec<&TargetEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.name.to_lowercase());
        entries
    }
}

/// The active registry plus the source it is reloaded from.
///
/// Readers take an `Arc` snapshot; `reload` swaps the whole snapshot in one
/// step, so a reader never sees a half-built map.
pub struct SharedRegistry {
    source: Box<dyn TargetSource>,
    current: RwLock<Arc<TargetRegistry>>,
}

impl SharedRegistry {
    /// Load the initial snapshot from `source`
    pub fn load(source: Box<dyn TargetSource>) -> Result<Self> {
        let registry = TargetRegistry::load(source.as_ref())?;
        info!("Loaded {} targets from {}", registry.len(), source.describe());
        Ok(Self {
            source,
            current: RwLock::new(Arc::new(registry)),
        })
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<TargetRegistry> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Re-read the source and swap in a new snapshot.
    ///
    /// On a read failure the previous snapshot stays active.
    pub fn reload(&self) -> Result<Arc<TargetRegistry>> {
        let registry = match TargetRegistry::load(self.source.as_ref()) {
            Ok(registry) => Arc::new(registry),
            Err(e) => {
                warn!("Keeping previous target list: {}", e);
                return Err(e);
            }
        };

        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&registry),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&registry),
        }

        info!("Reloaded {} targets from {}", registry.len(), self.source.describe());
        Ok(registry)
    }
}

impl std::fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("source", &self.source.describe())
            .field("targets", &self.snapshot().len())
            .finish()
    }
}
