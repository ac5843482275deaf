//! Runtime settings
//!
//! Defaults come from the platform directories; the `TASKHIDE_*` environment
//! variables override them, and the binaries layer their CLI flags on top.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const ENV_TARGETS: &str = "TASKHIDE_TARGETS";
pub const ENV_STRATEGY: &str = "TASKHIDE_STRATEGY";
pub const ENV_POLL_MS: &str = "TASKHIDE_POLL_MS";

/// Default poll interval for the fallback focus source
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How foreground changes are observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusStrategy {
    /// OS foreground-change notification (preferred)
    #[default]
    Hook,
    /// Fixed-interval foreground probing
    Poll,
}

impl FromStr for FocusStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hook" | "event" => Ok(FocusStrategy::Hook),
            "poll" | "polling" => Ok(FocusStrategy::Poll),
            other => Err(format!("unknown focus strategy: {}", other)),
        }
    }
}

/// Window geometry: offset plus size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Placement {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

/// The two fixed placement presets, selected by `TargetConfig::alt_position`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPresets {
    pub default: Placement,
    pub alternate: Placement,
}

impl PlacementPresets {
    pub fn select(&self, alt_position: bool) -> Placement {
        if alt_position {
            self.alternate
        } else {
            self.default
        }
    }
}

impl Default for PlacementPresets {
    fn default() -> Self {
        Self {
            default: Placement::new(1280, 0, 2560, 1440),
            // Compensates for the invisible resize border of borderless-windowed games
            alternate: Placement::new(1272, -31, 2576, 1478),
        }
    }
}

/// Settings shared by the daemon and the tray app
#[derive(Debug, Clone)]
pub struct Settings {
    pub targets_path: PathBuf,
    pub strategy: FocusStrategy,
    pub poll_interval: Duration,
    pub presets: PlacementPresets,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            targets_path: crate::targets_path(),
            strategy: FocusStrategy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            presets: PlacementPresets::default(),
        }
    }
}

impl Settings {
    /// Defaults with `TASKHIDE_*` environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_TARGETS).filter(|p| !p.trim().is_empty()) {
            self.targets_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_STRATEGY) {
            match raw.parse() {
                Ok(strategy) => self.strategy = strategy,
                Err(e) => warn!("Ignoring {}: {}", ENV_STRATEGY, e),
            }
        }

        if let Some(raw) = lookup(ENV_POLL_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.poll_interval = Duration::from_millis(ms),
                _ => warn!("Ignoring {}: expected a positive integer, got {:?}", ENV_POLL_MS, raw),
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("hook".parse::<FocusStrategy>(), Ok(FocusStrategy::Hook));
        assert_eq!(" Poll ".parse::<FocusStrategy>(), Ok(FocusStrategy::Poll));
        assert!("timer".parse::<FocusStrategy>().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_TARGETS, "/tmp/games.txt"),
            (ENV_STRATEGY, "poll"),
            (ENV_POLL_MS, "250"),
        ]
        .into_iter()
        .collect();

        let settings = Settings::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.targets_path, PathBuf::from("/tmp/games.txt"));
        assert_eq!(settings.strategy, FocusStrategy::Poll);
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_bad_overrides_keep_defaults() {
        let settings = Settings::default().with_overrides(|k| match k {
            ENV_STRATEGY => Some("sometimes".to_string()),
            ENV_POLL_MS => Some("0".to_string()),
            _ => None,
        });

        assert_eq!(settings.strategy, FocusStrategy::Hook);
        assert_eq!(settings.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_preset_selection() {
        let presets = PlacementPresets::default();
        assert_eq!(presets.select(false), Placement::new(1280, 0, 2560, 1440));
        assert_eq!(presets.select(true), Placement::new(1272, -31, 2576, 1478));
    }
}
