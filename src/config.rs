//! Configuration loading for Mnemosyne.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.mnemosyne/config.toml`)
//! 3. User config (`~/.mnemosyne/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The per-cycle safety cap is deliberately
//! not configurable; see [`crate::memory::MAX_DROP_PER_CYCLE`].

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{LinkStrength, DEFAULT_DECAY_RATE};
use crate::error::{FailOpen, MnemosyneError, Result};

/// Main configuration struct for Mnemosyne.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Belief memory storage configuration.
    pub memory: MemoryConfig,
    /// Trajectory analysis configuration.
    pub temporal: TemporalConfig,
    /// Semantic contradiction detection configuration.
    pub interpret: InterpretConfig,
}

/// Belief memory storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Storage directory. Defaults to `<mnemosyne_home>/memory`.
    pub storage_dir: Option<PathBuf>,
    /// Decay rate assigned to beliefs created without one.
    pub default_decay_rate: f64,
    /// Number of committed generations kept on disk.
    pub retained_generations: usize,
}

impl MemoryConfig {
    /// Check if a decay rate is valid (finite, in [0, 1]).
    pub fn is_valid_decay_rate(value: f64) -> bool {
        value.is_finite() && (0.0..=1.0).contains(&value)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            default_decay_rate: DEFAULT_DECAY_RATE,
            retained_generations: 2,
        }
    }
}

/// Trajectory analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TemporalConfig {
    /// Lookback window used when none is given.
    pub default_lookback_days: u32,
}

impl TemporalConfig {
    /// Check if a lookback window is valid (1..=3650 days).
    pub fn is_valid_lookback(value: u32) -> bool {
        (1..=3650).contains(&value)
    }
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            default_lookback_days: 30,
        }
    }
}

/// Similarity thresholds and confidence deltas for semantic links.
///
/// A critique scoring above `strong` against an assumption is a STRONG link
/// and subtracts `strong_delta`; likewise for `moderate` and `weak`. Scores
/// at or below `weak` are not linked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterpretConfig {
    pub strong: f64,
    pub moderate: f64,
    pub weak: f64,
    pub strong_delta: f64,
    pub moderate_delta: f64,
    pub weak_delta: f64,
}

impl InterpretConfig {
    /// Classify a similarity score into a link strength and its delta.
    pub fn classify(&self, score: f64) -> Option<(LinkStrength, f64)> {
        if score > self.strong {
            Some((LinkStrength::Strong, self.strong_delta))
        } else if score > self.moderate {
            Some((LinkStrength::Moderate, self.moderate_delta))
        } else if score > self.weak {
            Some((LinkStrength::Weak, self.weak_delta))
        } else {
            None
        }
    }

    /// Thresholds must be ordered and every value must lie in [0, 1].
    pub fn is_valid(&self) -> bool {
        let values = [
            self.strong,
            self.moderate,
            self.weak,
            self.strong_delta,
            self.moderate_delta,
            self.weak_delta,
        ];
        values
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
            && self.weak <= self.moderate
            && self.moderate <= self.strong
    }
}

impl Default for InterpretConfig {
    fn default() -> Self {
        Self {
            strong: 0.6,
            moderate: 0.4,
            weak: 0.25,
            strong_delta: 0.15,
            moderate_delta: 0.08,
            weak_delta: 0.02,
        }
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Project config (`.mnemosyne/config.toml` in cwd or an ancestor)
    /// 3. User config (`~/.mnemosyne/config.toml`)
    /// 4. Defaults
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `~/.mnemosyne/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = mnemosyne_home()?;
        let path = home.join("config.toml");
        if !path.exists() {
            return None;
        }
        Self::load_from_file(&path)
            .map(Some)
            .fail_open_default("loading user config")
    }

    /// Load project config from the nearest `.mnemosyne/config.toml`.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        let path = find_project_dir(cwd)?.join("config.toml");
        if !path.exists() {
            return None;
        }
        Self::load_from_file(&path)
            .map(Some)
            .fail_open_default("loading project config")
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| MnemosyneError::storage(path, e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| MnemosyneError::config(e.to_string()))?;
        if !config.interpret.is_valid() {
            return Err(MnemosyneError::config(format!(
                "{}: [interpret] thresholds must be ordered weak <= moderate <= strong within [0, 1]",
                path.display()
            )));
        }
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // MNEMOSYNE_STORAGE_DIR
        if let Ok(val) = env::var("MNEMOSYNE_STORAGE_DIR") {
            if val.trim().is_empty() {
                tracing::warn!("MNEMOSYNE_STORAGE_DIR is empty, ignoring");
            } else {
                self.memory.storage_dir = Some(PathBuf::from(val));
            }
        }

        // MNEMOSYNE_DECAY_RATE
        if let Ok(val) = env::var("MNEMOSYNE_DECAY_RATE") {
            match val.parse::<f64>() {
                Ok(rate) if MemoryConfig::is_valid_decay_rate(rate) => {
                    self.memory.default_decay_rate = rate;
                }
                _ => {
                    tracing::warn!(
                        value = %val,
                        "invalid MNEMOSYNE_DECAY_RATE (must be within [0, 1]), ignoring"
                    );
                }
            }
        }

        // MNEMOSYNE_LOOKBACK_DAYS
        if let Ok(val) = env::var("MNEMOSYNE_LOOKBACK_DAYS") {
            match val.parse::<u32>() {
                Ok(days) if TemporalConfig::is_valid_lookback(days) => {
                    self.temporal.default_lookback_days = days;
                }
                _ => {
                    tracing::warn!(
                        value = %val,
                        "invalid MNEMOSYNE_LOOKBACK_DAYS (must be 1-3650), ignoring"
                    );
                }
            }
        }
    }

    /// Merge another config into this one.
    ///
    /// Values from `other` take precedence when they differ from defaults.
    /// A lower layer's customization therefore survives a higher layer that
    /// restates the default value.
    fn merge(mut self, other: Config) -> Self {
        let default_memory = MemoryConfig::default();
        if other.memory.storage_dir.is_some() {
            self.memory.storage_dir = other.memory.storage_dir;
        }
        if other.memory.default_decay_rate != default_memory.default_decay_rate {
            self.memory.default_decay_rate = other.memory.default_decay_rate;
        }
        if other.memory.retained_generations != default_memory.retained_generations {
            self.memory.retained_generations = other.memory.retained_generations;
        }

        let default_temporal = TemporalConfig::default();
        if other.temporal.default_lookback_days != default_temporal.default_lookback_days {
            self.temporal.default_lookback_days = other.temporal.default_lookback_days;
        }

        // Thresholds only make sense as a set
        if other.interpret != InterpretConfig::default() {
            self.interpret = other.interpret;
        }

        self
    }

    /// Resolve the storage directory for this configuration.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.memory.storage_dir.clone().or_else(default_storage_dir)
    }
}

/// Get the Mnemosyne home directory.
///
/// Checks `MNEMOSYNE_HOME` first, then falls back to `~/.mnemosyne`.
/// An empty `MNEMOSYNE_HOME` is ignored.
pub fn mnemosyne_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("MNEMOSYNE_HOME") {
        if home.is_empty() {
            tracing::warn!("MNEMOSYNE_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("MNEMOSYNE_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".mnemosyne"));
    }

    let fallback = env::temp_dir().join("mnemosyne");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback.display()
    );
    Some(fallback)
}

/// Default belief memory directory: `<mnemosyne_home>/memory/`.
pub fn default_storage_dir() -> Option<PathBuf> {
    mnemosyne_home().map(|h| h.join("memory"))
}

/// Find the nearest `.mnemosyne/` directory at or above `cwd`.
pub fn find_project_dir(cwd: &Path) -> Option<PathBuf> {
    cwd.ancestors()
        .map(|ancestor| ancestor.join(".mnemosyne"))
        .find(|candidate| candidate.is_dir())
}
