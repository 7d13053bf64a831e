//! Configuration file support for Stride.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/stride/config.toml`.

use crate::engine::EngineConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub program: ProgramConfig,

    #[serde(default)]
    pub workout: WorkoutConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Program asset configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ProgramConfig {
    /// Optional override for the bundled program asset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Workout timing configuration
///
/// Defaults match the engine; overriding is mainly useful for debugging.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutConfig {
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u32,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: default_countdown_seconds(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        PathBuf::from(home).join(".local/share")
    });
    base.join("stride")
}

fn default_countdown_seconds() -> u32 {
    5
}

fn default_tick_interval_ms() -> u64 {
    100
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".config")
        });
        base.join("stride").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Engine timing parameters derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            countdown_seconds: self.workout.countdown_seconds,
            tick_interval: Duration::from_millis(self.workout.tick_interval_ms.max(10)),
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.workout.countdown_seconds, 5);
        assert_eq!(config.workout.tick_interval_ms, 100);
        assert!(config.program.file.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.workout.countdown_seconds,
            parsed.workout.countdown_seconds
        );
        assert_eq!(config.data.data_dir, parsed.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[workout]
countdown_seconds = 3
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.workout.countdown_seconds, 3);
        assert_eq!(config.workout.tick_interval_ms, 100); // default
    }

    #[test]
    fn test_engine_config_conversion() {
        let mut config = Config::default();
        config.workout.countdown_seconds = 3;
        config.workout.tick_interval_ms = 250;

        let engine = config.engine_config();
        assert_eq!(engine.countdown_seconds, 3);
        assert_eq!(engine.tick_interval, Duration::from_millis(250));
    }
}
