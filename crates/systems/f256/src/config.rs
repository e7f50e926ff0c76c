//! Machine configuration
//!
//! Read from JSON. Every field is optional; missing fields take the stock
//! machine's values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// CPU clock in Hz
pub const CYCLE_RATE: u32 = 6_290_000;
/// Video frames per second
pub const FRAME_RATE: u32 = 70;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which keyboard controller the board carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardKind {
    /// 8042-style handshake controller
    #[default]
    I8042,
    /// Status bit plus data FIFO
    Fifo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub keyboard: KeyboardKind,
    pub cycles_per_frame: u32,
    /// Frame budget multiplier while fast mode is on
    pub fast_multiplier: u32,
    /// Seed for power-on memory contents and the random registers
    pub random_seed: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            keyboard: KeyboardKind::I8042,
            cycles_per_frame: CYCLE_RATE / FRAME_RATE,
            fast_multiplier: 10,
            random_seed: 0,
        }
    }
}

impl MachineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Cycles in one frame, given the fast-mode state
    pub fn frame_budget(&self, fast: bool) -> u64 {
        let base = self.cycles_per_frame.max(1) as u64;
        if fast {
            base * self.fast_multiplier.max(1) as u64
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.keyboard, KeyboardKind::I8042);
        assert_eq!(config.cycles_per_frame, 89_857);
        assert_eq!(config.frame_budget(false), 89_857);
        assert_eq!(config.frame_budget(true), 898_570);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MachineConfig::from_json(r#"{ "keyboard": "fifo" }"#).unwrap();
        assert_eq!(config.keyboard, KeyboardKind::Fifo);
        assert_eq!(config.cycles_per_frame, 89_857);
        assert_eq!(config.fast_multiplier, 10);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(matches!(
            MachineConfig::from_json("{ keyboard"),
            Err(ConfigError::Parse(_))
        ));
        assert!(MachineConfig::from_json(r#"{ "keyboard": "ps2" }"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = MachineConfig::load("/nonexistent/f256.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_zero_budget_is_clamped() {
        let config = MachineConfig {
            cycles_per_frame: 0,
            fast_multiplier: 0,
            ..MachineConfig::default()
        };
        assert_eq!(config.frame_budget(true), 1);
    }
}
