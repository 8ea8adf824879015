//! Runtime configuration: tick pacing, feed preview size and the game rules.
use std::time::Duration;

use questline_game::{ConfigError, GameCfg};
use serde::{Deserialize, Serialize};

const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_PREVIEW_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCfg {
    #[serde(default = "EngineCfg::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Most recent events returned with each replay pass.
    #[serde(default = "EngineCfg::default_preview_len")]
    pub preview_len: usize,
    #[serde(flatten)]
    pub game: GameCfg,
}

impl EngineCfg {
    const fn default_tick_interval_ms() -> u64 {
        DEFAULT_TICK_INTERVAL_MS
    }

    const fn default_preview_len() -> usize {
        DEFAULT_PREVIEW_LEN
    }

    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON, otherwise the first
    /// validation failure.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when the tick interval is outside 10ms..=60s,
    /// the preview is empty, or any game section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=60_000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::RangeViolation {
                field: "tick_interval_ms",
                min: 10,
                max: 60_000,
                value: self.tick_interval_ms,
            });
        }
        if self.preview_len == 0 {
            return Err(ConfigError::MinViolation {
                field: "preview_len",
                min: 1,
                value: 0,
            });
        }
        self.game.validate()
    }
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            tick_interval_ms: Self::default_tick_interval_ms(),
            preview_len: Self::default_preview_len(),
            game: GameCfg::default(),
        }
    }
}
