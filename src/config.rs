use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::TrackerError;

/// Tracker tuning knobs. Defaults match the shipped behavior: one minute of
/// inactivity reads as Idle, five minutes as Away, and the idle reason prompt
/// follows a 15 second countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    pub user_id: String,
    pub idle_threshold_secs: u64,
    pub away_threshold_secs: u64,
    pub countdown_secs: u32,
    pub tick_interval_ms: u64,
    /// Emit a metrics snapshot every N ticks. 1 = every tick.
    pub metrics_every_ticks: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            user_id: "local-user".into(),
            idle_threshold_secs: 60,
            away_threshold_secs: 300,
            countdown_secs: 15,
            tick_interval_ms: 1000,
            metrics_every_ticks: 1,
        }
    }
}

impl TrackerConfig {
    /// Read configuration from a JSON file, falling back to defaults when the
    /// file is absent. Parse failures on an existing file are surfaced rather
    /// than silently replaced.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Threshold ordering is a startup precondition; classification assumes it.
    pub fn validate(&self) -> Result<()> {
        if self.idle_threshold_secs >= self.away_threshold_secs {
            return Err(TrackerError::MisorderedThresholds {
                idle_threshold_secs: self.idle_threshold_secs,
                away_threshold_secs: self.away_threshold_secs,
            }
            .into());
        }
        Ok(())
    }
}
