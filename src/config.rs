//! Engine configuration, read from a TOML file.
//!
//! Every field has a default so a partial (or missing) file is fine:
//!
//! ```toml
//! [frame]
//! target_frame_rate = 12
//!
//! [tiles]
//! repaint_capacity = 16
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub frame: FrameConfig,
    pub tiles: TileConfig,
    pub display: DisplayConfig,
    pub log: LogConfig,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.tiles.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

// ── Frame scheduling ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub target_frame_rate: u32,
    /// Run updates in fixed `1 / target_frame_rate` steps.
    pub fixed_frame_rate: bool,
    /// Upper bound on accumulated lag, in whole update intervals.
    pub max_catch_up_frames: u32,
    /// Sleep off whatever is left of a frame period in `run_until`.
    pub pace_frames: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            target_frame_rate: 30,
            fixed_frame_rate: true,
            max_catch_up_frames: 3,
            pace_frames: true,
        }
    }
}

impl FrameConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_frame_rate.max(1)
    }

    pub fn max_update_time(&self) -> Duration {
        self.update_interval() * self.max_catch_up_frames.max(1)
    }
}

// ── Tiles ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Tile edge length as a power of two (3 → 8 pixels).
    pub size_shift: u32,
    /// Dirty tiles queued per frame before further entries are dropped.
    pub repaint_capacity: usize,
}

impl Default for TileConfig {
    fn default() -> Self {
        TileConfig {
            size_shift: 3,
            repaint_capacity: 10,
        }
    }
}

impl TileConfig {
    pub fn tile_size(&self) -> i32 {
        1 << self.size_shift
    }

    pub fn validate(&self) -> Result<()> {
        if (1..=7).contains(&self.size_shift) {
            Ok(())
        } else {
            Err(EngineError::InvalidTileSize(self.size_shift))
        }
    }
}

// ── Display & logging ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 160,
            height: 128,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
    pub file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "info".to_string(),
            file: "arcade_engine.log".to_string(),
        }
    }
}
