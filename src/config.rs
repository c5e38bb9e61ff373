// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{ConstraintOption, FacingMode, fallback_chain};
use crate::constants::scanner::{
    COMPACT_VIEW_SIZE, DECODE_NOISE_SAMPLE_EVERY, DEFAULT_CONTAINER_ID, DEFAULT_FPS,
    DEFAULT_SCAN_BOX, MIN_SCAN_BOX, SETTLE_DELAY,
};
use crate::constants::clamp_fps;
use crate::errors::{AppError, AppResult};
use crate::scanner::{EngineSettings, LayoutMode, ScanBox};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often each constraint option is retried before moving to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Start attempts per constraint option (at least 1)
    pub attempts_per_option: u32,
    /// Pause between two attempts, in milliseconds
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_option: 1,
            delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.attempts_per_option.max(1)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Scanner widget configuration
///
/// Every field has a default, so a partial JSON file is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Container the decode engine binds to
    pub container_id: String,
    /// Requested decode attempts per second, capped when used
    pub fps: u32,
    /// Side of the square scan region in preview pixels, `None` for the full frame.
    /// Measured against the compact preview; a filled preview scales it along.
    pub scan_box: Option<u32>,
    /// Camera facing tried first
    pub preferred_camera: FacingMode,
    pub layout: LayoutMode,
    /// Explicit constraint fallbacks, derived from `preferred_camera` when unset
    pub fallback: Option<Vec<ConstraintOption>>,
    pub retry: RetryPolicy,
    /// Pause after teardown before a new engine starts, in milliseconds
    pub settle_delay_ms: u64,
    /// Log one in this many decode-noise events
    pub noise_sample_every: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            container_id: DEFAULT_CONTAINER_ID.to_string(),
            fps: DEFAULT_FPS,
            scan_box: Some(DEFAULT_SCAN_BOX),
            preferred_camera: FacingMode::default(),
            layout: LayoutMode::default(),
            fallback: None,
            retry: RetryPolicy::default(),
            settle_delay_ms: SETTLE_DELAY.as_millis() as u64,
            noise_sample_every: DECODE_NOISE_SAMPLE_EVERY,
        }
    }
}

impl ScannerConfig {
    /// Frame rate after applying the device-safe ceiling
    pub fn effective_fps(&self) -> u32 {
        clamp_fps(self.fps)
    }

    /// Scan box raised to the smallest readable size
    pub fn effective_scan_box(&self) -> Option<u32> {
        self.scan_box.map(|side| side.max(MIN_SCAN_BOX))
    }

    /// Constraint options in the order they are tried
    pub fn fallback_options(&self) -> Vec<ConstraintOption> {
        match &self.fallback {
            Some(options) if !options.is_empty() => options.clone(),
            _ => fallback_chain(self.preferred_camera),
        }
    }

    /// Scan region relative to the preview it is drawn on
    pub fn scan_region(&self) -> Option<ScanBox> {
        self.effective_scan_box()
            .map(|side| ScanBox::new(side, COMPACT_VIEW_SIZE))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            fps: self.effective_fps(),
            scan_box: self.scan_region(),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// `<config dir>/camscan/scanner.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("camscan").join("scanner.json"))
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded scanner configuration");
        Ok(config)
    }

    /// Load from `path` (or the default location), falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Self::default(),
        };

        if !path.exists() {
            debug!(path = %path.display(), "No scanner configuration, using defaults");
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Invalid scanner configuration, using defaults");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!(path = %path.display(), "Saved scanner configuration");
        Ok(())
    }

    /// Reject values that cannot be made to work
    pub fn validate(&self) -> AppResult<()> {
        if self.container_id.trim().is_empty() {
            return Err(AppError::Config("container_id must not be empty".into()));
        }
        Ok(())
    }
}
