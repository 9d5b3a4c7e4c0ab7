// Engine settings - everything about how to play, as opposed to what to play

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EngineError;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Tunables for the engine and its backends.
///
/// Every field has a default so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Fixed engine sample rate; file sources are resampled to it
    pub sample_rate: u32,
    /// Requested hardware buffer / polling frame size in frames
    pub block_frames: usize,
    /// Upper bound on simultaneously sounding instances
    pub max_instances: usize,
    pub trigger_queue_capacity: usize,
    pub notification_queue_capacity: usize,
    pub command_queue_capacity: usize,
    /// When set, the streaming backend renders on its own thread into a ring
    /// buffer of this many frames and the hardware callback only copies
    pub ring_buffer_frames: Option<usize>,
    /// Directory searched for `<name>_accent.*` / `<name>_normal.*` tick pairs
    pub tick_directory: PathBuf,
    /// Distance to a measure boundary, in samples, still counted as an accent
    pub accent_tolerance_samples: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_frames: 256,
            max_instances: 256,
            trigger_queue_capacity: 1024,
            notification_queue_capacity: 64,
            command_queue_capacity: 16,
            ring_buffer_frames: None,
            tick_directory: default_tick_directory(),
            accent_tolerance_samples: 2.0,
        }
    }
}

fn default_tick_directory() -> PathBuf {
    let local = PathBuf::from("ticks");
    if local.is_dir() {
        return local;
    }
    dirs::data_dir()
        .map(|dir| dir.join("polyclick").join("ticks"))
        .unwrap_or(local)
}

impl EngineSettings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EngineError::ConfigIo(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let settings: Self =
            serde_json::from_str(&json).map_err(|e| EngineError::ConfigFormat(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sample_rate < 8000 || self.sample_rate > 192_000 {
            return Err(EngineError::invalid(format!(
                "sample_rate must be between 8000 and 192000 Hz, got {}",
                self.sample_rate
            )));
        }
        if self.block_frames == 0 || self.block_frames > 8192 {
            return Err(EngineError::invalid("block_frames must be between 1 and 8192"));
        }
        if self.max_instances == 0 {
            return Err(EngineError::invalid("max_instances must be > 0"));
        }
        if self.trigger_queue_capacity == 0
            || self.notification_queue_capacity == 0
            || self.command_queue_capacity == 0
        {
            return Err(EngineError::invalid("queue capacities must be > 0"));
        }
        if let Some(frames) = self.ring_buffer_frames {
            if frames < self.block_frames * 2 {
                return Err(EngineError::invalid(
                    "ring_buffer_frames must hold at least two blocks",
                ));
            }
        }
        if !self.accent_tolerance_samples.is_finite() || self.accent_tolerance_samples < 0.0 {
            return Err(EngineError::invalid("accent_tolerance_samples must be >= 0"));
        }
        Ok(())
    }
}
