// Configuration validation - rejects anything the scheduler cannot play

use std::collections::HashSet;

use crate::config::types::{RhythmConfiguration, SoundSource};
use crate::error::EngineError;
use crate::sequencer::timing::Meter;

pub const MAX_LAYER_VOLUME: f32 = 1.5;
/// Shortest gap allowed between two events of one layer
pub const MIN_INTERVAL_SECONDS: f64 = 0.001;

/// Checks every bound the scheduler and mixer rely on.
///
/// Runs before any scheduling: a configuration that passes here always yields a
/// strictly positive interval for every layer.
pub fn validate(config: &RhythmConfiguration) -> Result<(), EngineError> {
    if !config.bpm.is_finite() || config.bpm <= 0.0 {
        return Err(EngineError::invalid(format!(
            "bpm must be a positive number, got {}",
            config.bpm
        )));
    }

    if config.beats_per_measure == 0 {
        return Err(EngineError::invalid("beats_per_measure must be > 0"));
    }

    if !config.accent_factor.is_finite() || config.accent_factor < 1.0 {
        return Err(EngineError::invalid(format!(
            "accent_factor must be >= 1.0, got {}",
            config.accent_factor
        )));
    }

    if !config.master_volume.is_finite() || config.master_volume < 0.0 {
        return Err(EngineError::invalid(format!(
            "master_volume must be >= 0.0, got {}",
            config.master_volume
        )));
    }

    let meter = Meter::from_config(config);
    let mut ids = HashSet::new();
    for (channel, layer) in config.layers() {
        if !ids.insert(layer.id) {
            return Err(EngineError::invalid(format!(
                "Duplicate layer id {}",
                layer.id
            )));
        }

        if layer.subdivision == 0 {
            return Err(EngineError::invalid(format!(
                "Layer {} on channel {}: subdivision must be > 0",
                layer.id, channel
            )));
        }

        let interval = meter.interval_seconds(layer.subdivision);
        if !interval.is_finite() || interval < MIN_INTERVAL_SECONDS {
            return Err(EngineError::invalid(format!(
                "Layer {} on channel {}: 1/{} at {} bpm fires every {:e}s, minimum is {}s",
                layer.id, channel, layer.subdivision, config.bpm, interval, MIN_INTERVAL_SECONDS
            )));
        }

        if !layer.volume.is_finite() || !(0.0..=MAX_LAYER_VOLUME).contains(&layer.volume) {
            return Err(EngineError::invalid(format!(
                "Layer {} on channel {}: volume must be between 0 and {}, got {}",
                layer.id, channel, MAX_LAYER_VOLUME, layer.volume
            )));
        }

        if let Some(multiplier) = layer.accent_multiplier {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(EngineError::invalid(format!(
                    "Layer {} on channel {}: accent_multiplier must be >= 1.0, got {}",
                    layer.id, channel, multiplier
                )));
            }
        }

        if let SoundSource::Tone { frequency } = layer.sound_source {
            if !frequency.is_finite() || frequency <= 0.0 {
                return Err(EngineError::invalid(format!(
                    "Layer {} on channel {}: tone frequency must be > 0, got {}",
                    layer.id, channel, frequency
                )));
            }
        }
    }

    Ok(())
}
