// Timing - tempo, measure and per-layer interval arithmetic
// Handles conversion between subdivisions, seconds and samples

use std::fmt;

use crate::config::types::RhythmConfiguration;

/// Canonical note denominators, interpreted relative to a quarter-note beat
pub const NOTE_DENOMINATORS: [u32; 7] = [1, 2, 4, 8, 16, 32, 64];

/// Whether `subdivision` is a note denominator (as opposed to a tuplet count)
pub fn is_note_denominator(subdivision: u32) -> bool {
    NOTE_DENOMINATORS.contains(&subdivision)
}

/// Notes per beat for a layer subdivision
///
/// Note denominators are quarter-relative (8 = eighth notes = 2 per beat);
/// every other value is a tuplet count taken as notes per beat directly.
pub fn notes_per_beat(subdivision: u32) -> f64 {
    if is_note_denominator(subdivision) {
        subdivision as f64 / 4.0
    } else {
        subdivision as f64
    }
}

/// Tempo and measure length shared by every layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meter {
    bpm: f64,
    beats_per_measure: u32,
}

impl Meter {
    /// Callers validate the configuration first; non-positive values never get here
    pub fn new(bpm: f64, beats_per_measure: u32) -> Self {
        debug_assert!(bpm > 0.0 && beats_per_measure > 0);
        Self {
            bpm,
            beats_per_measure,
        }
    }

    pub fn from_config(config: &RhythmConfiguration) -> Self {
        Self::new(config.bpm, config.beats_per_measure)
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beats_per_measure(&self) -> u32 {
        self.beats_per_measure
    }

    /// Duration of one beat in seconds
    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one measure in seconds
    pub fn measure_seconds(&self) -> f64 {
        self.beat_seconds() * self.beats_per_measure as f64
    }

    pub fn measure_samples(&self, sample_rate: f64) -> f64 {
        self.measure_seconds() * sample_rate
    }

    /// Seconds between two consecutive events of a layer
    pub fn interval_seconds(&self, subdivision: u32) -> f64 {
        60.0 / (self.bpm * notes_per_beat(subdivision))
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM, {} beats/measure", self.bpm, self.beats_per_measure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_per_beat() {
        assert_eq!(notes_per_beat(4), 1.0);
        assert_eq!(notes_per_beat(8), 2.0);
        assert_eq!(notes_per_beat(16), 4.0);
        assert_eq!(notes_per_beat(1), 0.25);
        assert_eq!(notes_per_beat(3), 3.0);
        assert_eq!(notes_per_beat(5), 5.0);
        assert_eq!(notes_per_beat(7), 7.0);
    }

    #[test]
    fn test_meter_durations() {
        let meter = Meter::new(120.0, 4);
        assert_eq!(meter.beat_seconds(), 0.5);
        assert_eq!(meter.measure_seconds(), 2.0);
        assert_eq!(meter.measure_samples(44100.0), 88200.0);
        assert_eq!(meter.interval_seconds(4), 0.5);
        assert_eq!(meter.interval_seconds(8), 0.25);
        assert!((meter.interval_seconds(3) - 1.0 / 6.0).abs() < 1e-12);
    }
}
