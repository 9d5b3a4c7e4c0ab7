// Playback clock - sample position shared between the audio context and the control thread

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Frames rendered since playback started.
///
/// Only the audio context advances it; the control thread reads it to report
/// the position and to anchor live updates.
#[derive(Clone)]
pub struct PlaybackClock {
    sample_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl PlaybackClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Acquire)
    }

    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Release);
    }

    pub fn reset(&self) {
        self.sample_position.store(0, Ordering::Release);
    }

    pub fn position_seconds(&self) -> f64 {
        self.current_sample() as f64 / self.sample_rate
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
