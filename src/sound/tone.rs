// Tone source - short sine bursts

use std::f32::consts::TAU;

/// Length of every tone burst
pub const TONE_DURATION_MS: f32 = 50.0;
/// Linear fade at both ends, keeps the burst click-free
pub const TONE_FADE_MS: f32 = 5.0;
const TONE_AMPLITUDE: f32 = 0.8;

/// Generate a fixed-length sine burst with linear fade-in/out
pub fn synthesize_tone(frequency: f32, sample_rate: u32) -> Vec<f32> {
    let sample_rate = sample_rate as f32;
    let num_samples = ((TONE_DURATION_MS / 1000.0) * sample_rate) as usize;
    let fade_samples = (((TONE_FADE_MS / 1000.0) * sample_rate) as usize).max(1);
    let phase_increment = TAU * frequency / sample_rate;

    (0..num_samples)
        .map(|i| {
            let from_end = num_samples - 1 - i;
            let envelope = if i < fade_samples {
                i as f32 / fade_samples as f32
            } else if from_end < fade_samples {
                from_end as f32 / fade_samples as f32
            } else {
                1.0
            };
            (i as f32 * phase_increment).sin() * envelope * TONE_AMPLITUDE
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_length_and_fades() {
        let tone = synthesize_tone(880.0, 44100);

        // 50ms at 44.1kHz
        assert_eq!(tone.len(), 2205);
        assert_eq!(tone[0], 0.0);
        assert!(tone.last().unwrap().abs() < 1e-6);

        let peak = tone.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert!(peak > 0.7 && peak <= TONE_AMPLITUDE);
    }

    #[test]
    fn test_tone_fade_is_gradual() {
        let tone = synthesize_tone(440.0, 48000);
        // First millisecond stays well under full amplitude
        let early_peak = tone[..48].iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert!(early_peak < 0.25);
    }
}
