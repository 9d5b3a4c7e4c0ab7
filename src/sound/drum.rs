// Drum source - procedurally synthesized percussion voices
//
// Each voice is a small additive/noise model with an exponential decay:
// - kick, tom: sine with a downward frequency sweep
// - snare: body tone plus high-passed noise
// - hihat, crash: high-passed noise, short and long decay
// - ride: inharmonic partials ("ping") plus a little noise
//
// Noise comes from a generator seeded per voice, so a voice renders to the same
// buffer on every run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use crate::config::types::DrumVoice;

const PEAK_LEVEL: f32 = 0.9;

/// First-order high-pass filter
struct HighPass {
    coefficient: f32,
    previous_input: f32,
    previous_output: f32,
}

impl HighPass {
    fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let rc = 1.0 / (TAU * cutoff_hz);
        let dt = 1.0 / sample_rate;
        Self {
            coefficient: rc / (rc + dt),
            previous_input: 0.0,
            previous_output: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.coefficient * (self.previous_output + input - self.previous_input);
        self.previous_input = input;
        self.previous_output = output;
        output
    }
}

fn duration_seconds(voice: DrumVoice) -> f32 {
    match voice {
        DrumVoice::Kick => 0.45,
        DrumVoice::Snare => 0.25,
        DrumVoice::Hihat => 0.09,
        DrumVoice::Crash => 1.2,
        DrumVoice::Tom => 0.35,
        DrumVoice::Ride => 0.8,
    }
}

fn noise_seed(voice: DrumVoice) -> u64 {
    0x5EED_0000 + voice as u64
}

/// Render one drum voice at `sample_rate`
pub fn synthesize_drum(voice: DrumVoice, sample_rate: u32) -> Vec<f32> {
    let sr = sample_rate as f32;
    let num_samples = (duration_seconds(voice) * sr) as usize;
    let mut rng = StdRng::seed_from_u64(noise_seed(voice));
    let mut noise = move || rng.gen_range(-1.0f32..1.0);

    let mut samples = match voice {
        DrumVoice::Kick => swept_sine(num_samples, sr, 50.0, 100.0, 30.0, 8.0),
        DrumVoice::Tom => swept_sine(num_samples, sr, 110.0, 110.0, 20.0, 10.0),
        DrumVoice::Snare => {
            let mut filter = HighPass::new(1500.0, sr);
            let mut phase = 0.0f32;
            (0..num_samples)
                .map(|i| {
                    let t = i as f32 / sr;
                    phase += TAU * 185.0 / sr;
                    let body = phase.sin() * (-t * 20.0).exp() * 0.4;
                    let rattle = filter.process(noise()) * (-t * 15.0).exp() * 0.6;
                    body + rattle
                })
                .collect()
        }
        DrumVoice::Hihat => filtered_noise(num_samples, sr, 7000.0, 60.0, &mut noise),
        DrumVoice::Crash => filtered_noise(num_samples, sr, 4000.0, 3.0, &mut noise),
        DrumVoice::Ride => {
            const PARTIALS: [(f32, f32); 4] = [(1.0, 1.0), (2.52, 0.5), (3.97, 0.33), (5.43, 0.25)];
            const FUNDAMENTAL: f32 = 520.0;
            let mut filter = HighPass::new(5000.0, sr);
            (0..num_samples)
                .map(|i| {
                    let t = i as f32 / sr;
                    let ping: f32 = PARTIALS
                        .iter()
                        .map(|(ratio, gain)| (TAU * FUNDAMENTAL * ratio * t).sin() * gain)
                        .sum();
                    let shimmer = filter.process(noise()) * (-t * 20.0).exp() * 0.1;
                    ping * (-t * 4.0).exp() * 0.5 + shimmer
                })
                .collect()
        }
    };

    normalize(&mut samples, PEAK_LEVEL);
    samples
}

/// Sine whose frequency falls from `base + sweep` towards `base`
fn swept_sine(
    num_samples: usize,
    sr: f32,
    base_hz: f32,
    sweep_hz: f32,
    sweep_rate: f32,
    decay_rate: f32,
) -> Vec<f32> {
    let mut phase = 0.0f32;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sr;
            let frequency = base_hz + sweep_hz * (-t * sweep_rate).exp();
            phase += TAU * frequency / sr;
            phase.sin() * (-t * decay_rate).exp()
        })
        .collect()
}

fn filtered_noise(
    num_samples: usize,
    sr: f32,
    cutoff_hz: f32,
    decay_rate: f32,
    noise: &mut impl FnMut() -> f32,
) -> Vec<f32> {
    let mut first = HighPass::new(cutoff_hz, sr);
    let mut second = HighPass::new(cutoff_hz, sr);
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sr;
            second.process(first.process(noise())) * (-t * decay_rate).exp()
        })
        .collect()
}

fn normalize(samples: &mut [f32], target_peak: f32) {
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if peak > 0.0 {
        let gain = target_peak / peak;
        for sample in samples.iter_mut() {
            *sample *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_voices_render() {
        for voice in DrumVoice::ALL {
            let samples = synthesize_drum(voice, 44100);
            let expected = (duration_seconds(voice) * 44100.0) as usize;
            assert_eq!(samples.len(), expected, "{:?}", voice);

            let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
            assert!((peak - PEAK_LEVEL).abs() < 1e-4, "{:?} peak {}", voice, peak);
            assert!(samples.iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn test_voices_decay() {
        for voice in DrumVoice::ALL {
            let samples = synthesize_drum(voice, 44100);
            let tenth = samples.len() / 10;
            let head = samples[..tenth].iter().map(|s| s.abs()).fold(0.0f32, f32::max);
            let tail = samples[samples.len() - tenth..]
                .iter()
                .map(|s| s.abs())
                .fold(0.0f32, f32::max);
            assert!(tail < head, "{:?} does not decay", voice);
        }
    }

    #[test]
    fn test_rendering_is_deterministic() {
        for voice in DrumVoice::ALL {
            assert_eq!(synthesize_drum(voice, 44100), synthesize_drum(voice, 44100));
        }
    }
}
