// Mixer - sums every sounding instance into planar bus buffers
//
// All storage is allocated up front: the instance pool never grows past
// `max_instances` and the bus buffers hold one maximum-size block each.

use wide::f32x4;

use crate::audio::dsp_utils::soft_clip_slice;
use crate::sound::cache::SampleBuffer;

/// One triggered sound, alive until its buffer is exhausted
#[derive(Debug, Clone)]
pub struct SoundInstance {
    buffer: SampleBuffer,
    cursor: usize,
    amplitude: f32,
    channel: usize,
    /// Frames to wait inside the current block before the first sample
    start_offset: usize,
}

impl SoundInstance {
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }
}

/// `dst[i] += src[i] * gain`, four lanes at a time
#[inline]
fn add_scaled(dst: &mut [f32], src: &[f32], gain: f32) {
    let gain_simd = f32x4::from([gain; 4]);
    let mut dst_chunks = dst.chunks_exact_mut(4);
    let mut src_chunks = src.chunks_exact(4);

    for (d, s) in (&mut dst_chunks).zip(&mut src_chunks) {
        let acc = f32x4::from([d[0], d[1], d[2], d[3]]);
        let input = f32x4::from([s[0], s[1], s[2], s[3]]);
        let out: [f32; 4] = (acc + input * gain_simd).into();
        d.copy_from_slice(&out);
    }

    for (d, s) in dst_chunks
        .into_remainder()
        .iter_mut()
        .zip(src_chunks.remainder())
    {
        *d += s * gain;
    }
}

pub struct Mixer {
    instances: Vec<SoundInstance>,
    max_instances: usize,
    buses: Vec<Vec<f32>>,
    max_block: usize,
    /// Frames produced by the last `mix`
    frames: usize,
    stolen: u64,
    dropped: u64,
}

impl Mixer {
    pub fn new(bus_count: usize, max_instances: usize, max_block: usize) -> Self {
        let max_instances = max_instances.max(1);
        let max_block = max_block.max(1);
        Self {
            instances: Vec::with_capacity(max_instances),
            max_instances,
            buses: vec![vec![0.0; max_block]; bus_count.max(1)],
            max_block,
            frames: 0,
            stolen: 0,
            dropped: 0,
        }
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    pub fn max_block(&self) -> usize {
        self.max_block
    }

    pub fn active_count(&self) -> usize {
        self.instances.len()
    }

    pub fn instances(&self) -> &[SoundInstance] {
        &self.instances
    }

    /// Instances replaced because the pool was full
    pub fn stolen_count(&self) -> u64 {
        self.stolen
    }

    /// Instances dropped because their data was not finite
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Start a new instance `start_offset` frames into the next mixed block.
    ///
    /// Returns false when the instance cannot sound at all (unknown bus, empty
    /// buffer, non-finite amplitude). When the pool is full the instance with the
    /// least audio left is replaced.
    pub fn trigger(
        &mut self,
        buffer: &SampleBuffer,
        amplitude: f32,
        channel: usize,
        start_offset: usize,
    ) -> bool {
        if channel >= self.buses.len() || buffer.is_empty() || !amplitude.is_finite() {
            return false;
        }

        let instance = SoundInstance {
            buffer: buffer.clone(),
            cursor: 0,
            amplitude,
            channel,
            start_offset,
        };

        if self.instances.len() < self.max_instances {
            self.instances.push(instance);
        } else if let Some(victim) = self
            .instances
            .iter_mut()
            .min_by_key(|existing| existing.remaining())
        {
            *victim = instance;
            self.stolen += 1;
        }
        true
    }

    /// Mix `frames` frames of every live instance, then soft clip each bus
    pub fn mix(&mut self, frames: usize) {
        let frames = frames.min(self.max_block);
        for bus in self.buses.iter_mut() {
            bus[..frames].fill(0.0);
        }

        let buses = &mut self.buses;
        let mut dropped = 0u64;

        self.instances.retain_mut(|instance| {
            if instance.start_offset >= frames {
                instance.start_offset -= frames;
                return true;
            }

            let offset = instance.start_offset;
            let count = instance.remaining().min(frames - offset);
            let source = &instance.buffer[instance.cursor..instance.cursor + count];

            if !source.iter().all(|sample| sample.is_finite()) {
                dropped += 1;
                return false;
            }

            add_scaled(
                &mut buses[instance.channel][offset..offset + count],
                source,
                instance.amplitude,
            );

            instance.cursor += count;
            instance.start_offset = 0;
            instance.remaining() > 0
        });

        for bus in self.buses.iter_mut() {
            soft_clip_slice(&mut bus[..frames]);
        }

        self.dropped += dropped;
        self.frames = frames;
    }

    /// Output of the last `mix` for one bus
    pub fn bus(&self, index: usize) -> &[f32] {
        &self.buses[index][..self.frames]
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Write the last mixed block as bus-interleaved frames
    pub fn interleave_into(&self, output: &mut [f32]) {
        let bus_count = self.buses.len();
        for (frame_index, frame) in output
            .chunks_exact_mut(bus_count)
            .take(self.frames)
            .enumerate()
        {
            for (sample, bus) in frame.iter_mut().zip(&self.buses) {
                *sample = bus[frame_index];
            }
        }
    }

    /// Release every instance
    pub fn clear(&mut self) {
        self.instances.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn constant(value: f32, len: usize) -> SampleBuffer {
        Arc::from(vec![value; len])
    }

    #[test]
    fn test_add_scaled_matches_scalar() {
        let src: Vec<f32> = (0..11).map(|i| i as f32 * 0.1).collect();
        let mut dst = vec![1.0f32; 11];
        add_scaled(&mut dst, &src, 0.5);
        for (i, value) in dst.iter().enumerate() {
            assert!((value - (1.0 + i as f32 * 0.05)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_instance_plays_then_expires() {
        let mut mixer = Mixer::new(2, 8, 64);
        assert!(mixer.trigger(&constant(0.25, 100), 1.0, 1, 0));

        mixer.mix(64);
        assert_eq!(mixer.active_count(), 1);
        assert!(mixer.bus(0).iter().all(|&s| s == 0.0));
        assert!(mixer.bus(1).iter().all(|&s| (s - 0.25f32.tanh()).abs() < 1e-6));

        mixer.mix(64);
        assert_eq!(mixer.active_count(), 0);
        assert!(mixer.bus(1)[..36].iter().all(|&s| s > 0.0));
        assert!(mixer.bus(1)[36..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_start_offset_is_sample_accurate() {
        let mut mixer = Mixer::new(1, 8, 32);
        mixer.trigger(&constant(0.5, 4), 1.0, 0, 10);
        mixer.mix(32);

        let bus = mixer.bus(0);
        assert!(bus[..10].iter().all(|&s| s == 0.0));
        assert!(bus[10..14].iter().all(|&s| s > 0.0));
        assert!(bus[14..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_overlapping_instances_are_summed_and_clipped() {
        let mut mixer = Mixer::new(1, 16, 16);
        for _ in 0..10 {
            mixer.trigger(&constant(0.9, 16), 1.4, 0, 0);
        }
        mixer.mix(16);
        for &sample in mixer.bus(0) {
            assert!(sample <= 1.0);
            assert!(sample > 0.99);
        }
    }

    #[test]
    fn test_voice_stealing_replaces_shortest() {
        let mut mixer = Mixer::new(1, 2, 8);
        mixer.trigger(&constant(0.1, 1000), 1.0, 0, 0);
        mixer.trigger(&constant(0.1, 10), 1.0, 0, 0);
        mixer.trigger(&constant(0.1, 500), 1.0, 0, 0);

        assert_eq!(mixer.active_count(), 2);
        assert_eq!(mixer.stolen_count(), 1);
        let mut remaining: Vec<usize> = mixer.instances().iter().map(|i| i.remaining()).collect();
        remaining.sort();
        assert_eq!(remaining, vec![500, 1000]);
    }

    #[test]
    fn test_non_finite_instance_is_dropped() {
        let mut mixer = Mixer::new(1, 4, 8);
        let mut corrupted = vec![0.2f32; 8];
        corrupted[3] = f32::NAN;
        mixer.trigger(&Arc::from(corrupted), 1.0, 0, 0);
        mixer.trigger(&constant(0.2, 8), 1.0, 0, 0);

        mixer.mix(8);
        assert_eq!(mixer.dropped_count(), 1);
        assert!(mixer.bus(0).iter().all(|s| s.is_finite()));
        assert!((mixer.bus(0)[0] - 0.2f32.tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_unknown_bus() {
        let mut mixer = Mixer::new(2, 4, 8);
        assert!(!mixer.trigger(&constant(0.2, 8), 1.0, 5, 0));
        assert!(!mixer.trigger(&constant(0.2, 0), 1.0, 0, 0));
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_interleave() {
        let mut mixer = Mixer::new(2, 4, 4);
        mixer.trigger(&constant(0.5, 4), 1.0, 1, 0);
        mixer.mix(3);

        let mut out = vec![9.0f32; 6];
        mixer.interleave_into(&mut out);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.5f32.tanh()).abs() < 1e-6);
        assert_eq!(out[4], 0.0);
    }
}
