// Frame sinks for the polling backend
//
// `DeviceSink` blocks on a small cpal-fed queue; `NullSink` is headless and
// only keeps statistics (offline machines, CI, tests).

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::backend::polling::{FrameSink, OpenedSink, SinkProvider};
use crate::audio::backend::stream::open_output_device;
use crate::error::EngineError;

/// Give up on a device that has not taken a single sample for this long
const STALL_TIMEOUT: Duration = Duration::from_millis(500);

/// Counters shared between a `NullSink` and whoever inspects it
#[derive(Clone, Default)]
pub struct SinkStats {
    frames: Arc<AtomicU64>,
    blocks: Arc<AtomicU64>,
    peak_bits: Arc<AtomicU32>,
}

impl SinkStats {
    pub fn frames_played(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn blocks_played(&self) -> u64 {
        self.blocks.load(Ordering::Acquire)
    }

    /// Largest absolute sample seen so far
    pub fn peak(&self) -> f32 {
        f32::from_bits(self.peak_bits.load(Ordering::Acquire))
    }

    fn record(&self, interleaved: &[f32], channels: usize) {
        let peak = interleaved.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        // Non-negative floats order like their bit patterns
        self.peak_bits.fetch_max(peak.to_bits(), Ordering::AcqRel);
        self.frames
            .fetch_add((interleaved.len() / channels) as u64, Ordering::AcqRel);
        self.blocks.fetch_add(1, Ordering::AcqRel);
    }
}

struct NullSink {
    channels: usize,
    stats: SinkStats,
}

impl FrameSink for NullSink {
    fn channels(&self) -> usize {
        self.channels
    }

    fn play_blocking(&mut self, interleaved: &[f32]) -> Result<(), EngineError> {
        self.stats.record(interleaved, self.channels);
        Ok(())
    }
}

/// Headless sinks; the polling thread's own pacing keeps them in real time
pub struct NullSinkProvider {
    channels: usize,
    stats: SinkStats,
}

impl NullSinkProvider {
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.max(1),
            stats: SinkStats::default(),
        }
    }

    pub fn stats(&self) -> SinkStats {
        self.stats.clone()
    }
}

impl SinkProvider for NullSinkProvider {
    fn open(&mut self, _sample_rate: u32) -> Result<OpenedSink, EngineError> {
        Ok(OpenedSink {
            sink: Box::new(NullSink {
                channels: self.channels,
                stats: self.stats.clone(),
            }),
            guard: None,
        })
    }
}

struct DeviceSink {
    producer: HeapProd<f32>,
    channels: usize,
}

impl FrameSink for DeviceSink {
    fn channels(&self) -> usize {
        self.channels
    }

    fn play_blocking(&mut self, interleaved: &[f32]) -> Result<(), EngineError> {
        let mut offset = 0;
        let mut last_progress = Instant::now();

        while offset < interleaved.len() {
            let written = self.producer.push_slice(&interleaved[offset..]);
            if written > 0 {
                offset += written;
                last_progress = Instant::now();
            } else if last_progress.elapsed() > STALL_TIMEOUT {
                return Err(EngineError::BackendUnavailable(
                    "output device stopped consuming audio".to_string(),
                ));
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
        Ok(())
    }
}

fn build_sink_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
) -> Result<Stream, EngineError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let channels = (config.channels as usize).max(1);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Whole frames only, so an underrun never shifts the channel order
                let whole = (consumer.occupied_len() / channels * channels).min(data.len());
                let (filled, rest) = data.split_at_mut(whole);
                for sample in filled.iter_mut() {
                    *sample = Sample::from_sample::<f32>(consumer.try_pop().unwrap_or(0.0));
                }
                for sample in rest.iter_mut() {
                    *sample = T::EQUILIBRIUM;
                }
            },
            move |err| {
                log::error!("Audio sink stream error: {}", err);
            },
            None,
        )
        .map_err(|e| EngineError::BackendUnavailable(format!("Error in stream creation: {}", e)))
}

/// Blocking sinks on the default cpal output device
pub struct DeviceSinkProvider {
    block_frames: usize,
}

impl DeviceSinkProvider {
    pub fn new(block_frames: usize) -> Self {
        Self {
            block_frames: block_frames.max(1),
        }
    }
}

impl SinkProvider for DeviceSinkProvider {
    fn open(&mut self, sample_rate: u32) -> Result<OpenedSink, EngineError> {
        let (device, config, sample_format) = open_output_device(sample_rate)?;
        let channels = (config.channels as usize).max(1);

        let rb = HeapRb::<f32>::new(self.block_frames * 4 * channels);
        let (producer, consumer) = rb.split();

        let stream = match sample_format {
            SampleFormat::F32 => build_sink_stream::<f32>(&device, &config, consumer),
            SampleFormat::I16 => build_sink_stream::<i16>(&device, &config, consumer),
            SampleFormat::U16 => build_sink_stream::<u16>(&device, &config, consumer),
            other => Err(EngineError::BackendUnavailable(format!(
                "Unsupported sample format: {:?}",
                other
            ))),
        }?;

        stream
            .play()
            .map_err(|e| EngineError::BackendUnavailable(format!("Error in stream beginning: {}", e)))?;

        Ok(OpenedSink {
            sink: Box::new(DeviceSink { producer, channels }),
            guard: Some(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink_records_stats() {
        let mut provider = NullSinkProvider::new(2);
        let stats = provider.stats();
        let mut opened = provider.open(44100).unwrap();
        assert!(opened.guard.is_none());
        assert_eq!(opened.sink.channels(), 2);

        opened.sink.play_blocking(&[0.1, -0.6, 0.3, 0.2]).unwrap();
        opened.sink.play_blocking(&[0.0, 0.0]).unwrap();

        assert_eq!(stats.frames_played(), 3);
        assert_eq!(stats.blocks_played(), 2);
        assert!((stats.peak() - 0.6).abs() < 1e-6);
    }
}
