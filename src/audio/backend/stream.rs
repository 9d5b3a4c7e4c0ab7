// Streaming backend - the device pulls blocks through a cpal callback
//
// # Format Support
//
// The callback is generic over the device sample format (F32, I16, U16). The
// engine always renders f32 buses; conversion happens while writing the device
// buffer, through cpal's `FromSample<f32>`, without allocation.
//
// # Ring buffer decoupling
//
// With `ring_buffer_frames` set, rendering moves to its own thread which keeps
// an SPSC frame ring topped up; the callback then only copies from the ring and
// zero pads on underrun.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::backend::{ActiveBackend, AudioBackend, BlockSource};
use crate::audio::format_conversion::write_bus_frame_to_interleaved_frame;
use crate::audio::ring_buffer::{RingConsumer, RingProducer, frame_ring};
use crate::audio::session::AudioSession;
use crate::error::EngineError;
use crate::messaging::channels::{SharedNotificationProducer, try_notify};
use crate::messaging::notification::{Notification, NotificationCategory};

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
}

/// Default output device, configured for `sample_rate`.
///
/// The device's default configuration is used when it already matches;
/// otherwise the best supported range is picked, preferring f32 and stereo.
pub(crate) fn open_output_device(
    sample_rate: u32,
) -> Result<(Device, StreamConfig, SampleFormat), EngineError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| EngineError::BackendUnavailable("No audio output device found".into()))?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = match device.default_output_config() {
        Ok(default)
            if default.sample_rate().0 == sample_rate
                && is_supported_format(default.sample_format()) =>
        {
            default
        }
        _ => device
            .supported_output_configs()
            .map_err(|e| {
                EngineError::BackendUnavailable(format!("Cannot query {}: {}", name, e))
            })?
            .filter(|range| {
                is_supported_format(range.sample_format())
                    && range.min_sample_rate().0 <= sample_rate
                    && range.max_sample_rate().0 >= sample_rate
            })
            .max_by_key(|range| {
                (
                    range.sample_format() == SampleFormat::F32,
                    range.channels().min(2),
                )
            })
            .map(|range| range.with_sample_rate(cpal::SampleRate(sample_rate)))
            .ok_or_else(|| {
                EngineError::BackendUnavailable(format!(
                    "{} does not support {} Hz output",
                    name, sample_rate
                ))
            })?,
    };

    log::info!("Audio device: {} ({:?})", name, supported);
    let sample_format = supported.sample_format();
    Ok((device, supported.into(), sample_format))
}

/// Build an output stream pulling from `source`, for any supported sample type
fn build_stream<T, S>(
    device: &Device,
    config: &StreamConfig,
    mut source: S,
    notifications: SharedNotificationProducer,
) -> Result<Stream, EngineError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
    S: BlockSource,
{
    let device_channels = (config.channels as usize).max(1);
    let bus_count = source.bus_count();
    let chunk_samples = source.max_block() * device_channels;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // ========== SACRED ZONE ==========
                // No allocations, No I/O, No blocking locks
                for chunk in data.chunks_mut(chunk_samples) {
                    let frames = chunk.len() / device_channels;
                    let block = source.next_block(frames);
                    for (bus_frame, output_frame) in block
                        .chunks_exact(bus_count)
                        .zip(chunk.chunks_exact_mut(device_channels))
                    {
                        write_bus_frame_to_interleaved_frame(bus_frame, output_frame);
                    }
                }
                // ========== SACRED ZONE END ==========
            },
            move |err| {
                // Runs outside the audio callback, I/O is fine here
                log::error!("Audio stream error: {}", err);
                try_notify(
                    &notifications,
                    Notification::error(
                        NotificationCategory::Backend,
                        format!("Audio stream error: {}", err),
                    ),
                );
            },
            None,
        )
        .map_err(|e| EngineError::BackendUnavailable(format!("Error in stream creation: {}", e)))
}

pub(crate) fn build_for_format<S: BlockSource>(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    source: S,
    notifications: SharedNotificationProducer,
) -> Result<Stream, EngineError> {
    match sample_format {
        SampleFormat::F32 => build_stream::<f32, S>(device, config, source, notifications),
        SampleFormat::I16 => build_stream::<i16, S>(device, config, source, notifications),
        SampleFormat::U16 => build_stream::<u16, S>(device, config, source, notifications),
        other => Err(EngineError::BackendUnavailable(format!(
            "Unsupported sample format: {:?}. Supported formats: F32, I16, U16",
            other
        ))),
    }
}

/// Callback side of the ring buffer variant
struct RingSource {
    consumer: RingConsumer,
    scratch: Vec<f32>,
    max_block: usize,
}

impl RingSource {
    fn new(consumer: RingConsumer, max_block: usize) -> Self {
        let scratch = vec![0.0; max_block * consumer.channels()];
        Self {
            consumer,
            scratch,
            max_block,
        }
    }
}

impl BlockSource for RingSource {
    fn bus_count(&self) -> usize {
        self.consumer.channels()
    }

    fn max_block(&self) -> usize {
        self.max_block
    }

    fn next_block(&mut self, frames: usize) -> &[f32] {
        let frames = frames.min(self.max_block);
        self.consumer.pop(&mut self.scratch, frames);
        &self.scratch[..frames * self.consumer.channels()]
    }
}

/// Keeps the ring topped up, one block at a time
struct RenderThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl RenderThread {
    fn spawn(
        mut session: AudioSession,
        mut ring: RingProducer,
        block_frames: usize,
    ) -> Result<Self, EngineError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let block_frames = block_frames.clamp(1, session.max_block());

        let handle = thread::Builder::new()
            .name("polyclick-render".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    if ring.free_space() < block_frames {
                        thread::park_timeout(Duration::from_millis(1));
                        continue;
                    }
                    let block = session.next_block(block_frames);
                    ring.push(block);
                }
            })
            .map_err(|e| {
                EngineError::BackendUnavailable(format!("Cannot spawn render thread: {}", e))
            })?;

        Ok(Self { stop, handle })
    }

    fn stop(self) {
        self.stop.store(true, Ordering::Release);
        self.handle.thread().unpark();
        let _ = self.handle.join();
    }
}

struct ActiveStream {
    stream: Stream,
    render_thread: Option<RenderThread>,
}

impl ActiveBackend for ActiveStream {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn stop(self: Box<Self>) {
        let ActiveStream {
            stream,
            render_thread,
        } = *self;
        let _ = stream.pause();
        // Dropping the stream tears down the callback before we return
        drop(stream);
        if let Some(thread) = render_thread {
            thread.stop();
        }
    }
}

/// Backend A: cpal output stream callback
pub struct StreamBackend {
    block_frames: usize,
    ring_buffer_frames: Option<usize>,
}

impl StreamBackend {
    pub fn new(block_frames: usize, ring_buffer_frames: Option<usize>) -> Self {
        Self {
            block_frames,
            ring_buffer_frames,
        }
    }
}

impl AudioBackend for StreamBackend {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn open(
        &mut self,
        session: AudioSession,
        notifications: SharedNotificationProducer,
    ) -> Result<Box<dyn ActiveBackend>, EngineError> {
        let (device, config, sample_format) = open_output_device(session.sample_rate())?;

        let (stream, render_thread) = match self.ring_buffer_frames {
            None => (
                build_for_format(&device, &config, sample_format, session, notifications)?,
                None,
            ),
            Some(frames) => {
                let (producer, consumer) = frame_ring(frames, session.bus_count());
                let source = RingSource::new(consumer, session.max_block());
                let stream =
                    build_for_format(&device, &config, sample_format, source, notifications)?;
                let thread = RenderThread::spawn(session, producer, self.block_frames)?;
                (stream, Some(thread))
            }
        };

        if let Err(e) = stream.play() {
            if let Some(thread) = render_thread {
                thread.stop();
            }
            return Err(EngineError::BackendUnavailable(format!(
                "Error in stream beginning: {}",
                e
            )));
        }

        log::info!(
            "Streaming backend started: {} Hz, {} device channels{}",
            config.sample_rate.0,
            config.channels,
            if render_thread.is_some() { ", ring buffered" } else { "" }
        );

        Ok(Box::new(ActiveStream {
            stream,
            render_thread,
        }))
    }
}
