// Polling backend - a dedicated thread paced by the next due event
//
// The thread cuts blocks at due events, sleeps until the wall-clock deadline of
// the next block (kept a small lead ahead of real time), renders it and hands it
// to a blocking `FrameSink`. Used when the callback API is unavailable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::backend::{ActiveBackend, AudioBackend};
use crate::audio::format_conversion::write_bus_frame_to_interleaved_frame;
use crate::audio::session::AudioSession;
use crate::error::EngineError;
use crate::messaging::channels::{SharedNotificationProducer, try_notify};
use crate::messaging::notification::{Notification, NotificationCategory};

/// Blocking "play this buffer" primitive
pub trait FrameSink: Send {
    /// Interleaved channel count the sink expects
    fn channels(&self) -> usize;

    /// Returns once the frames have been accepted for playback
    fn play_blocking(&mut self, interleaved: &[f32]) -> Result<(), EngineError>;
}

/// A sink plus whatever must stay alive on the control thread while it plays
pub struct OpenedSink {
    pub sink: Box<dyn FrameSink>,
    pub guard: Option<cpal::Stream>,
}

pub trait SinkProvider {
    fn open(&mut self, sample_rate: u32) -> Result<OpenedSink, EngineError>;
}

/// Backend B: polling thread over any `SinkProvider`
pub struct PollingBackend<P: SinkProvider> {
    provider: P,
    block_frames: usize,
}

impl<P: SinkProvider> PollingBackend<P> {
    pub fn new(provider: P, block_frames: usize) -> Self {
        Self {
            provider,
            block_frames: block_frames.max(1),
        }
    }
}

impl<P: SinkProvider> AudioBackend for PollingBackend<P> {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn open(
        &mut self,
        session: AudioSession,
        notifications: SharedNotificationProducer,
    ) -> Result<Box<dyn ActiveBackend>, EngineError> {
        let OpenedSink { sink, guard } = self.provider.open(session.sample_rate())?;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let block_frames = self.block_frames.min(session.max_block());

        let handle = thread::Builder::new()
            .name("polyclick-poll".to_string())
            .spawn(move || run(session, sink, block_frames, stop_flag, notifications))
            .map_err(|e| {
                EngineError::BackendUnavailable(format!("Cannot spawn polling thread: {}", e))
            })?;

        log::info!("Polling backend started ({} frame blocks)", block_frames);
        Ok(Box::new(ActivePolling {
            stop,
            handle,
            _guard: guard,
        }))
    }
}

struct ActivePolling {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    _guard: Option<cpal::Stream>,
}

impl ActiveBackend for ActivePolling {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn stop(self: Box<Self>) {
        self.stop.store(true, Ordering::Release);
        self.handle.thread().unpark();
        let _ = self.handle.join();
    }
}

fn run(
    mut session: AudioSession,
    mut sink: Box<dyn FrameSink>,
    block_frames: usize,
    stop: Arc<AtomicBool>,
    notifications: SharedNotificationProducer,
) {
    let sample_rate = session.sample_rate() as f64;
    let channels = sink.channels().max(1);
    let lead = block_frames as u64 * 2;
    let mut device_block = vec![0.0f32; session.max_block() * channels];
    let started = Instant::now();
    let mut reported_panics = 0;

    while !stop.load(Ordering::Acquire) {
        session.apply_commands();
        let position = session.position_samples();

        let deadline =
            started + Duration::from_secs_f64(position.saturating_sub(lead) as f64 / sample_rate);
        let now = Instant::now();
        if deadline > now {
            thread::park_timeout(deadline - now);
            continue;
        }

        let frames = match session.next_due_sample() {
            Some(due) if due > position => ((due - position) as usize).min(block_frames),
            _ => block_frames,
        };

        let bus_count = session.bus_count();
        let block = session.render_block(frames);
        let output = &mut device_block[..frames * channels];
        for (bus_frame, output_frame) in block
            .chunks_exact(bus_count)
            .zip(output.chunks_exact_mut(channels))
        {
            write_bus_frame_to_interleaved_frame(bus_frame, output_frame);
        }

        if session.contained_panics() > reported_panics {
            reported_panics = session.contained_panics();
            try_notify(
                &notifications,
                Notification::error(
                    NotificationCategory::Playback,
                    format!(
                        "Rendering failed at {:.3}s, block muted",
                        position as f64 / sample_rate
                    ),
                ),
            );
        }

        if let Err(e) = sink.play_blocking(output) {
            try_notify(
                &notifications,
                Notification::error(
                    NotificationCategory::Backend,
                    format!("Polling backend stopped: {}", e),
                ),
            );
            break;
        }
    }
}
