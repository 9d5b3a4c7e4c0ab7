// Audio backends - how rendered blocks reach the hardware
//
// Two interchangeable strategies drive the same `AudioSession`:
// - `stream`: the device pulls blocks through a cpal callback
// - `polling`: a dedicated thread paces itself on the next due event and hands
//   each block to a blocking `FrameSink`
// The engine tries them in order and keeps the first that opens.

pub mod polling;
pub mod sink;
pub mod stream;

use crate::audio::session::AudioSession;
use crate::config::settings::EngineSettings;
use crate::error::EngineError;
use crate::messaging::channels::SharedNotificationProducer;

pub use polling::{FrameSink, OpenedSink, PollingBackend, SinkProvider};
pub use sink::{DeviceSinkProvider, NullSinkProvider, SinkStats};
pub use stream::StreamBackend;

/// A strategy able to take over an audio session
pub trait AudioBackend {
    fn name(&self) -> &'static str;

    /// Start playing `session`. On failure the session is dropped; the engine
    /// builds a fresh one for the next backend.
    fn open(
        &mut self,
        session: AudioSession,
        notifications: SharedNotificationProducer,
    ) -> Result<Box<dyn ActiveBackend>, EngineError>;
}

/// A running backend, owned by the control thread
pub trait ActiveBackend {
    fn name(&self) -> &'static str;

    /// Stop the audio context and wait until it is fully quiesced
    fn stop(self: Box<Self>);
}

/// Source of bus-interleaved blocks for a device callback
pub trait BlockSource: Send + 'static {
    fn bus_count(&self) -> usize;

    fn max_block(&self) -> usize;

    /// The next `frames` frames, `frames <= max_block()`
    fn next_block(&mut self, frames: usize) -> &[f32];
}

impl BlockSource for AudioSession {
    fn bus_count(&self) -> usize {
        AudioSession::bus_count(self)
    }

    fn max_block(&self) -> usize {
        AudioSession::max_block(self)
    }

    fn next_block(&mut self, frames: usize) -> &[f32] {
        self.apply_commands();
        self.render_block(frames)
    }
}

/// Streaming callback first, then the polling thread on a cpal blocking sink
pub fn default_backends(settings: &EngineSettings) -> Vec<Box<dyn AudioBackend>> {
    vec![
        Box::new(StreamBackend::new(
            settings.block_frames,
            settings.ring_buffer_frames,
        )),
        Box::new(PollingBackend::new(
            DeviceSinkProvider::new(settings.block_frames),
            settings.block_frames,
        )),
    ]
}
