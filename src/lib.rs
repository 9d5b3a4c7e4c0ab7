// Polyclick - polyrhythmic metronome engine
//
// Library exports for the CLI, tests and benchmarks

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod messaging;
pub mod sequencer;
pub mod sound;

// Re-export commonly used types for convenience
pub use audio::backend::{AudioBackend, NullSinkProvider, PollingBackend, StreamBackend};
pub use audio::engine::Engine;
pub use audio::export::{OfflineRenderer, RenderSummary};
pub use audio::state::EngineState;
pub use config::{
    ChannelBus, DrumVoice, EngineSettings, Layer, LayerId, RhythmConfiguration, SoundSource,
};
pub use error::EngineError;
pub use messaging::{Notification, NotificationCategory, NotificationLevel, TriggerNotification};
pub use sequencer::{Meter, PlaybackPlan, Scheduler};
