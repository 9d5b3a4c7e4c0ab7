// Rhythm configuration: the document the UI edits and the engine snapshots

pub mod persistence;
pub mod settings;
pub mod types;
pub mod validation;

pub use persistence::{LoadedConfiguration, load_from_file, save_to_file};
pub use settings::EngineSettings;
pub use types::{ChannelBus, DrumVoice, Layer, LayerId, RhythmConfiguration, SoundSource};
pub use validation::validate;
