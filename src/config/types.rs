// Types for the rhythm configuration document

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::EngineError;

pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_BEATS_PER_MEASURE: u32 = 4;
pub const DEFAULT_ACCENT_FACTOR: f32 = 1.6;
pub const DEFAULT_MASTER_VOLUME: f32 = 1.0;
pub const DEFAULT_LAYER_VOLUME: f32 = 1.0;
pub const DEFAULT_SUBDIVISION: u32 = 4;
pub const DEFAULT_TONE_FREQUENCY: f32 = 880.0;

/// Stable layer identifier
///
/// Survives renames, volume edits and moves between channels, so visual feedback
/// can point at a row without looking it up by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LayerId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(LayerId)
            .map_err(|e| EngineError::UnknownLayer(format!("{}: {}", s, e)))
    }
}

/// Procedurally synthesized drum voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrumVoice {
    Kick,
    Snare,
    Hihat,
    Crash,
    Tom,
    Ride,
}

impl DrumVoice {
    pub const ALL: [DrumVoice; 6] = [
        DrumVoice::Kick,
        DrumVoice::Snare,
        DrumVoice::Hihat,
        DrumVoice::Crash,
        DrumVoice::Tom,
        DrumVoice::Ride,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DrumVoice::Kick => "kick",
            DrumVoice::Snare => "snare",
            DrumVoice::Hihat => "hihat",
            DrumVoice::Crash => "crash",
            DrumVoice::Tom => "tom",
            DrumVoice::Ride => "ride",
        }
    }

    /// Case-insensitive lookup; `None` for names outside the fixed set
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|voice| voice.name() == name)
    }
}

/// What a layer plays
///
/// Drum and tick names are kept as strings: an unknown name is a per-layer
/// source failure discovered when the cache is warmed, not a document error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum SoundSource {
    Tone { frequency: f32 },
    Drum { voice: String },
    File { path: PathBuf },
    Tick { name: String },
}

impl SoundSource {
    pub fn tone(frequency: f32) -> Self {
        SoundSource::Tone { frequency }
    }

    pub fn drum(voice: DrumVoice) -> Self {
        SoundSource::Drum {
            voice: voice.name().to_string(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        SoundSource::File { path: path.into() }
    }

    pub fn tick(name: impl Into<String>) -> Self {
        SoundSource::Tick { name: name.into() }
    }
}

impl Default for SoundSource {
    fn default() -> Self {
        SoundSource::tone(DEFAULT_TONE_FREQUENCY)
    }
}

impl fmt::Display for SoundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundSource::Tone { frequency } => write!(f, "tone:{:.2}Hz", frequency),
            SoundSource::Drum { voice } => write!(f, "drum:{}", voice),
            SoundSource::File { path } => write!(f, "file:{}", path.display()),
            SoundSource::Tick { name } => write!(f, "tick:{}", name),
        }
    }
}

fn default_subdivision() -> u32 {
    DEFAULT_SUBDIVISION
}

fn default_layer_volume() -> f32 {
    DEFAULT_LAYER_VOLUME
}

/// One independently periodic voice on a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default)]
    pub id: LayerId,
    /// Power-of-two note denominator (4 = quarter notes) or a tuplet count
    #[serde(default = "default_subdivision")]
    pub subdivision: u32,
    #[serde(default)]
    pub sound_source: SoundSource,
    #[serde(default = "default_layer_volume")]
    pub volume: f32,
    /// Overrides the global accent factor for this layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_multiplier: Option<f32>,
    #[serde(default)]
    pub muted: bool,
}

impl Layer {
    pub fn new(subdivision: u32, sound_source: SoundSource) -> Self {
        Self {
            id: LayerId::new(),
            subdivision,
            sound_source,
            volume: DEFAULT_LAYER_VOLUME,
            accent_multiplier: None,
            muted: false,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_accent_multiplier(mut self, multiplier: f32) -> Self {
        self.accent_multiplier = Some(multiplier);
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    /// Accent gain for this layer given the global factor
    pub fn effective_accent(&self, global_accent_factor: f32) -> f32 {
        self.accent_multiplier.unwrap_or(global_accent_factor)
    }
}

impl Default for Layer {
    fn default() -> Self {
        Self::new(DEFAULT_SUBDIVISION, SoundSource::default())
    }
}

/// An output bus; layers keep insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelBus {
    #[serde(default)]
    pub layers: Vec<Layer>,
}

fn default_bpm() -> f64 {
    DEFAULT_BPM
}

fn default_beats_per_measure() -> u32 {
    DEFAULT_BEATS_PER_MEASURE
}

fn default_accent_factor() -> f32 {
    DEFAULT_ACCENT_FACTOR
}

fn default_master_volume() -> f32 {
    DEFAULT_MASTER_VOLUME
}

fn default_channels() -> Vec<ChannelBus> {
    vec![ChannelBus::default(), ChannelBus::default()]
}

/// Everything the engine needs to know about what to play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmConfiguration {
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    #[serde(default = "default_beats_per_measure")]
    pub beats_per_measure: u32,
    #[serde(default = "default_accent_factor")]
    pub accent_factor: f32,
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelBus>,
}

impl Default for RhythmConfiguration {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            beats_per_measure: DEFAULT_BEATS_PER_MEASURE,
            accent_factor: DEFAULT_ACCENT_FACTOR,
            master_volume: DEFAULT_MASTER_VOLUME,
            channels: default_channels(),
        }
    }
}

impl RhythmConfiguration {
    /// Empty configuration with `channel_count` buses
    pub fn with_channels(channel_count: usize) -> Self {
        Self {
            channels: vec![ChannelBus::default(); channel_count],
            ..Self::default()
        }
    }

    /// True when no channel has any layer
    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(|bus| bus.layers.is_empty())
    }

    pub fn layer_count(&self) -> usize {
        self.channels.iter().map(|bus| bus.layers.len()).sum()
    }

    /// All layers with their channel index, in channel then insertion order
    pub fn layers(&self) -> impl Iterator<Item = (usize, &Layer)> {
        self.channels
            .iter()
            .enumerate()
            .flat_map(|(index, bus)| bus.layers.iter().map(move |layer| (index, layer)))
    }

    /// (channel index, position in channel)
    pub fn locate(&self, id: LayerId) -> Option<(usize, usize)> {
        self.channels.iter().enumerate().find_map(|(channel, bus)| {
            bus.layers
                .iter()
                .position(|layer| layer.id == id)
                .map(|position| (channel, position))
        })
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.locate(id)
            .map(|(channel, position)| &self.channels[channel].layers[position])
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        let (channel, position) = self.locate(id)?;
        Some(&mut self.channels[channel].layers[position])
    }

    pub fn add_layer(&mut self, channel: usize, layer: Layer) -> Result<LayerId, EngineError> {
        if self.locate(layer.id).is_some() {
            return Err(EngineError::invalid(format!(
                "Layer {} already exists",
                layer.id
            )));
        }
        let bus = self.channels.get_mut(channel).ok_or_else(|| {
            EngineError::invalid(format!("Channel {} does not exist", channel))
        })?;
        let id = layer.id;
        bus.layers.push(layer);
        Ok(id)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Result<Layer, EngineError> {
        let (channel, position) = self
            .locate(id)
            .ok_or_else(|| EngineError::UnknownLayer(id.to_string()))?;
        Ok(self.channels[channel].layers.remove(position))
    }

    /// Moves a layer to the end of another channel, keeping its id
    pub fn move_layer(&mut self, id: LayerId, to_channel: usize) -> Result<(), EngineError> {
        if to_channel >= self.channels.len() {
            return Err(EngineError::invalid(format!(
                "Channel {} does not exist",
                to_channel
            )));
        }
        let layer = self.remove_layer(id)?;
        self.channels[to_channel].layers.push(layer);
        Ok(())
    }
}
