// Sound source cache - memoized, shared, immutable mono buffers

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::types::{DrumVoice, SoundSource};
use crate::error::EngineError;
use crate::sound::drum::synthesize_drum;
use crate::sound::loader::load_mono;
use crate::sound::tick::load_tick_pair;
use crate::sound::tone::synthesize_tone;

/// Shared read-only sample data
pub type SampleBuffer = Arc<[f32]>;

/// Which member of a source to fetch; only tick pairs actually differ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleVariant {
    Accent,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    /// Frequency in hundredths of a Hz
    Tone(i64),
    Drum(DrumVoice),
    File(PathBuf),
    Tick(String, SampleVariant),
}

/// Normal and accent buffers for one source
#[derive(Debug, Clone)]
pub struct SourceBuffers {
    pub normal: SampleBuffer,
    pub accent: SampleBuffer,
}

/// Produces each distinct source at most once per cache lifetime.
///
/// First access to a file or tick source blocks on disk I/O, so the engine warms
/// every referenced source before audio starts. Buffers are never evicted: an
/// instance still sounding on the audio thread never holds the last reference.
/// Failures are not memoized, a missing file can be fixed and retried.
pub struct SoundSourceCache {
    sample_rate: u32,
    tick_directory: PathBuf,
    entries: HashMap<CacheKey, SampleBuffer>,
}

impl SoundSourceCache {
    pub fn new(sample_rate: u32, tick_directory: impl Into<PathBuf>) -> Self {
        Self {
            sample_rate,
            tick_directory: tick_directory.into(),
            entries: HashMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of distinct buffers held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(
        &mut self,
        source: &SoundSource,
        variant: SampleVariant,
    ) -> Result<SampleBuffer, EngineError> {
        let key = Self::key(source, variant)?;
        if let Some(buffer) = self.entries.get(&key) {
            return Ok(buffer.clone());
        }

        match source {
            SoundSource::Tone { frequency } => {
                let buffer: SampleBuffer = synthesize_tone(*frequency, self.sample_rate).into();
                self.entries.insert(key, buffer.clone());
                Ok(buffer)
            }
            SoundSource::Drum { voice } => {
                let voice = Self::drum_voice(source, voice)?;
                let buffer: SampleBuffer = synthesize_drum(voice, self.sample_rate).into();
                self.entries.insert(key, buffer.clone());
                Ok(buffer)
            }
            SoundSource::File { path } => {
                let buffer: SampleBuffer = load_mono(path, self.sample_rate)?.into();
                self.entries.insert(key, buffer.clone());
                Ok(buffer)
            }
            SoundSource::Tick { name } => {
                let pair = load_tick_pair(&self.tick_directory, name, self.sample_rate)?;
                let accent: SampleBuffer = pair.accent.into();
                let normal: SampleBuffer = pair.normal.into();
                self.entries.insert(
                    CacheKey::Tick(name.clone(), SampleVariant::Accent),
                    accent.clone(),
                );
                self.entries.insert(
                    CacheKey::Tick(name.clone(), SampleVariant::Normal),
                    normal.clone(),
                );
                Ok(match variant {
                    SampleVariant::Accent => accent,
                    SampleVariant::Normal => normal,
                })
            }
        }
    }

    /// Resolve both variants of a source
    pub fn prewarm(&mut self, source: &SoundSource) -> Result<SourceBuffers, EngineError> {
        Ok(SourceBuffers {
            normal: self.get(source, SampleVariant::Normal)?,
            accent: self.get(source, SampleVariant::Accent)?,
        })
    }

    fn drum_voice(source: &SoundSource, name: &str) -> Result<DrumVoice, EngineError> {
        DrumVoice::from_name(name).ok_or_else(|| {
            EngineError::source_unavailable(source.to_string(), "unknown drum voice")
        })
    }

    fn key(source: &SoundSource, variant: SampleVariant) -> Result<CacheKey, EngineError> {
        Ok(match source {
            SoundSource::Tone { frequency } => {
                CacheKey::Tone((*frequency as f64 * 100.0).round() as i64)
            }
            SoundSource::Drum { voice } => CacheKey::Drum(Self::drum_voice(source, voice)?),
            SoundSource::File { path } => CacheKey::File(path.clone()),
            SoundSource::Tick { name } => CacheKey::Tick(name.clone(), variant),
        })
    }
}
