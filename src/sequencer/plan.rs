// Playback plan - the immutable, pre-warmed snapshot the audio thread reads

use crate::config::types::{LayerId, RhythmConfiguration};
use crate::config::validation::validate;
use crate::error::EngineError;
use crate::sequencer::timing::Meter;
use crate::sound::cache::{SampleBuffer, SoundSourceCache};

/// A layer with everything resolved: interval, gains and sample data
#[derive(Debug, Clone)]
pub struct ResolvedLayer {
    pub id: LayerId,
    pub channel: usize,
    pub subdivision: u32,
    pub interval_seconds: f64,
    pub volume: f32,
    pub accent_gain: f32,
    pub muted: bool,
    pub normal: SampleBuffer,
    pub accent: SampleBuffer,
}

impl ResolvedLayer {
    /// `volume * (accent gain if accented) * master`
    #[inline]
    pub fn amplitude(&self, is_accent: bool, master_volume: f32) -> f32 {
        let accent = if is_accent { self.accent_gain } else { 1.0 };
        self.volume * accent * master_volume
    }

    #[inline]
    pub fn buffer(&self, is_accent: bool) -> &SampleBuffer {
        if is_accent { &self.accent } else { &self.normal }
    }
}

/// A layer left out of the plan because its source could not be produced
#[derive(Debug, Clone)]
pub struct SkippedLayer {
    pub id: LayerId,
    pub channel: usize,
    pub error: EngineError,
}

#[derive(Debug, Clone)]
pub struct PlaybackPlan {
    pub meter: Meter,
    pub master_volume: f32,
    pub channel_count: usize,
    /// Channel order, then insertion order within a channel
    pub layers: Vec<ResolvedLayer>,
}

/// A plan plus the layers that had to be dropped from it
#[derive(Debug, Clone)]
pub struct PlanBuild {
    pub plan: PlaybackPlan,
    pub skipped: Vec<SkippedLayer>,
}

impl PlaybackPlan {
    /// Validate `config` and warm the cache for every source it references.
    ///
    /// Source failures are per-layer: the layer is skipped and reported, the rest
    /// of the plan is unaffected. Blocking I/O happens here, never on the audio thread.
    pub fn build(
        config: &RhythmConfiguration,
        cache: &mut SoundSourceCache,
    ) -> Result<PlanBuild, EngineError> {
        validate(config)?;

        let meter = Meter::from_config(config);
        let mut layers = Vec::with_capacity(config.layer_count());
        let mut skipped = Vec::new();

        for (channel, layer) in config.layers() {
            match cache.prewarm(&layer.sound_source) {
                Ok(buffers) => layers.push(ResolvedLayer {
                    id: layer.id,
                    channel,
                    subdivision: layer.subdivision,
                    interval_seconds: meter.interval_seconds(layer.subdivision),
                    volume: layer.volume,
                    accent_gain: layer.effective_accent(config.accent_factor),
                    muted: layer.muted,
                    normal: buffers.normal,
                    accent: buffers.accent,
                }),
                Err(error) => skipped.push(SkippedLayer {
                    id: layer.id,
                    channel,
                    error,
                }),
            }
        }

        Ok(PlanBuild {
            plan: PlaybackPlan {
                meter,
                master_volume: config.master_volume,
                channel_count: config.channels.len(),
                layers,
            },
            skipped,
        })
    }

    pub fn layer(&self, id: LayerId) -> Option<&ResolvedLayer> {
        self.layers.iter().find(|layer| layer.id == id)
    }
}
