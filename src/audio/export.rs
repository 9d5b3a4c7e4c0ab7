// Audio Export - Offline rendering to 16-bit stereo WAV
//
// Runs the same `RenderCore` as live playback, as fast as possible, into a
// pre-allocated sample array, then encodes it with hound. Blocks are cut at due
// events so every event starts a block, exactly as the polling backend does.
// The output is a pure function of the configuration and the duration.

use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;

use hound::{WavSpec, WavWriter};

use crate::audio::format_conversion::{f32_to_i16, fold_to_stereo};
use crate::audio::render::RenderCore;
use crate::audio::timing::PlaybackClock;
use crate::config::settings::EngineSettings;
use crate::config::types::{LayerId, RhythmConfiguration};
use crate::error::EngineError;
use crate::sequencer::plan::PlaybackPlan;
use crate::sound::cache::SoundSourceCache;

pub const EXPORT_CHANNELS: u16 = 2;
pub const EXPORT_BITS_PER_SAMPLE: u16 = 16;

/// Largest block the offline loop renders between two events
const OFFLINE_BLOCK_FRAMES: usize = 4096;

/// What an offline render produced
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub frames: u64,
    pub sample_rate: u32,
    pub events: u64,
    pub skipped_layers: Vec<LayerId>,
}

impl RenderSummary {
    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Interleaved stereo f32 samples plus the summary of the run
pub struct RenderedAudio {
    pub samples: Vec<f32>,
    pub summary: RenderSummary,
}

pub struct OfflineRenderer {
    settings: EngineSettings,
    cache: SoundSourceCache,
}

impl OfflineRenderer {
    pub fn new(settings: EngineSettings) -> Self {
        let cache = SoundSourceCache::new(settings.sample_rate, settings.tick_directory.clone());
        Self { settings, cache }
    }

    pub fn sample_rate(&self) -> u32 {
        self.settings.sample_rate
    }

    /// Render to interleaved stereo f32 without encoding
    pub fn render_samples(
        &mut self,
        config: &RhythmConfiguration,
        duration_seconds: f64,
    ) -> Result<RenderedAudio, EngineError> {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(EngineError::invalid(format!(
                "render duration must be > 0, got {}",
                duration_seconds
            )));
        }
        if config.is_empty() {
            return Err(EngineError::NoLayersConfigured);
        }

        let build = PlaybackPlan::build(config, &mut self.cache)?;
        for skipped in &build.skipped {
            log::warn!("Layer {} skipped in render: {}", skipped.id, skipped.error);
        }
        let skipped_layers = build.skipped.iter().map(|s| s.id).collect();

        let sample_rate = self.settings.sample_rate;
        let total_frames = (duration_seconds * sample_rate as f64).round() as u64;
        let plan = Arc::new(build.plan);
        let bus_count = plan.channel_count.max(1);

        let mut core = RenderCore::new(
            plan,
            &self.settings,
            bus_count,
            OFFLINE_BLOCK_FRAMES,
            PlaybackClock::new(sample_rate),
            None,
        );

        let mut samples = vec![0.0f32; total_frames as usize * EXPORT_CHANNELS as usize];
        let mut bus_frames = vec![0.0f32; OFFLINE_BLOCK_FRAMES * bus_count];
        let mut position = 0u64;

        while position < total_frames {
            let remaining = total_frames - position;
            let until_event = match core.next_due_sample() {
                Some(due) if due > position => due - position,
                _ => OFFLINE_BLOCK_FRAMES as u64,
            };
            let frames = until_event
                .min(OFFLINE_BLOCK_FRAMES as u64)
                .min(remaining)
                .max(1) as usize;

            core.render(frames);
            let block = &mut bus_frames[..frames * bus_count];
            core.mixer().interleave_into(block);

            let start = position as usize * EXPORT_CHANNELS as usize;
            let output = &mut samples[start..start + frames * EXPORT_CHANNELS as usize];
            for (bus_frame, stereo) in block.chunks_exact(bus_count).zip(output.chunks_exact_mut(2)) {
                let (left, right) = fold_to_stereo(bus_frame);
                stereo[0] = left;
                stereo[1] = right;
            }

            position += frames as u64;
        }

        log::debug!(
            "Rendered {} frames, {} events, {} instances stolen",
            total_frames,
            core.events_fired(),
            core.mixer().stolen_count()
        );

        Ok(RenderedAudio {
            samples,
            summary: RenderSummary {
                frames: total_frames,
                sample_rate,
                events: core.events_fired(),
                skipped_layers,
            },
        })
    }

    /// Render and encode into any seekable writer
    pub fn render<W: Write + Seek>(
        &mut self,
        config: &RhythmConfiguration,
        duration_seconds: f64,
        writer: W,
    ) -> Result<RenderSummary, EngineError> {
        let rendered = self.render_samples(config, duration_seconds)?;
        let writer = WavWriter::new(writer, self.wav_spec())
            .map_err(|e| EngineError::RenderIo(format!("Failed to start WAV stream: {}", e)))?;
        encode(writer, &rendered.samples)?;
        Ok(rendered.summary)
    }

    /// Render and write a WAV file at `path`
    pub fn render_to_file<P: AsRef<Path>>(
        &mut self,
        config: &RhythmConfiguration,
        duration_seconds: f64,
        path: P,
    ) -> Result<RenderSummary, EngineError> {
        let path = path.as_ref();
        let rendered = self.render_samples(config, duration_seconds)?;
        let writer = WavWriter::create(path, self.wav_spec()).map_err(|e| {
            EngineError::RenderIo(format!("Failed to create {}: {}", path.display(), e))
        })?;
        encode(writer, &rendered.samples)?;

        log::info!(
            "Exported {:.2}s ({} events) to {}",
            rendered.summary.duration_seconds(),
            rendered.summary.events,
            path.display()
        );
        Ok(rendered.summary)
    }

    fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: EXPORT_CHANNELS,
            sample_rate: self.settings.sample_rate,
            bits_per_sample: EXPORT_BITS_PER_SAMPLE,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

fn encode<W: Write + Seek>(mut writer: WavWriter<W>, samples: &[f32]) -> Result<(), EngineError> {
    for &sample in samples {
        writer
            .write_sample(f32_to_i16(sample))
            .map_err(|e| EngineError::RenderIo(format!("Failed to write sample: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| EngineError::RenderIo(format!("Failed to finalize WAV: {}", e)))
}
