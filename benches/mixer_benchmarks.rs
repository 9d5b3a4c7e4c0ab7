use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use polyclick::audio::mixer::Mixer;
use polyclick::audio::render::RenderCore;
use polyclick::audio::timing::PlaybackClock;
use polyclick::sequencer::{PlaybackPlan, Scheduler};
use polyclick::sound::tone::synthesize_tone;
use polyclick::sound::{SampleBuffer, SoundSourceCache};
use polyclick::{EngineSettings, Layer, OfflineRenderer, RhythmConfiguration, SoundSource};
use std::sync::Arc;

const SAMPLE_RATE: u32 = 48000;
const BLOCK: usize = 512;

fn dense_config(layers_per_channel: usize) -> RhythmConfiguration {
    let mut config = RhythmConfiguration::with_channels(4);
    config.bpm = 180.0;
    for channel in 0..4 {
        for k in 0..layers_per_channel {
            let subdivision = [3u32, 4, 5, 7, 8, 16][(channel + k) % 6];
            let frequency = 220.0 * (1 + channel + k) as f32;
            config
                .add_layer(channel, Layer::new(subdivision, SoundSource::tone(frequency)))
                .unwrap();
        }
    }
    config
}

/// Mixing cost with many overlapping instances (voice stealing path included)
fn bench_mixer_instances(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixer");
    let tone: SampleBuffer = Arc::from(synthesize_tone(880.0, SAMPLE_RATE));

    for instances in [8usize, 64, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(instances),
            &instances,
            |b, &count| {
                let mut mixer = Mixer::new(4, 256, BLOCK);
                b.iter(|| {
                    for i in 0..count {
                        mixer.trigger(&tone, 0.5, i % 4, (i * 7) % BLOCK);
                    }
                    mixer.mix(BLOCK);
                    black_box(mixer.bus(0)[BLOCK / 2]);
                });
            },
        );
    }
    group.finish();
}

/// Scheduler sweep over one block, no mixing
fn bench_scheduler_advance(c: &mut Criterion) {
    let config = dense_config(4);
    let mut cache = SoundSourceCache::new(SAMPLE_RATE, "ticks");
    let plan = PlaybackPlan::build(&config, &mut cache).unwrap().plan;

    c.bench_function("scheduler_advance_16_layers", |b| {
        let mut scheduler = Scheduler::new(&plan, SAMPLE_RATE, 2.0, 0.0);
        let mut end = 0u64;
        b.iter(|| {
            end += BLOCK as u64;
            let mut count = 0usize;
            scheduler.advance(&plan, end, |_| count += 1);
            black_box(count);
        });
    });
}

/// One full audio-thread block: schedule, trigger, mix, clip
fn bench_render_block(c: &mut Criterion) {
    let settings = EngineSettings {
        sample_rate: SAMPLE_RATE,
        ..EngineSettings::default()
    };
    let mut group = c.benchmark_group("render_block");

    for layers_per_channel in [1usize, 4] {
        let config = dense_config(layers_per_channel);
        let mut cache = SoundSourceCache::new(SAMPLE_RATE, "ticks");
        let plan = Arc::new(PlaybackPlan::build(&config, &mut cache).unwrap().plan);

        group.bench_with_input(
            BenchmarkId::from_parameter(layers_per_channel * 4),
            &plan,
            |b, plan| {
                let mut core = RenderCore::new(
                    Arc::clone(plan),
                    &settings,
                    4,
                    BLOCK,
                    PlaybackClock::new(SAMPLE_RATE),
                    None,
                );
                b.iter(|| black_box(core.render(BLOCK)));
            },
        );
    }
    group.finish();
}

/// Offline export speed, ten seconds of a dense polyrhythm
fn bench_offline_render(c: &mut Criterion) {
    let config = dense_config(2);
    let mut renderer = OfflineRenderer::new(EngineSettings::default());

    c.bench_function("offline_render_10s", |b| {
        b.iter(|| black_box(renderer.render_samples(&config, 10.0).unwrap().summary.events));
    });
}

criterion_group!(
    benches,
    bench_mixer_instances,
    bench_scheduler_advance,
    bench_render_block,
    bench_offline_render
);
criterion_main!(benches);
