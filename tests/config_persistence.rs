// Integration test: documents on disk through to rendered audio

use polyclick::cli::commands::starter_configuration;
use polyclick::config::{load_from_file, save_to_file};
use polyclick::{EngineSettings, Layer, OfflineRenderer, RhythmConfiguration, SoundSource};
use tempfile::tempdir;

#[test]
fn test_legacy_document_renders_like_its_migration() {
    let dir = tempdir().unwrap();
    let legacy_path = dir.path().join("legacy.json");
    std::fs::write(
        &legacy_path,
        r#"{
            "bpm": 96,
            "left": [{"subdivision": 4, "sound_source": {"kind": "tone", "params": {"frequency": 440.0}}}],
            "right": [{"subdivision": 3, "sound_source": {"kind": "drum", "params": {"voice": "hihat"}}}]
        }"#,
    )
    .unwrap();

    let legacy = load_from_file(&legacy_path).unwrap();
    assert!(legacy.migrated);

    // Saving writes the current layout; reloading is no longer a migration
    let current_path = dir.path().join("current.json");
    save_to_file(&legacy.config, &current_path).unwrap();
    let current = load_from_file(&current_path).unwrap();
    assert!(!current.migrated);
    assert_eq!(current.config, legacy.config);

    let mut renderer = OfflineRenderer::new(EngineSettings::default());
    let a = renderer.render_samples(&legacy.config, 2.0).unwrap();
    let b = renderer.render_samples(&current.config, 2.0).unwrap();
    assert_eq!(a.samples, b.samples);
    assert!(a.summary.skipped_layers.is_empty());
}

#[test]
fn test_settings_sample_rate_reaches_the_render() {
    let dir = tempdir().unwrap();
    let settings_path = dir.path().join("settings.json");
    std::fs::write(&settings_path, r#"{"sample_rate": 48000}"#).unwrap();
    let settings = EngineSettings::load_from_file(&settings_path).unwrap();

    let mut renderer = OfflineRenderer::new(settings);
    let output = dir.path().join("out.wav");
    let summary = renderer
        .render_to_file(&starter_configuration().unwrap(), 1.0, &output)
        .unwrap();

    assert_eq!(summary.frames, 48000);
    let reader = hound::WavReader::open(&output).unwrap();
    assert_eq!(reader.spec().sample_rate, 48000);
}

#[test]
fn test_unknown_drum_is_a_layer_failure_not_a_document_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rhythm.json");
    std::fs::write(
        &path,
        r#"{"channels": [{"layers": [
            {"subdivision": 4},
            {"subdivision": 8, "sound_source": {"kind": "drum", "params": {"voice": "cowbell"}}}
        ]}]}"#,
    )
    .unwrap();

    let config = load_from_file(&path).unwrap().config;
    let broken = config.channels[0].layers[1].id;

    let mut renderer = OfflineRenderer::new(EngineSettings::default());
    let rendered = renderer.render_samples(&config, 1.0).unwrap();
    assert_eq!(rendered.summary.skipped_layers, vec![broken]);
    assert_eq!(rendered.summary.events, 2);
}

#[test]
fn test_ids_survive_a_round_trip_through_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rhythm.json");

    let mut config = RhythmConfiguration::with_channels(4);
    let ids: Vec<_> = (0..4)
        .map(|channel| {
            config
                .add_layer(channel, Layer::new(channel as u32 + 2, SoundSource::tone(300.0)))
                .unwrap()
        })
        .collect();
    config.move_layer(ids[3], 0).unwrap();
    save_to_file(&config, &path).unwrap();

    let loaded = load_from_file(&path).unwrap().config;
    assert_eq!(loaded.locate(ids[3]), Some((0, 1)));
    assert!(loaded.channels[3].layers.is_empty());
    assert_eq!(loaded, config);
}
