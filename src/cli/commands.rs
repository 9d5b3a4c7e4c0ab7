//! Subcommand handlers.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::engine::Engine;
use crate::audio::export::OfflineRenderer;
use crate::config::persistence::{load_from_file, save_to_file};
use crate::config::settings::EngineSettings;
use crate::config::types::{DrumVoice, Layer, RhythmConfiguration, SoundSource};
use crate::error::EngineError;
use crate::messaging::notification::NotificationLevel;
use crate::sequencer::timing::Meter;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn load_settings(path: Option<&Path>) -> Result<EngineSettings, EngineError> {
    match path {
        Some(path) => EngineSettings::load_from_file(path),
        None => Ok(EngineSettings::default()),
    }
}

pub fn play(config: &Path, seconds: Option<f64>, settings: EngineSettings) -> Result<(), EngineError> {
    let loaded = load_from_file(config)?;
    let mut engine = Engine::new(settings)?;
    engine.set_configuration(loaded.config)?;
    engine.start()?;

    println!(
        "Playing {} on the {} backend",
        config.display(),
        engine.backend_name().unwrap_or("unknown")
    );

    let stop = Arc::new(AtomicBool::new(false));
    if seconds.is_none() {
        println!("Press Enter to stop");
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().lock().read_line(&mut line);
            stop.store(true, Ordering::Release);
        });
    }

    let started = Instant::now();
    while !stop.load(Ordering::Acquire) {
        if let Some(limit) = seconds {
            if started.elapsed().as_secs_f64() >= limit {
                break;
            }
        }

        for trigger in engine.drain_triggers() {
            log::debug!(
                "{:>8.3}s ch{} {}{}",
                trigger.time_seconds,
                trigger.channel_index,
                trigger.layer_id,
                if trigger.is_accent { " accent" } else { "" }
            );
        }
        for notification in engine.drain_notifications() {
            match notification.level {
                NotificationLevel::Error => log::error!("{}", notification.message),
                NotificationLevel::Warning => log::warn!("{}", notification.message),
                NotificationLevel::Info => log::info!("{}", notification.message),
            }
        }
        if !engine.is_running() {
            break;
        }

        thread::sleep(POLL_INTERVAL);
    }

    engine.stop();
    println!("Stopped at {:.2}s", engine.position_seconds());
    Ok(())
}

pub fn render(
    config: &Path,
    output: &Path,
    duration: f64,
    settings: EngineSettings,
) -> Result<(), EngineError> {
    let loaded = load_from_file(config)?;
    let mut renderer = OfflineRenderer::new(settings);
    let summary = renderer.render_to_file(&loaded.config, duration, output)?;

    println!(
        "Rendered {:.2}s, {} events, to {}",
        summary.duration_seconds(),
        summary.events,
        output.display()
    );
    for id in &summary.skipped_layers {
        println!("  skipped layer {}", id);
    }
    Ok(())
}

pub fn validate(path: &Path) -> Result<(), EngineError> {
    let loaded = load_from_file(path)?;
    let config = loaded.config;
    let meter = Meter::new(config.bpm, config.beats_per_measure);

    println!("{}: OK ({})", path.display(), meter);
    if loaded.migrated {
        println!("  legacy two-ear layout migrated");
    }
    for (channel, layer) in config.layers() {
        println!(
            "  ch{} {} 1/{} every {:.4}s, {}{}",
            channel,
            layer.id,
            layer.subdivision,
            meter.interval_seconds(layer.subdivision),
            layer.sound_source,
            if layer.muted { " (muted)" } else { "" }
        );
    }
    Ok(())
}

/// 4 against 3 on two channels
pub fn starter_configuration() -> Result<RhythmConfiguration, EngineError> {
    let mut config = RhythmConfiguration::with_channels(2);
    config.add_layer(0, Layer::new(4, SoundSource::drum(DrumVoice::Hihat)))?;
    config.add_layer(1, Layer::new(3, SoundSource::tone(660.0)).with_volume(0.8))?;
    Ok(config)
}

pub fn init(path: &Path) -> Result<(), EngineError> {
    if path.exists() {
        return Err(EngineError::ConfigIo(format!(
            "{} already exists",
            path.display()
        )));
    }
    save_to_file(&starter_configuration()?, path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_loadable_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("starter.json");

        init(&path).unwrap();
        let loaded = load_from_file(&path).unwrap();
        assert_eq!(loaded.config.channels.len(), 2);
        assert_eq!(loaded.config.layer_count(), 2);
        assert!(validate(&path).is_ok());

        // Never overwrites
        assert!(matches!(init(&path), Err(EngineError::ConfigIo(_))));
    }

    #[test]
    fn test_render_command() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("starter.json");
        let output = dir.path().join("out.wav");
        init(&config).unwrap();

        render(&config, &output, 1.0, EngineSettings::default()).unwrap();
        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.duration(), 44100);
    }
}
