// Engine - playback lifecycle and the control surface used by the UI layer
//
// The engine owns the configuration. Every edit builds a new immutable plan on
// the control thread (sources pre-warmed, no I/O left for the audio side) and
// publishes it through a lock-free command queue; the audio context swaps it in
// between two blocks and ships the retired plan back for release here.
//
// # Threads
//
// Control thread: every method on `Engine`. Audio context: a cpal callback, the
// ring buffer render thread or the polling thread, depending on the backend.
// The two only meet through SPSC queues and the atomic playback clock.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ringbuf::traits::{Consumer, Producer};

use crate::audio::backend::{ActiveBackend, AudioBackend, default_backends};
use crate::audio::export::{OfflineRenderer, RenderSummary};
use crate::audio::render::RenderCore;
use crate::audio::session::AudioSession;
use crate::audio::state::{AtomicEngineState, EngineState};
use crate::audio::timing::PlaybackClock;
use crate::config::settings::EngineSettings;
use crate::config::types::{Layer, LayerId, RhythmConfiguration};
use crate::config::validation::validate;
use crate::error::EngineError;
use crate::messaging::channels::{
    CommandProducer, GarbageConsumer, NotificationConsumer, SharedNotificationProducer,
    TriggerConsumer, create_command_channel, create_garbage_channel,
    create_notification_channel, create_trigger_channel, try_notify,
};
use crate::messaging::command::{Command, PlanUpdate, TriggerNotification};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sequencer::plan::{PlaybackPlan, SkippedLayer};
use crate::sound::cache::SoundSourceCache;

/// Control-thread side of a running backend
struct LiveSession {
    backend: Box<dyn ActiveBackend>,
    commands: CommandProducer,
    garbage: GarbageConsumer,
    triggers: TriggerConsumer,
    bus_count: usize,
}

impl LiveSession {
    /// Release plans retired by the audio context
    fn collect_garbage(&mut self) -> usize {
        self.garbage.pop_iter().count()
    }
}

pub struct Engine {
    settings: EngineSettings,
    configuration: RhythmConfiguration,
    cache: SoundSourceCache,
    backends: Vec<Box<dyn AudioBackend>>,
    state: AtomicEngineState,
    clock: PlaybackClock,
    live: Option<LiveSession>,
    notification_tx: SharedNotificationProducer,
    notification_rx: NotificationConsumer,
}

impl Engine {
    /// Engine with the default backend chain: cpal stream, then polling thread
    pub fn new(settings: EngineSettings) -> Result<Self, EngineError> {
        let backends = default_backends(&settings);
        Self::with_backends(settings, backends)
    }

    /// Engine trying `backends` in order on every `start()`
    pub fn with_backends(
        settings: EngineSettings,
        backends: Vec<Box<dyn AudioBackend>>,
    ) -> Result<Self, EngineError> {
        settings.validate()?;

        let (notification_tx, notification_rx) =
            create_notification_channel(settings.notification_queue_capacity);

        Ok(Self {
            cache: SoundSourceCache::new(settings.sample_rate, settings.tick_directory.clone()),
            clock: PlaybackClock::new(settings.sample_rate),
            configuration: RhythmConfiguration::default(),
            backends,
            state: AtomicEngineState::default(),
            live: None,
            notification_tx: Arc::new(Mutex::new(notification_tx)),
            notification_rx,
            settings,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state.get() == EngineState::Running
    }

    /// Name of the backend currently playing
    pub fn backend_name(&self) -> Option<&'static str> {
        self.live.as_ref().map(|live| live.backend.name())
    }

    /// Seconds rendered since the last `start()`
    pub fn position_seconds(&self) -> f64 {
        self.clock.position_seconds()
    }

    /// Copy of the current configuration
    pub fn configuration(&self) -> RhythmConfiguration {
        self.configuration.clone()
    }

    /// Replace the configuration, idle or live
    pub fn set_configuration(&mut self, config: RhythmConfiguration) -> Result<(), EngineError> {
        self.update_live(config)
    }

    /// Start playback from position zero.
    ///
    /// Fails with `NoLayersConfigured` when every channel is empty, with
    /// `InvalidConfiguration` when validation fails and with `BackendUnavailable`
    /// when no backend opens; the engine is left `Stopped` in every case.
    /// Layers whose source cannot be produced are skipped and reported.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.live.is_some() {
            return Ok(());
        }
        if self.configuration.is_empty() {
            return Err(EngineError::NoLayersConfigured);
        }

        self.state.set(EngineState::Starting);
        match self.open_session() {
            Ok(live) => {
                self.live = Some(live);
                self.state.set(EngineState::Running);
                Ok(())
            }
            Err(e) => {
                self.state.set(EngineState::Stopped);
                Err(e)
            }
        }
    }

    fn open_session(&mut self) -> Result<LiveSession, EngineError> {
        let build = PlaybackPlan::build(&self.configuration, &mut self.cache)?;
        self.report_skipped(&build.skipped);

        let plan = Arc::new(build.plan);
        let bus_count = plan.channel_count.max(1);
        self.clock.reset();

        let notifications = Arc::clone(&self.notification_tx);
        let mut failures = Vec::new();

        for backend in self.backends.iter_mut() {
            let capacity = self.settings.command_queue_capacity;
            let (command_tx, command_rx) = create_command_channel(capacity);
            let (garbage_tx, garbage_rx) = create_garbage_channel(capacity * 2);
            let (trigger_tx, trigger_rx) =
                create_trigger_channel(self.settings.trigger_queue_capacity);

            let core = RenderCore::new(
                Arc::clone(&plan),
                &self.settings,
                bus_count,
                self.settings.block_frames,
                self.clock.clone(),
                Some(trigger_tx),
            );
            let session = AudioSession::new(core, command_rx, garbage_tx);

            match backend.open(session, Arc::clone(&notifications)) {
                Ok(active) => {
                    log::info!(
                        "Playback started on {} backend: {}, {} layers on {} buses",
                        active.name(),
                        plan.meter,
                        plan.layers.len(),
                        bus_count
                    );
                    if !failures.is_empty() {
                        try_notify(
                            &notifications,
                            Notification::info(
                                NotificationCategory::Backend,
                                format!("Fell back to the {} backend", active.name()),
                            ),
                        );
                    }
                    return Ok(LiveSession {
                        backend: active,
                        commands: command_tx,
                        garbage: garbage_rx,
                        triggers: trigger_rx,
                        bus_count,
                    });
                }
                Err(e) => {
                    log::warn!("{} backend unavailable: {}", backend.name(), e);
                    try_notify(
                        &notifications,
                        Notification::warning(
                            NotificationCategory::Backend,
                            format!("{} backend unavailable: {}", backend.name(), e),
                        ),
                    );
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        let reason = if failures.is_empty() {
            "no backends configured".to_string()
        } else {
            failures.join("; ")
        };
        log::error!("No audio backend could be opened ({})", reason);
        Err(EngineError::BackendUnavailable(reason))
    }

    /// Stop playback and wait for the audio context to go quiet. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut live) = self.live.take() {
            self.state.set(EngineState::Stopping);
            let backend_name = live.backend.name();
            live.backend.stop();
            // Same as `collect_garbage`, borrowing only the field that was not moved
            live.garbage.pop_iter().count();
            log::info!(
                "Playback stopped on {} backend at {:.3}s",
                backend_name,
                self.clock.position_seconds()
            );
        }
        self.state.set(EngineState::Stopped);
    }

    /// Validate and adopt `config`. While running, the new plan is swapped in at
    /// the next block boundary and every changed layer restarts on its grid at
    /// the first point not earlier than the current position.
    pub fn update_live(&mut self, config: RhythmConfiguration) -> Result<(), EngineError> {
        validate(&config)?;

        if self.live.is_some() {
            let build = PlaybackPlan::build(&config, &mut self.cache)?;
            self.report_skipped(&build.skipped);
            let plan = Arc::new(build.plan);

            if let Some(live) = self.live.as_mut() {
                live.collect_garbage();

                if plan.channel_count > live.bus_count {
                    let message = format!(
                        "Channels beyond {} stay silent until playback restarts",
                        live.bus_count
                    );
                    log::warn!("{}", message);
                    try_notify(
                        &self.notification_tx,
                        Notification::warning(NotificationCategory::Configuration, message),
                    );
                }

                live.commands
                    .try_push(Command::SwapPlan(PlanUpdate::new(plan)))
                    .map_err(|_| {
                        EngineError::BackendUnavailable(
                            "audio context is not accepting updates".to_string(),
                        )
                    })?;
            }
        }

        self.configuration = config;
        Ok(())
    }

    fn edit<T>(
        &mut self,
        change: impl FnOnce(&mut RhythmConfiguration) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut next = self.configuration.clone();
        let value = change(&mut next)?;
        self.update_live(next)?;
        Ok(value)
    }

    pub fn add_layer(&mut self, channel: usize, layer: Layer) -> Result<LayerId, EngineError> {
        self.edit(|config| config.add_layer(channel, layer))
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Result<Layer, EngineError> {
        self.edit(|config| config.remove_layer(id))
    }

    pub fn set_mute(&mut self, id: LayerId, muted: bool) -> Result<(), EngineError> {
        self.edit(|config| {
            let layer = config
                .layer_mut(id)
                .ok_or_else(|| EngineError::UnknownLayer(id.to_string()))?;
            layer.muted = muted;
            Ok(())
        })
    }

    pub fn set_volume(&mut self, id: LayerId, volume: f32) -> Result<(), EngineError> {
        self.edit(|config| {
            let layer = config
                .layer_mut(id)
                .ok_or_else(|| EngineError::UnknownLayer(id.to_string()))?;
            layer.volume = volume;
            Ok(())
        })
    }

    /// Move a layer to the end of another channel, keeping its id
    pub fn move_layer(&mut self, id: LayerId, to_channel: usize) -> Result<(), EngineError> {
        self.edit(|config| config.move_layer(id, to_channel))
    }

    /// Silence everything currently sounding without touching the schedule
    pub fn release_all(&mut self) -> Result<(), EngineError> {
        if let Some(live) = self.live.as_mut() {
            live.commands.try_push(Command::ReleaseAll).map_err(|_| {
                EngineError::BackendUnavailable(
                    "audio context is not accepting updates".to_string(),
                )
            })?;
        }
        Ok(())
    }

    /// Fired events since the last drain, for visual feedback
    pub fn drain_triggers(&mut self) -> Vec<TriggerNotification> {
        match self.live.as_mut() {
            Some(live) => live.triggers.pop_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notification_rx.pop_iter().collect()
    }

    /// Render `config` offline for `duration_seconds` into a 16-bit stereo WAV file
    pub fn render_to_file<P: AsRef<Path>>(
        &self,
        config: &RhythmConfiguration,
        duration_seconds: f64,
        path: P,
    ) -> Result<RenderSummary, EngineError> {
        let mut renderer = OfflineRenderer::new(self.settings.clone());
        renderer.render_to_file(config, duration_seconds, path)
    }

    fn report_skipped(&self, skipped: &[SkippedLayer]) {
        for layer in skipped {
            let message = format!(
                "Layer {} on channel {} skipped: {}",
                layer.id, layer.channel, layer.error
            );
            log::warn!("{}", message);
            try_notify(
                &self.notification_tx,
                Notification::warning(NotificationCategory::SoundSource, message),
            );
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::{NullSinkProvider, PollingBackend};
    use crate::config::types::SoundSource;

    struct Unavailable;

    impl AudioBackend for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn open(
            &mut self,
            _session: AudioSession,
            _notifications: SharedNotificationProducer,
        ) -> Result<Box<dyn ActiveBackend>, EngineError> {
            Err(EngineError::BackendUnavailable("no device".to_string()))
        }
    }

    fn headless_engine() -> Engine {
        Engine::with_backends(
            EngineSettings::default(),
            vec![Box::new(PollingBackend::new(NullSinkProvider::new(2), 256))],
        )
        .unwrap()
    }

    #[test]
    fn test_start_requires_layers() {
        let mut engine = headless_engine();
        assert_eq!(engine.start(), Err(EngineError::NoLayersConfigured));
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_edits_while_idle_update_configuration() {
        let mut engine = headless_engine();
        let id = engine
            .add_layer(0, Layer::new(4, SoundSource::tone(440.0)))
            .unwrap();
        engine.set_volume(id, 0.5).unwrap();
        engine.set_mute(id, true).unwrap();
        engine.move_layer(id, 1).unwrap();

        let config = engine.configuration();
        assert!(config.channels[0].layers.is_empty());
        let layer = config.layer(id).unwrap();
        assert_eq!(layer.volume, 0.5);
        assert!(layer.muted);

        assert!(matches!(
            engine.set_volume(id, 9.0),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert_eq!(engine.configuration().layer(id).unwrap().volume, 0.5);
        assert!(matches!(
            engine.set_mute(LayerId::new(), true),
            Err(EngineError::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_all_backends_unavailable() {
        let mut engine = Engine::with_backends(
            EngineSettings::default(),
            vec![Box::new(Unavailable), Box::new(Unavailable)],
        )
        .unwrap();
        engine
            .add_layer(0, Layer::new(4, SoundSource::tone(440.0)))
            .unwrap();

        assert!(matches!(
            engine.start(),
            Err(EngineError::BackendUnavailable(_))
        ));
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(!engine.is_running());
        assert_eq!(engine.drain_notifications().len(), 2);
    }

    #[test]
    fn test_fallback_to_second_backend() {
        let mut engine = Engine::with_backends(
            EngineSettings::default(),
            vec![
                Box::new(Unavailable),
                Box::new(PollingBackend::new(NullSinkProvider::new(2), 256)),
            ],
        )
        .unwrap();
        engine
            .add_layer(0, Layer::new(4, SoundSource::tone(440.0)))
            .unwrap();

        engine.start().unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.backend_name(), Some("polling"));

        engine.stop();
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(engine.backend_name(), None);
    }
}
