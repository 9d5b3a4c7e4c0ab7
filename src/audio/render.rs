// Render core - scheduler, mixer and clock driven one block at a time
//
// Every backend and the offline renderer run this exact code path, so what is
// heard live and what gets exported come from the same computation.

use std::sync::Arc;

use crate::audio::mixer::Mixer;
use crate::audio::timing::PlaybackClock;
use crate::config::settings::EngineSettings;
use crate::messaging::channels::TriggerProducer;
use crate::messaging::command::{PlanUpdate, TriggerNotification};
use crate::sequencer::plan::PlaybackPlan;
use crate::sequencer::scheduler::Scheduler;

pub struct RenderCore {
    plan: Arc<PlaybackPlan>,
    scheduler: Scheduler,
    mixer: Mixer,
    clock: PlaybackClock,
    triggers: Option<TriggerProducer>,
    events_fired: u64,
    triggers_dropped: u64,
}

impl RenderCore {
    /// Scheduling starts from the clock's current position
    pub fn new(
        plan: Arc<PlaybackPlan>,
        settings: &EngineSettings,
        bus_count: usize,
        max_block: usize,
        clock: PlaybackClock,
        triggers: Option<TriggerProducer>,
    ) -> Self {
        let scheduler = Scheduler::new(
            &plan,
            settings.sample_rate,
            settings.accent_tolerance_samples,
            clock.position_seconds(),
        );
        Self {
            plan,
            scheduler,
            mixer: Mixer::new(bus_count, settings.max_instances, max_block),
            clock,
            triggers,
            events_fired: 0,
            triggers_dropped: 0,
        }
    }

    pub fn plan(&self) -> &Arc<PlaybackPlan> {
        &self.plan
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn bus_count(&self) -> usize {
        self.mixer.bus_count()
    }

    pub fn max_block(&self) -> usize {
        self.mixer.max_block()
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate() as u32
    }

    pub fn position_samples(&self) -> u64 {
        self.clock.current_sample()
    }

    /// Events that reached the mixer (muted layers excluded)
    pub fn events_fired(&self) -> u64 {
        self.events_fired
    }

    /// Visual notifications lost to a full trigger queue
    pub fn triggers_dropped(&self) -> u64 {
        self.triggers_dropped
    }

    pub fn next_due_sample(&self) -> Option<u64> {
        self.scheduler
            .next_due_time()
            .map(|time| self.scheduler.to_sample(time))
    }

    /// Render the window `[clock, clock + frames)` into the mixer's buses and
    /// advance the clock. `frames` is capped at the mixer block size.
    pub fn render(&mut self, frames: usize) -> usize {
        let frames = frames.min(self.mixer.max_block());
        if frames == 0 {
            return 0;
        }

        let start = self.clock.current_sample();
        let end = start + frames as u64;

        let plan: &PlaybackPlan = &self.plan;
        let mixer = &mut self.mixer;
        let triggers = &mut self.triggers;
        let mut fired = 0u64;
        let mut dropped = 0u64;

        self.scheduler.advance(plan, end, |event| {
            let layer = &plan.layers[event.layer_slot];
            if layer.muted {
                return;
            }

            let offset = event.trigger_sample.saturating_sub(start) as usize;
            let amplitude = layer.amplitude(event.is_accent, plan.master_volume);
            if !mixer.trigger(
                layer.buffer(event.is_accent),
                amplitude,
                event.channel_index,
                offset,
            ) {
                return;
            }
            fired += 1;

            if let Some(tx) = triggers.as_mut() {
                let notification = TriggerNotification {
                    channel_index: event.channel_index,
                    layer_id: event.layer_id,
                    is_accent: event.is_accent,
                    time_seconds: event.trigger_time_seconds,
                };
                if ringbuf::traits::Producer::try_push(tx, notification).is_err() {
                    dropped += 1;
                }
            }
        });

        self.mixer.mix(frames);
        self.clock.advance(frames);
        self.events_fired += fired;
        self.triggers_dropped += dropped;
        frames
    }

    /// Swap in `update.plan`, leaving the retired plan and cursor storage in `update`
    pub fn swap_plan(&mut self, update: &mut PlanUpdate) {
        let now = self.clock.position_seconds();
        let spare = std::mem::take(&mut update.cursors);
        update.cursors = self.scheduler.reconfigure(&update.plan, now, spare);
        std::mem::swap(&mut self.plan, &mut update.plan);
    }

    /// Silence every sounding instance
    pub fn release_all(&mut self) {
        self.mixer.clear();
    }

    /// Advance the clock without producing audio
    pub fn skip(&mut self, frames: usize) {
        self.clock.advance(frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{Layer, RhythmConfiguration, SoundSource};
    use crate::messaging::channels::create_trigger_channel;
    use crate::sound::cache::SoundSourceCache;
    use ringbuf::traits::Consumer;

    fn plan_for(config: &RhythmConfiguration) -> Arc<PlaybackPlan> {
        let mut cache = SoundSourceCache::new(44100, "ticks");
        Arc::new(PlaybackPlan::build(config, &mut cache).unwrap().plan)
    }

    fn two_layer_config() -> RhythmConfiguration {
        let mut config = RhythmConfiguration::default();
        config.add_layer(0, Layer::new(4, SoundSource::tone(440.0))).unwrap();
        config.add_layer(1, Layer::new(8, SoundSource::tone(880.0))).unwrap();
        config
    }

    #[test]
    fn test_render_fires_and_notifies() {
        let config = two_layer_config();
        let (tx, mut rx) = create_trigger_channel(64);
        let mut core = RenderCore::new(
            plan_for(&config),
            &EngineSettings::default(),
            2,
            256,
            PlaybackClock::new(44100),
            Some(tx),
        );

        // One second: 2 quarter notes and 4 eighth notes at 120 BPM
        let mut remaining = 44100usize;
        while remaining > 0 {
            remaining -= core.render(remaining.min(256));
        }

        let fired: Vec<TriggerNotification> = rx.pop_iter().collect();
        assert_eq!(fired.iter().filter(|t| t.channel_index == 0).count(), 2);
        assert_eq!(fired.iter().filter(|t| t.channel_index == 1).count(), 4);
        assert!(fired[0].is_accent);
        assert_eq!(core.events_fired(), 6);
        assert_eq!(core.position_samples(), 44100);
    }

    #[test]
    fn test_first_block_starts_with_sound() {
        let config = two_layer_config();
        let mut core = RenderCore::new(
            plan_for(&config),
            &EngineSettings::default(),
            2,
            64,
            PlaybackClock::new(44100),
            None,
        );
        core.render(64);
        assert!(core.mixer().bus(0).iter().any(|&s| s != 0.0));
        assert!(core.mixer().bus(1).iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_muted_layer_is_silent_but_scheduled() {
        let mut config = two_layer_config();
        let muted = config.channels[0].layers[0].id;
        config.layer_mut(muted).unwrap().muted = true;

        let mut core = RenderCore::new(
            plan_for(&config),
            &EngineSettings::default(),
            2,
            256,
            PlaybackClock::new(44100),
            None,
        );
        core.render(256);

        assert!(core.mixer().bus(0).iter().all(|&s| s == 0.0));
        assert!(core.mixer().bus(1).iter().any(|&s| s != 0.0));
        assert_eq!(core.scheduler().next_trigger_time(muted), Some(0.5));
    }

    #[test]
    fn test_swap_plan_returns_retired_state() {
        let config = two_layer_config();
        let first = plan_for(&config);
        let mut core = RenderCore::new(
            first.clone(),
            &EngineSettings::default(),
            2,
            256,
            PlaybackClock::new(44100),
            None,
        );
        core.render(256);

        let mut faster = config.clone();
        faster.bpm = 180.0;
        let mut update = PlanUpdate::new(plan_for(&faster));
        core.swap_plan(&mut update);

        assert!(Arc::ptr_eq(&update.plan, &first));
        assert_eq!(update.cursors.len(), 2);
        assert_eq!(core.plan().meter.bpm(), 180.0);
        let now = 256.0 / 44100.0;
        assert!(core.next_due_sample().unwrap() as f64 / 44100.0 >= now - 1e-9);
    }
}
