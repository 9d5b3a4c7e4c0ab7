// Scheduler - per-layer trigger times and accent flags
// Pure function of the playback plan and the playback clock

use crate::config::types::LayerId;
use crate::sequencer::plan::PlaybackPlan;

/// Slack used when re-deriving a trigger time from the clock, so a grid point
/// that is "now" up to float error is not pushed a whole interval later
pub const REINIT_EPSILON_SECONDS: f64 = 1e-9;

/// One due trigger, produced and consumed within the same block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub channel_index: usize,
    pub layer_id: LayerId,
    /// Index into `PlaybackPlan::layers`
    pub layer_slot: usize,
    pub trigger_time_seconds: f64,
    pub trigger_sample: u64,
    pub is_accent: bool,
}

/// Scheduling state for one layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerCursor {
    pub layer_id: LayerId,
    pub interval_seconds: f64,
    pub next_trigger_time: f64,
}

/// First point of the layer grid at or after `now`, never earlier than `now`
pub fn first_trigger_at_or_after(now: f64, interval: f64) -> f64 {
    let grid = ((now - REINIT_EPSILON_SECONDS) / interval).ceil() * interval;
    grid.max(now)
}

/// Whether a trigger at `trigger_sample` lies within `tolerance` samples of a
/// measure boundary, on either side
#[inline]
pub fn is_accent(trigger_sample: u64, measure_samples: f64, tolerance: f64) -> bool {
    let phase = (trigger_sample as f64) % measure_samples;
    phase <= tolerance || measure_samples - phase <= tolerance
}

pub struct Scheduler {
    sample_rate: f64,
    accent_tolerance_samples: f64,
    measure_samples: f64,
    /// Index-aligned with the current plan's layers
    cursors: Vec<LayerCursor>,
}

impl Scheduler {
    pub fn new(
        plan: &PlaybackPlan,
        sample_rate: u32,
        accent_tolerance_samples: f64,
        now_seconds: f64,
    ) -> Self {
        let sample_rate = sample_rate as f64;
        let cursors = plan
            .layers
            .iter()
            .map(|layer| LayerCursor {
                layer_id: layer.id,
                interval_seconds: layer.interval_seconds,
                next_trigger_time: first_trigger_at_or_after(now_seconds, layer.interval_seconds),
            })
            .collect();

        Self {
            sample_rate,
            accent_tolerance_samples,
            measure_samples: plan.meter.measure_samples(sample_rate),
            cursors,
        }
    }

    pub fn next_trigger_time(&self, id: LayerId) -> Option<f64> {
        self.cursors
            .iter()
            .find(|cursor| cursor.layer_id == id)
            .map(|cursor| cursor.next_trigger_time)
    }

    /// Earliest pending trigger across all layers
    pub fn next_due_time(&self) -> Option<f64> {
        self.cursors
            .iter()
            .map(|cursor| cursor.next_trigger_time)
            .min_by(|a, b| a.total_cmp(b))
    }

    #[inline]
    pub fn to_sample(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate).round().max(0.0) as u64
    }

    /// Emit every trigger whose sample lies before `end_sample`, ordered by
    /// sample then layer slot, advancing each cursor by its interval after emitting.
    ///
    /// Cutting the timeline into windows of any size yields the same sequence.
    /// Allocation-free; safe to call from the audio thread.
    pub fn advance<F>(&mut self, plan: &PlaybackPlan, end_sample: u64, mut emit: F)
    where
        F: FnMut(ScheduledEvent),
    {
        loop {
            let mut due: Option<(usize, u64)> = None;
            for (slot, cursor) in self.cursors.iter().enumerate() {
                let sample = self.to_sample(cursor.next_trigger_time);
                if sample < end_sample && due.is_none_or(|(_, earliest)| sample < earliest) {
                    due = Some((slot, sample));
                }
            }
            let Some((slot, trigger_sample)) = due else {
                break;
            };

            let layer = &plan.layers[slot];
            let cursor = &mut self.cursors[slot];
            emit(ScheduledEvent {
                channel_index: layer.channel,
                layer_id: layer.id,
                layer_slot: slot,
                trigger_time_seconds: cursor.next_trigger_time,
                trigger_sample,
                is_accent: is_accent(
                    trigger_sample,
                    self.measure_samples,
                    self.accent_tolerance_samples,
                ),
            });
            cursor.next_trigger_time += cursor.interval_seconds;
        }
    }

    /// Collect the triggers in `[.., end_seconds)`; allocating, for offline use and tests
    pub fn events_until(&mut self, plan: &PlaybackPlan, end_seconds: f64) -> Vec<ScheduledEvent> {
        let end_sample = self.to_sample(end_seconds);
        let mut events = Vec::new();
        self.advance(plan, end_sample, |event| events.push(event));
        events
    }

    /// Switch to `plan` at clock position `now_seconds`.
    ///
    /// Layers whose id and interval are unchanged keep their pending trigger, so
    /// editing one layer never shifts another. New or retimed layers restart on
    /// their grid at the first point not earlier than `now`, which rules out both
    /// retroactive triggers and a burst of catch-up events.
    ///
    /// `spare` becomes the new cursor storage; the old storage is returned so the
    /// caller can release it off the audio thread. With enough spare capacity this
    /// does not allocate.
    pub fn reconfigure(
        &mut self,
        plan: &PlaybackPlan,
        now_seconds: f64,
        mut spare: Vec<LayerCursor>,
    ) -> Vec<LayerCursor> {
        spare.clear();

        for layer in &plan.layers {
            let kept = self
                .cursors
                .iter()
                .find(|cursor| {
                    cursor.layer_id == layer.id
                        && cursor.interval_seconds.to_bits() == layer.interval_seconds.to_bits()
                })
                .map(|cursor| cursor.next_trigger_time.max(now_seconds));

            spare.push(LayerCursor {
                layer_id: layer.id,
                interval_seconds: layer.interval_seconds,
                next_trigger_time: kept.unwrap_or_else(|| {
                    first_trigger_at_or_after(now_seconds, layer.interval_seconds)
                }),
            });
        }

        self.measure_samples = plan.meter.measure_samples(self.sample_rate);
        std::mem::replace(&mut self.cursors, spare)
    }
}
