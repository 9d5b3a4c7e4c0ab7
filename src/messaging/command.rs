// Commands - control thread → audio context

use std::sync::Arc;

use crate::config::types::LayerId;
use crate::sequencer::plan::PlaybackPlan;
use crate::sequencer::scheduler::LayerCursor;

/// A prepared plan swap.
///
/// `cursors` is empty storage with room for every layer of `plan`, so the audio
/// side can re-derive scheduler state without allocating. After the swap the same
/// box travels back on the garbage channel carrying the retired plan and cursors.
#[derive(Debug)]
pub struct PlanUpdate {
    pub plan: Arc<PlaybackPlan>,
    pub cursors: Vec<LayerCursor>,
}

impl PlanUpdate {
    pub fn new(plan: Arc<PlaybackPlan>) -> Box<Self> {
        let cursors = Vec::with_capacity(plan.layers.len());
        Box::new(Self { plan, cursors })
    }
}

#[derive(Debug)]
pub enum Command {
    SwapPlan(Box<PlanUpdate>),
    /// Silence every sounding instance
    ReleaseAll,
}

/// Fired-event notice for visual feedback, drained off the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerNotification {
    pub channel_index: usize,
    pub layer_id: LayerId,
    pub is_accent: bool,
    pub time_seconds: f64,
}
