// Sequencer module - tempo arithmetic, playback plans and per-layer scheduling

pub mod plan;
pub mod scheduler;
pub mod timing;

pub use plan::{PlanBuild, PlaybackPlan, ResolvedLayer, SkippedLayer};
pub use scheduler::{LayerCursor, ScheduledEvent, Scheduler};
pub use timing::{Meter, notes_per_beat};
