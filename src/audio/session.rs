// Audio session - everything the real-time context owns while playing
//
// Moved wholesale into a cpal callback or a backend thread. Nothing in here
// allocates, blocks or performs I/O once constructed.

use std::panic::{self, AssertUnwindSafe};

use ringbuf::traits::{Consumer, Producer};

use crate::audio::render::RenderCore;
use crate::messaging::channels::{CommandConsumer, GarbageProducer};
use crate::messaging::command::Command;

pub struct AudioSession {
    core: RenderCore,
    commands: CommandConsumer,
    garbage: GarbageProducer,
    /// One block of bus-interleaved frames
    scratch: Vec<f32>,
    contained_panics: u64,
}

impl AudioSession {
    pub fn new(core: RenderCore, commands: CommandConsumer, garbage: GarbageProducer) -> Self {
        let scratch = vec![0.0; core.max_block() * core.bus_count()];
        Self {
            core,
            commands,
            garbage,
            scratch,
            contained_panics: 0,
        }
    }

    pub fn bus_count(&self) -> usize {
        self.core.bus_count()
    }

    pub fn max_block(&self) -> usize {
        self.core.max_block()
    }

    pub fn sample_rate(&self) -> u32 {
        self.core.sample_rate()
    }

    pub fn position_samples(&self) -> u64 {
        self.core.position_samples()
    }

    pub fn next_due_sample(&self) -> Option<u64> {
        self.core.next_due_sample()
    }

    pub fn core(&self) -> &RenderCore {
        &self.core
    }

    /// Blocks replaced by silence after a panic inside rendering
    pub fn contained_panics(&self) -> u64 {
        self.contained_panics
    }

    /// Apply every pending command from the control thread
    pub fn apply_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                Command::SwapPlan(mut update) => {
                    self.core.swap_plan(&mut update);
                    // A full garbage queue means the control thread stopped
                    // collecting; releasing here is the only option left.
                    let _ = self.garbage.try_push(update);
                }
                Command::ReleaseAll => self.core.release_all(),
            }
        }
    }

    /// Render up to one block and return it as bus-interleaved frames.
    ///
    /// A panic inside rendering is contained: the block comes out silent, all
    /// instances are released and the clock still moves forward.
    pub fn render_block(&mut self, frames: usize) -> &[f32] {
        let frames = frames.min(self.core.max_block());
        let samples = frames * self.core.bus_count();
        let start = self.core.position_samples();

        let core = &mut self.core;
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| core.render(frames)));

        match rendered {
            Ok(_) => self.core.mixer().interleave_into(&mut self.scratch[..samples]),
            Err(_) => {
                self.contained_panics += 1;
                self.core.release_all();
                if self.core.position_samples() == start {
                    self.core.skip(frames);
                }
                self.scratch[..samples].fill(0.0);
            }
        }

        &self.scratch[..samples]
    }
}
