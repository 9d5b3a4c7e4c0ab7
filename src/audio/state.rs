// Engine lifecycle state, shared lock-free between threads

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl From<u8> for EngineState {
    fn from(value: u8) -> Self {
        match value {
            1 => EngineState::Starting,
            2 => EngineState::Running,
            3 => EngineState::Stopping,
            _ => EngineState::Stopped,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Stopped => "stopped",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct AtomicEngineState {
    inner: Arc<AtomicU8>,
}

impl AtomicEngineState {
    pub fn new(state: EngineState) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(state as u8)),
        }
    }

    pub fn get(&self) -> EngineState {
        EngineState::from(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: EngineState) {
        self.inner.store(state as u8, Ordering::Release);
    }
}

impl Default for AtomicEngineState {
    fn default() -> Self {
        Self::new(EngineState::Stopped)
    }
}
