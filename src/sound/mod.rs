// Sound sources - tone, drum, file and tick buffers behind one memoizing cache

pub mod cache;
pub mod drum;
pub mod loader;
pub mod tick;
pub mod tone;

pub use cache::{SampleBuffer, SampleVariant, SoundSourceCache, SourceBuffers};
