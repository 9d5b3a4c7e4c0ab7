// Module audio - rendering core, mixer, backends and offline export

pub mod backend;
pub mod dsp_utils;
pub mod engine;
pub mod export;
pub mod format_conversion;
pub mod mixer;
pub mod render;
pub mod ring_buffer;
pub mod session;
pub mod state;
pub mod timing;
