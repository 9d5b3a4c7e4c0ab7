// Error kinds for configuration, sound sources, backends and export

/// Every fallible boundary of the engine reports one of these.
///
/// Configuration and I/O failures are returned synchronously to the caller of the
/// triggering operation. Nothing in this enum ever crosses the real-time boundary:
/// the audio thread only works on pre-validated, pre-decoded data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No layers configured: every channel is empty")]
    NoLayersConfigured,

    #[error("Sound source unavailable ({name}): {reason}")]
    SoundSourceUnavailable { name: String, reason: String },

    #[error("Audio backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Render I/O error: {0}")]
    RenderIo(String),

    #[error("Configuration I/O error: {0}")]
    ConfigIo(String),

    #[error("Configuration format error: {0}")]
    ConfigFormat(String),

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidConfiguration(message.into())
    }

    pub fn source_unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::SoundSourceUnavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure only affects one layer (playback continues without it)
    pub fn is_per_layer(&self) -> bool {
        matches!(self, EngineError::SoundSourceUnavailable { .. })
    }
}
