// Configuration persistence - JSON documents with defaults and legacy migration

use serde_json::{Map, Value};
use std::path::Path;

use crate::config::types::RhythmConfiguration;
use crate::config::validation::validate;
use crate::error::EngineError;

/// Result of loading a configuration document
#[derive(Debug, Clone)]
pub struct LoadedConfiguration {
    pub config: RhythmConfiguration,
    /// Whether the document used the legacy two-ear layout
    pub migrated: bool,
}

/// Parses a configuration document, applying defaults for missing fields.
///
/// The result is validated; a document that parses but cannot be scheduled is
/// reported as `InvalidConfiguration`.
pub fn from_json_str(json: &str) -> Result<LoadedConfiguration, EngineError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| EngineError::ConfigFormat(e.to_string()))?;
    let (value, migrated) = migrate_legacy_layout(value)?;
    reject_non_positive_counts(&value)?;

    let config: RhythmConfiguration =
        serde_json::from_value(value).map_err(|e| EngineError::ConfigFormat(e.to_string()))?;
    validate(&config)?;

    Ok(LoadedConfiguration { config, migrated })
}

pub fn to_json_string(config: &RhythmConfiguration) -> Result<String, EngineError> {
    serde_json::to_string_pretty(config).map_err(|e| EngineError::ConfigFormat(e.to_string()))
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<LoadedConfiguration, EngineError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        EngineError::ConfigIo(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let loaded = from_json_str(&json)?;

    if loaded.migrated {
        log::info!(
            "Migrated legacy two-channel layout in {}",
            path.display()
        );
    }

    Ok(loaded)
}

pub fn save_to_file<P: AsRef<Path>>(
    config: &RhythmConfiguration,
    path: P,
) -> Result<(), EngineError> {
    let path = path.as_ref();
    let json = to_json_string(config)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::ConfigIo(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
    }

    std::fs::write(path, json)
        .map_err(|e| EngineError::ConfigIo(format!("Failed to write {}: {}", path.display(), e)))
}

/// Numeric counts at or below zero are invalid values, not malformed documents
fn reject_non_positive_counts(value: &Value) -> Result<(), EngineError> {
    let non_positive = |v: &Value| v.as_f64().is_some_and(|n| n <= 0.0);

    if value.get("beats_per_measure").is_some_and(non_positive) {
        return Err(EngineError::invalid("beats_per_measure must be > 0"));
    }

    let channels = value.get("channels").and_then(Value::as_array);
    for (channel, bus) in channels.into_iter().flatten().enumerate() {
        let layers = bus.get("layers").and_then(Value::as_array);
        for layer in layers.into_iter().flatten() {
            if let Some(subdivision) = layer.get("subdivision").filter(|v| non_positive(*v)) {
                return Err(EngineError::invalid(format!(
                    "Layer on channel {}: subdivision must be > 0, got {}",
                    channel, subdivision
                )));
            }
        }
    }
    Ok(())
}

/// Rewrites `{"left": [...], "right": [...]}` into `{"channels": [{"layers": [...]}, ...]}`
fn migrate_legacy_layout(value: Value) -> Result<(Value, bool), EngineError> {
    let mut object = match value {
        Value::Object(object) => object,
        _ => {
            return Err(EngineError::ConfigFormat(
                "Configuration must be a JSON object".to_string(),
            ));
        }
    };

    if object.contains_key("channels")
        || !(object.contains_key("left") || object.contains_key("right"))
    {
        return Ok((Value::Object(object), false));
    }

    let mut channels = Vec::with_capacity(2);
    for ear in ["left", "right"] {
        let layers = object.remove(ear).unwrap_or_else(|| Value::Array(Vec::new()));
        if !layers.is_array() {
            return Err(EngineError::ConfigFormat(format!(
                "Legacy field '{}' must be an array of layers",
                ear
            )));
        }
        let mut bus = Map::new();
        bus.insert("layers".to_string(), layers);
        channels.push(Value::Object(bus));
    }
    object.insert("channels".to_string(), Value::Array(channels));

    Ok((Value::Object(object), true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DrumVoice, Layer, SoundSource};
    use tempfile::tempdir;

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded = from_json_str(
            r#"{"channels": [{"layers": [{"sound_source": {"kind": "drum", "params": {"voice": "kick"}}}]}]}"#,
        )
        .unwrap();
        let config = loaded.config;

        assert!(!loaded.migrated);
        assert_eq!(config.bpm, 120.0);
        assert_eq!(config.beats_per_measure, 4);
        assert_eq!(config.accent_factor, 1.6);

        let layer = &config.channels[0].layers[0];
        assert_eq!(layer.subdivision, 4);
        assert_eq!(layer.volume, 1.0);
        assert!(!layer.muted);
        assert_eq!(layer.accent_multiplier, None);
        assert_eq!(layer.sound_source, SoundSource::drum(DrumVoice::Kick));
    }

    #[test]
    fn test_empty_document() {
        let config = from_json_str("{}").unwrap().config;
        assert_eq!(config.channels.len(), 2);
        assert!(config.is_empty());
    }

    #[test]
    fn test_legacy_layout_migration() {
        let loaded = from_json_str(
            r#"{"bpm": 90, "left": [{"subdivision": 3}], "right": [{"subdivision": 8}, {"subdivision": 5}]}"#,
        )
        .unwrap();

        assert!(loaded.migrated);
        assert_eq!(loaded.config.bpm, 90.0);
        assert_eq!(loaded.config.channels.len(), 2);
        assert_eq!(loaded.config.channels[0].layers[0].subdivision, 3);
        assert_eq!(loaded.config.channels[1].layers.len(), 2);
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            from_json_str("[1, 2]"),
            Err(EngineError::ConfigFormat(_))
        ));
        assert!(matches!(
            from_json_str(r#"{"bpm": 0}"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            from_json_str(r#"{"channels": [{"layers": [{"subdivision": -4}]}]}"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            from_json_str(r#"{"left": [{"subdivision": 3}], "right": [{"subdivision": -1.5}]}"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            from_json_str(r#"{"beats_per_measure": -3}"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
        // Still a type error: not a count at all
        assert!(matches!(
            from_json_str(r#"{"channels": [{"layers": [{"subdivision": "four"}]}]}"#),
            Err(EngineError::ConfigFormat(_))
        ));
    }

    #[test]
    fn test_save_load_preserves_ids_and_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("rhythm.json");

        let mut config = RhythmConfiguration::default();
        let first = config
            .add_layer(0, Layer::new(4, SoundSource::tone(440.0)))
            .unwrap();
        let second = config
            .add_layer(0, Layer::new(3, SoundSource::tick("wood")).with_accent_multiplier(2.0))
            .unwrap();
        let third = config
            .add_layer(1, Layer::new(16, SoundSource::file("samples/clap.wav")).muted(true))
            .unwrap();

        save_to_file(&config, &path).unwrap();
        let loaded = load_from_file(&path).unwrap().config;

        assert_eq!(loaded, config);
        assert_eq!(loaded.channels[0].layers[0].id, first);
        assert_eq!(loaded.channels[0].layers[1].id, second);
        assert_eq!(loaded.channels[1].layers[0].id, third);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_from_file("/definitely/not/here.json");
        assert!(matches!(result, Err(EngineError::ConfigIo(_))));
    }
}
