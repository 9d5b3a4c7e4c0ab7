// Tick source - named accent/normal sample pairs from the tick directory

use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::sound::loader::load_mono;

const TICK_EXTENSIONS: [&str; 4] = ["wav", "flac", "ogg", "mp3"];

/// Decoded pair; one member may stand in for a missing other
#[derive(Debug, Clone)]
pub struct TickPair {
    pub accent: Vec<f32>,
    pub normal: Vec<f32>,
}

/// Files that make up a tick pair, as found on disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickFiles {
    pub accent: Option<PathBuf>,
    pub normal: Option<PathBuf>,
}

fn first_existing(directory: &Path, stem: &str) -> Option<PathBuf> {
    TICK_EXTENSIONS
        .iter()
        .map(|ext| directory.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
}

/// Looks for `<name>_accent.<ext>` and `<name>_normal.<ext>`; a bare
/// `<name>.<ext>` counts as the normal member.
pub fn find_tick_files(directory: &Path, name: &str) -> TickFiles {
    TickFiles {
        accent: first_existing(directory, &format!("{}_accent", name)),
        normal: first_existing(directory, &format!("{}_normal", name))
            .or_else(|| first_existing(directory, name)),
    }
}

/// Load both members of a tick pair, falling back to whichever one decodes
pub fn load_tick_pair(
    directory: &Path,
    name: &str,
    sample_rate: u32,
) -> Result<TickPair, EngineError> {
    let source_name = format!("tick:{}", name);

    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(EngineError::source_unavailable(
            source_name,
            "tick names cannot contain path separators",
        ));
    }

    let files = find_tick_files(directory, name);
    let load = |path: &Option<PathBuf>| -> Option<Vec<f32>> {
        let path = path.as_ref()?;
        match load_mono(path, sample_rate) {
            Ok(samples) => Some(samples),
            Err(e) => {
                log::warn!("Tick sample {} unusable: {}", path.display(), e);
                None
            }
        }
    };

    match (load(&files.accent), load(&files.normal)) {
        (Some(accent), Some(normal)) => Ok(TickPair { accent, normal }),
        (Some(only), None) | (None, Some(only)) => Ok(TickPair {
            accent: only.clone(),
            normal: only,
        }),
        (None, None) => Err(EngineError::source_unavailable(
            source_name,
            format!("no usable tick samples in {}", directory.display()),
        )),
    }
}
