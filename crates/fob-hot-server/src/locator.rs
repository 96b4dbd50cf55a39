//! Resolves the emitted file that holds a chunk's JavaScript.

use crate::error::LoadError;
use crate::stats::ChunkAssets;
use indexmap::IndexMap;
use std::path::{Component, Path, PathBuf};

/// Locate the JavaScript artifact emitted for `chunk_name`.
///
/// A single filename is used as is. When source maps are generated the chunk
/// maps to several files and the first one ending in `.js` wins. Filenames
/// always resolve inside `output_path`, even when they carry a leading root.
pub fn locate_artifact(
    assets_by_chunk_name: &IndexMap<String, ChunkAssets>,
    output_path: &Path,
    chunk_name: &str,
) -> Result<PathBuf, LoadError> {
    let filename = match assets_by_chunk_name.get(chunk_name) {
        Some(ChunkAssets::Single(file)) => Some(file.as_str()),
        Some(ChunkAssets::Many(files)) => files
            .iter()
            .map(String::as_str)
            .find(|file| file.ends_with(".js")),
        None => None,
    };

    match filename {
        Some(file) if !file.is_empty() => Ok(output_path.join(relative(Path::new(file)))),
        _ => Err(LoadError::ChunkNotFound(chunk_name.to_string())),
    }
}

fn relative(file: &Path) -> PathBuf {
    file.components()
        .filter(|component| !matches!(component, Component::RootDir | Component::Prefix(_)))
        .collect()
}
