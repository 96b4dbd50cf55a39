//! Source map support for hot-loaded server code.
//!
//! Server artifacts change on every build, so maps are read from the output
//! filesystem on every lookup instead of being cached. [`install`] registers a
//! process-wide [`SourceMapSupport`] that error reporters query through
//! [`original_position`].

use crate::compiler::OutputFileSystem;
use once_cell::sync::Lazy;
use oxc_sourcemap::SourceMap;
use parking_lot::RwLock;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static INSTALLED: Lazy<RwLock<Option<SourceMapSupport>>> = Lazy::new(|| RwLock::new(None));

/// A source map read from the output filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedSourceMap {
    /// The generated file the map belongs to
    pub url: PathBuf,
    /// Raw map JSON
    pub map: String,
}

/// Position in original source. Lines and columns are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: Option<String>,
    pub line: u32,
    pub column: u32,
    pub name: Option<String>,
}

/// Resolves generated positions through `<file>.map` siblings.
#[derive(Clone)]
pub struct SourceMapSupport {
    fs: Arc<dyn OutputFileSystem>,
}

impl SourceMapSupport {
    pub fn new(fs: Arc<dyn OutputFileSystem>) -> Self {
        Self { fs }
    }

    /// Read the map emitted next to `source`, if there is one.
    pub fn retrieve_source_map(&self, source: &Path) -> Option<RetrievedSourceMap> {
        let map_path = map_path(source);
        let bytes = self.fs.read_file(&map_path).ok()?;
        let map = String::from_utf8(bytes).ok()?;

        Some(RetrievedSourceMap {
            url: source.to_path_buf(),
            map,
        })
    }

    /// Map a generated position in `source` back to the original file.
    pub fn original_position(&self, source: &Path, line: u32, column: u32) -> Option<OriginalPosition> {
        let retrieved = self.retrieve_source_map(source)?;
        let map = match SourceMap::from_json_string(&retrieved.map) {
            Ok(map) => map,
            Err(e) => {
                tracing::debug!("Ignoring invalid source map for {}: {:?}", source.display(), e);
                return None;
            }
        };

        let lookup_table = map.generate_lookup_table();
        let token = map.lookup_token(&lookup_table, line, column)?;

        Some(OriginalPosition {
            source: token
                .get_source_id()
                .and_then(|id| map.get_source(id))
                .map(|source| source.to_string()),
            line: token.get_src_line(),
            column: token.get_src_col(),
            name: token
                .get_name_id()
                .and_then(|id| map.get_name(id))
                .map(|name| name.to_string()),
        })
    }
}

fn map_path(source: &Path) -> PathBuf {
    let mut path = OsString::from(source.as_os_str());
    path.push(".map");
    PathBuf::from(path)
}

/// Register source map support for `fs`, replacing any previous registration.
pub fn install(fs: Arc<dyn OutputFileSystem>) {
    *INSTALLED.write() = Some(SourceMapSupport::new(fs));
    tracing::debug!("Installed source map support");
}

pub fn is_installed() -> bool {
    INSTALLED.read().is_some()
}

/// Resolve a generated position through the installed support.
pub fn original_position(source: &Path, line: u32, column: u32) -> Option<OriginalPosition> {
    let support = INSTALLED.read().clone()?;
    support.original_position(source, line, column)
}
