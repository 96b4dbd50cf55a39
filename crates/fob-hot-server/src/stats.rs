//! Build statistics delivered with every done notification.
//!
//! These mirror the shape build systems report after a compilation: the
//! compilation name, its diagnostics and the files emitted per chunk.
//! [`BuildStats::to_json`] produces the camelCase JSON handed to server
//! renderers as `clientStats` / `serverStats`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single error or warning reported by a compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDiagnostic {
    /// Diagnostic class, e.g. `ModuleParseError`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human readable message
    pub message: String,

    /// Module the diagnostic points at, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl BuildDiagnostic {
    /// Create an unnamed diagnostic carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
            module: None,
        }
    }

    /// Create a diagnostic with a class name, rendered as `Name: message`.
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: message.into(),
            module: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

impl fmt::Display for BuildDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for BuildDiagnostic {}

/// Files emitted for one chunk.
///
/// Build systems report a bare filename when a chunk produced one file and a
/// list when it produced several (typically the bundle plus its source map).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkAssets {
    Single(String),
    Many(Vec<String>),
}

impl ChunkAssets {
    /// Collapse a list of filenames, keeping a bare string for exactly one.
    pub fn from_files(mut files: Vec<String>) -> Self {
        if files.len() == 1 {
            Self::Single(files.remove(0))
        } else {
            Self::Many(files)
        }
    }

    /// All filenames in emit order.
    pub fn files(&self) -> Vec<&str> {
        match self {
            Self::Single(file) => vec![file.as_str()],
            Self::Many(files) => files.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for ChunkAssets {
    fn from(file: &str) -> Self {
        Self::Single(file.to_string())
    }
}

impl From<Vec<&str>> for ChunkAssets {
    fn from(files: Vec<&str>) -> Self {
        Self::from_files(files.into_iter().map(str::to_string).collect())
    }
}

/// Immutable snapshot of one compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    /// Name of the compilation unit that produced these stats
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Errors in the order the compiler reported them
    #[serde(default)]
    pub errors: Vec<BuildDiagnostic>,

    #[serde(default)]
    pub warnings: Vec<BuildDiagnostic>,

    /// Logical chunk name to emitted filename(s)
    #[serde(default)]
    pub assets_by_chunk_name: IndexMap<String, ChunkAssets>,

    /// Any further metadata the build system reports
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BuildStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_chunk(mut self, chunk: impl Into<String>, assets: impl Into<ChunkAssets>) -> Self {
        self.assets_by_chunk_name.insert(chunk.into(), assets.into());
        self
    }

    pub fn with_error(mut self, error: BuildDiagnostic) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Serialize to the JSON object handed to server renderers.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Stats of every compilation unit for one build cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiBuildStats {
    pub stats: Vec<BuildStats>,
}

impl MultiBuildStats {
    pub fn new(stats: Vec<BuildStats>) -> Self {
        Self { stats }
    }

    /// Find the stats of the compilation with exactly this name.
    pub fn find(&self, name: &str) -> Option<&BuildStats> {
        self.stats.iter().find(|stats| stats.name == name)
    }
}
