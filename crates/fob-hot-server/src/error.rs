//! Error types for the hot server.
//!
//! Errors fall into two groups:
//! - **Setup errors** (`ConfigurationError`) are returned synchronously from
//!   [`HotServer::new`](crate::HotServer::new) and are never retried.
//! - **Build errors** (`HotServerError`) are captured by the state machine and
//!   handed to every request until the next build replaces them.

use crate::stats::BuildDiagnostic;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by module evaluators and renderer factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Build error shared between the live state and in-flight requests.
pub type SharedError = Arc<HotServerError>;

pub type Result<T, E = HotServerError> = std::result::Result<T, E>;

/// Setup-time errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The handle does not expose a collection of named compilation units
    #[error("Expected compiler to contain both a 'client' and 'server' config")]
    NotMultiCompiler,

    /// No compilation unit matches the required role
    #[error("Expected a compiler named '{0}'")]
    MissingCompiler(String),

    /// The compiler offers neither a done hook nor plugin registration
    #[error("Compiler does not provide a 'done' notification")]
    NoDoneNotification,

    /// Invalid value while loading configuration
    #[error("invalid hot server configuration: {0}")]
    InvalidValue(String),
}

/// Errors produced while turning a build into a live renderer.
#[derive(Debug, Error)]
pub enum HotServerError {
    /// The server compilation reported errors
    #[error("{0}")]
    Compile(BuildDiagnostic),

    /// The artifact does not export a renderer factory
    #[error("The 'server' compiler must export a function in the form of `{shape}`")]
    InvalidExport {
        /// Expected export shape for the active handler adapter
        shape: &'static str,
    },

    /// Reading or evaluating the artifact failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A request arrived before any build completed
    #[error("fob-hot-server reached before the compiler finished compiling.")]
    NotReady,
}

impl HotServerError {
    /// The compile diagnostic, if this is a compile error.
    pub fn diagnostic(&self) -> Option<&BuildDiagnostic> {
        match self {
            Self::Compile(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}

/// Failures while reading or evaluating the server artifact.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unable to find '{0}' chunk.")]
    ChunkNotFound(String),

    #[error("Unable to find stats for '{0}' compilation.")]
    MissingStats(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The module or its factory raised an error
    #[error("{0}")]
    Evaluation(BoxError),

    /// The module or its factory panicked
    #[error("server renderer panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_messages() {
        assert_eq!(
            ConfigurationError::NotMultiCompiler.to_string(),
            "Expected compiler to contain both a 'client' and 'server' config"
        );
        assert_eq!(
            ConfigurationError::MissingCompiler("server".into()).to_string(),
            "Expected a compiler named 'server'"
        );
    }

    #[test]
    fn test_compile_error_displays_diagnostic() {
        let err = HotServerError::Compile(BuildDiagnostic::named("ModuleParseError", "bad"));
        assert_eq!(err.to_string(), "ModuleParseError: bad");
        assert_eq!(err.diagnostic().map(|d| d.message.as_str()), Some("bad"));
    }

    #[test]
    fn test_load_error_is_transparent() {
        let err: HotServerError = LoadError::ChunkNotFound("main".into()).into();
        assert_eq!(err.to_string(), "Unable to find 'main' chunk.");
        assert!(err.diagnostic().is_none());
    }

    #[test]
    fn test_invalid_export_names_shape() {
        let err = HotServerError::InvalidExport {
            shape: "(options) => (req, next) => Response",
        };
        assert_eq!(
            err.to_string(),
            "The 'server' compiler must export a function in the form of `(options) => (req, next) => Response`"
        );
    }
}
