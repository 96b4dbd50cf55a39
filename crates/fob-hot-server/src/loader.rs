//! Turns freshly built server code into a live renderer.
//!
//! The server artifact is expected to export a *factory*: a callable taking
//! the renderer options (build stats plus caller options) and returning the
//! request renderer. Loading validates both stages:
//!
//! ```text
//! evaluate(filename, source) ──▶ export ──unwrap default──▶ Factory
//!                                                              │ (options)
//!                                                              ▼
//!                                                           Renderer
//! ```

use crate::error::{BoxError, HotServerError, LoadError, Result};
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

/// Options handed once to the exported factory.
pub type RendererOptions = Map<String, Value>;

/// Factory exported by a server artifact.
pub type RendererFactory<R> =
    Arc<dyn Fn(RendererOptions) -> Result<ExportValue<R>, BoxError> + Send + Sync>;

/// The value a module evaluation produced.
pub enum ExportValue<R> {
    /// A callable taking renderer options
    Factory(RendererFactory<R>),
    /// A request renderer
    Renderer(R),
    /// A module namespace; ES modules carry their export under `default`
    Module {
        es_module: bool,
        default: Option<Box<ExportValue<R>>>,
    },
    /// Any non-callable value
    Value(Value),
}

impl<R> ExportValue<R> {
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(RendererOptions) -> Result<ExportValue<R>, BoxError> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(factory))
    }

    /// Wrap `value` as the default export of an ES module.
    pub fn es_module(value: ExportValue<R>) -> Self {
        Self::Module {
            es_module: true,
            default: Some(Box::new(value)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Factory(_) => "factory",
            Self::Renderer(_) => "renderer",
            Self::Module { .. } => "module",
            Self::Value(_) => "value",
        }
    }

    /// Apply the default-export interop: an ES module namespace yields its
    /// `default` export, anything else is returned unchanged.
    pub fn unwrap_default(self) -> Self {
        match self {
            Self::Module {
                es_module: true,
                default,
            } => default.map_or(Self::Value(Value::Null), |value| *value),
            other => other,
        }
    }
}

/// Evaluates built code as a module.
///
/// `filename` is the artifact's resolved path so stack traces and source maps
/// point at the right file.
pub trait ModuleEvaluator<R>: Send + Sync {
    fn evaluate(&self, filename: &Path, source: &[u8]) -> Result<ExportValue<R>, BoxError>;
}

impl<R, F> ModuleEvaluator<R> for F
where
    F: Fn(&Path, &[u8]) -> Result<ExportValue<R>, BoxError> + Send + Sync,
{
    fn evaluate(&self, filename: &Path, source: &[u8]) -> Result<ExportValue<R>, BoxError> {
        self(filename, source)
    }
}

/// Evaluate `source` and build a renderer from its exported factory.
///
/// `shape` describes the expected export in error messages. Panics raised by
/// the module or its factory are caught and reported as load errors.
pub fn load_renderer<R>(
    evaluator: &dyn ModuleEvaluator<R>,
    filename: &Path,
    source: &[u8],
    options: RendererOptions,
    shape: &'static str,
) -> Result<R> {
    let exports = guarded(|| evaluator.evaluate(filename, source))?;

    let factory = match exports.unwrap_default() {
        ExportValue::Factory(factory) => factory,
        other => {
            tracing::debug!(
                filename = %filename.display(),
                export = other.kind(),
                "Server artifact does not export a factory"
            );
            return Err(HotServerError::InvalidExport { shape });
        }
    };

    match guarded(|| factory(options))? {
        ExportValue::Renderer(renderer) => Ok(renderer),
        other => {
            tracing::debug!(
                filename = %filename.display(),
                export = other.kind(),
                "Server factory did not return a renderer"
            );
            Err(HotServerError::InvalidExport { shape })
        }
    }
}

fn guarded<T>(f: impl FnOnce() -> Result<T, BoxError>) -> Result<T, LoadError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(LoadError::Evaluation(err)),
        Err(payload) => Err(LoadError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Renderer = Arc<dyn Fn(&str) -> String + Send + Sync>;

    const SHAPE: &str = "(options) => (name) => String";

    fn greeting_factory() -> ExportValue<Renderer> {
        ExportValue::factory(|options: RendererOptions| {
            let greeting = options
                .get("greeting")
                .and_then(Value::as_str)
                .unwrap_or("Hello")
                .to_string();
            let renderer: Renderer = Arc::new(move |name: &str| format!("{greeting} {name}"));
            Ok(ExportValue::Renderer(renderer))
        })
    }

    fn exporting(
        export: impl Fn() -> ExportValue<Renderer> + Send + Sync,
    ) -> impl ModuleEvaluator<Renderer> {
        move |_: &Path, _: &[u8]| -> Result<ExportValue<Renderer>, BoxError> { Ok(export()) }
    }

    fn load(
        evaluator: &dyn ModuleEvaluator<Renderer>,
        options: RendererOptions,
    ) -> Result<Renderer> {
        load_renderer(evaluator, Path::new("/dist/main.js"), b"", options, SHAPE)
    }

    fn load_err(evaluator: &dyn ModuleEvaluator<Renderer>) -> HotServerError {
        match load(evaluator, RendererOptions::new()) {
            Ok(_) => panic!("expected loading to fail"),
            Err(err) => err,
        }
    }

    #[test]
    fn test_commonjs_factory() {
        let renderer = load(&exporting(greeting_factory), RendererOptions::new()).unwrap();
        assert_eq!(renderer("Server"), "Hello Server");
    }

    #[test]
    fn test_es_module_default_export() {
        let evaluator = exporting(|| ExportValue::es_module(greeting_factory()));
        let mut options = RendererOptions::new();
        options.insert("greeting".into(), Value::from("Hi"));

        let renderer = load(&evaluator, options).unwrap();
        assert_eq!(renderer("there"), "Hi there");
    }

    #[test]
    fn test_non_es_namespace_is_not_unwrapped() {
        let evaluator = exporting(|| ExportValue::Module {
            es_module: false,
            default: Some(Box::new(greeting_factory())),
        });
        let err = load_err(&evaluator);
        assert!(matches!(err, HotServerError::InvalidExport { .. }));
    }

    #[test]
    fn test_non_callable_export() {
        let evaluator = exporting(|| ExportValue::Value(Value::from("nope")));
        let err = load_err(&evaluator);
        assert_eq!(
            err.to_string(),
            "The 'server' compiler must export a function in the form of `(options) => (name) => String`"
        );
    }

    #[test]
    fn test_renderer_exported_directly_is_rejected() {
        let evaluator = exporting(|| {
            let renderer: Renderer = Arc::new(|name: &str| name.to_string());
            ExportValue::Renderer(renderer)
        });
        let err = load_err(&evaluator);
        assert!(matches!(err, HotServerError::InvalidExport { .. }));
    }

    #[test]
    fn test_factory_returning_non_callable() {
        let evaluator = exporting(|| ExportValue::factory(|_| Ok(ExportValue::Value(Value::Null))));
        let err = load_err(&evaluator);
        assert!(matches!(err, HotServerError::InvalidExport { shape } if shape == SHAPE));
    }

    #[test]
    fn test_empty_es_module_is_invalid() {
        let evaluator = exporting(|| ExportValue::Module {
            es_module: true,
            default: None,
        });
        let err = load_err(&evaluator);
        assert!(matches!(err, HotServerError::InvalidExport { .. }));
    }

    #[test]
    fn test_evaluation_error() {
        let evaluator = |_: &Path, _: &[u8]| -> Result<ExportValue<Renderer>, BoxError> {
            Err("¯\\_(ツ)_/¯".into())
        };
        let err = load_err(&evaluator);
        assert!(matches!(err, HotServerError::Load(LoadError::Evaluation(_))));
        assert_eq!(err.to_string(), "¯\\_(ツ)_/¯");
    }

    #[test]
    fn test_factory_panic_is_caught() {
        let evaluator = exporting(|| ExportValue::factory(|_| panic!("top-level throw")));
        let err = load_err(&evaluator);
        assert_eq!(err.to_string(), "server renderer panicked: top-level throw");
    }

    #[test]
    fn test_evaluation_panic_is_caught() {
        let evaluator = |_: &Path, _: &[u8]| -> Result<ExportValue<Renderer>, BoxError> {
            panic!("{} is not defined", "window")
        };
        let err = load_err(&evaluator);
        assert!(matches!(err, HotServerError::Load(LoadError::Panicked(_))));
        assert_eq!(err.to_string(), "server renderer panicked: window is not defined");
    }

    #[test]
    fn test_evaluator_receives_filename_and_source() {
        let evaluator = |filename: &Path, source: &[u8]| -> Result<ExportValue<Renderer>, BoxError> {
            if filename != Path::new("/dist/main.js") || source != b"export default render" {
                return Err("unexpected module".into());
            }
            Ok(greeting_factory())
        };
        let renderer = load_renderer(
            &evaluator,
            Path::new("/dist/main.js"),
            b"export default render",
            RendererOptions::new(),
            SHAPE,
        )
        .unwrap();
        assert_eq!(renderer("World"), "Hello World");
    }
}
