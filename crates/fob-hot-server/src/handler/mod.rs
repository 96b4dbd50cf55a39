//! Adapters between the live renderer and an HTTP framework.
//!
//! The state machine knows nothing about the framework serving requests.
//! A [`CreateHandler`] decides what a renderer looks like and what to do when
//! the latest build cannot serve. Two adapters ship with the crate:
//!
//! - [`ConnectHandler`] (default): request + continuation. Errors are handed
//!   to the next stage of the pipeline.
//! - [`ContextHandler`]: request + continuation with a fallible result. Errors
//!   abort the request with a framework-level error response.
//!
//! Other frameworks plug in by implementing [`CreateHandler`].

pub mod connect;
pub mod context;

pub use connect::{connect_middleware, connect_renderer, ConnectHandler, ConnectRenderer};
pub use context::{context_middleware, context_renderer, ContextHandler, ContextRenderer, RenderAbort};

use crate::error::{HotServerError, SharedError};
use std::fmt;
use std::ops::Deref;

/// Dispatches requests to the live renderer.
pub trait CreateHandler: Send + Sync + 'static {
    /// Callable produced by the server artifact's factory.
    type Renderer: Clone + Send + Sync + 'static;

    /// Framework arguments of one request.
    type Args;

    /// What the framework expects back.
    type Output;

    /// Export shape quoted when an artifact exports something else.
    fn export_shape(&self) -> &'static str;

    /// Serve one request from the current renderer, or hand `Err` onward.
    fn dispatch(&self, current: Result<Self::Renderer, SharedError>, args: Self::Args)
        -> Self::Output;
}

/// Build error attached to a request passed to the next stage.
///
/// Downstream error handlers read it from the request extensions.
#[derive(Debug, Clone)]
pub struct RenderError(pub SharedError);

impl RenderError {
    pub fn error(&self) -> &HotServerError {
        &self.0
    }
}

impl Deref for RenderError {
    type Target = HotServerError;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
