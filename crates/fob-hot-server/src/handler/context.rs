//! Context/continuation adapter.
//!
//! Renderers return `Result<Response, RenderAbort>`. When the latest build
//! failed the request is aborted with the build error, which axum turns into
//! an error response.

use super::CreateHandler;
use crate::error::SharedError;
use crate::server::HotServer;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::future::{self, BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Renderer shape served by [`ContextHandler`].
pub type ContextRenderer =
    Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Result<Response, RenderAbort>> + Send + Sync>;

/// Wrap an async function as a [`ContextRenderer`].
pub fn context_renderer<F, Fut>(render: F) -> ContextRenderer
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, RenderAbort>> + Send + 'static,
{
    Arc::new(move |request: Request, next: Next| render(request, next).boxed())
}

/// Framework-level abort of a request.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RenderAbort {
    status: StatusCode,
    message: String,
    error: Option<SharedError>,
}

impl RenderAbort {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The build error behind this abort, if it came from the live state.
    pub fn error(&self) -> Option<&SharedError> {
        self.error.as_ref()
    }
}

impl From<SharedError> for RenderAbort {
    fn from(error: SharedError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
            error: Some(error),
        }
    }
}

impl IntoResponse for RenderAbort {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}

/// Adapter aborting requests while the latest build cannot serve.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextHandler;

impl CreateHandler for ContextHandler {
    type Renderer = ContextRenderer;
    type Args = (Request, Next);
    type Output = BoxFuture<'static, Result<Response, RenderAbort>>;

    fn export_shape(&self) -> &'static str {
        "(options) => async (ctx, next) => Result<Response, RenderAbort>"
    }

    fn dispatch(
        &self,
        current: Result<ContextRenderer, SharedError>,
        (request, next): (Request, Next),
    ) -> Self::Output {
        tracing::debug!("Receive request {}", request.uri());

        match current {
            Ok(renderer) => renderer(request, next),
            Err(error) => future::ready(Err(RenderAbort::from(error))).boxed(),
        }
    }
}

/// Axum middleware serving requests through a context-style [`HotServer`].
pub async fn context_middleware(
    State(server): State<HotServer<ContextHandler>>,
    request: Request,
    next: Next,
) -> Result<Response, RenderAbort> {
    server.dispatch((request, next)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HotServerError;
    use crate::stats::BuildDiagnostic;

    #[test]
    fn test_abort_from_build_error() {
        let error = Arc::new(HotServerError::Compile(BuildDiagnostic::new("boom")));
        let abort = RenderAbort::from(Arc::clone(&error));

        assert_eq!(abort.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(abort.message(), "boom");
        assert!(Arc::ptr_eq(abort.error().unwrap(), &error));
    }

    #[test]
    fn test_abort_into_response() {
        let response = RenderAbort::new(StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
