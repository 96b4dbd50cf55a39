//! Request/continuation adapter.
//!
//! Renderers receive the request and the pipeline continuation and produce
//! the response, optionally by deferring to `next`. When the latest build
//! failed, the request goes to `next` with a [`RenderError`] extension.

use super::{CreateHandler, RenderError};
use crate::error::SharedError;
use crate::server::HotServer;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

/// Renderer shape served by [`ConnectHandler`].
pub type ConnectRenderer = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wrap an async function as a [`ConnectRenderer`].
pub fn connect_renderer<F, Fut>(render: F) -> ConnectRenderer
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |request: Request, next: Next| render(request, next).boxed())
}

/// Default adapter: errors go to the next stage of the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectHandler;

impl CreateHandler for ConnectHandler {
    type Renderer = ConnectRenderer;
    type Args = (Request, Next);
    type Output = BoxFuture<'static, Response>;

    fn export_shape(&self) -> &'static str {
        "(options) => (req, next) => Response"
    }

    fn dispatch(
        &self,
        current: Result<ConnectRenderer, SharedError>,
        (mut request, next): (Request, Next),
    ) -> Self::Output {
        tracing::debug!("Receive request {}", request.uri());

        match current {
            Ok(renderer) => renderer(request, next),
            Err(error) => {
                request.extensions_mut().insert(RenderError(error));
                next.run(request).boxed()
            }
        }
    }
}

/// Axum middleware serving requests through a [`HotServer`].
///
/// ```rust,ignore
/// let app = Router::new()
///     .fallback(render_error)
///     .layer(axum::middleware::from_fn_with_state(hot, connect_middleware));
/// ```
pub async fn connect_middleware(
    State(server): State<HotServer<ConnectHandler>>,
    request: Request,
    next: Next,
) -> Response {
    server.dispatch((request, next)).await
}
