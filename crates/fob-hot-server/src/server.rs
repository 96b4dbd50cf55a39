//! Compilation state machine.
//!
//! [`HotServer`] subscribes to the multi compiler's done notification and,
//! after every build cycle, replaces the live renderer:
//!
//! 1. Server compile errors win: the first one becomes the live error.
//! 2. Otherwise the server artifact is located, read from the output
//!    filesystem and loaded with `{clientStats, serverStats}` plus the
//!    caller's renderer options.
//! 3. Any failure while reading or loading becomes the live error.
//!
//! Requests read the live state through [`HotServer::dispatch`] and never
//! wait on a build.

use crate::compiler::{find_compilers, Compiler, CompilerHandle, DoneSubscription};
use crate::config::HotServerOptions;
use crate::error::{ConfigurationError, HotServerError, LoadError, Result};
use crate::handler::{ConnectHandler, CreateHandler};
use crate::loader::{load_renderer, ModuleEvaluator, RendererOptions};
use crate::locator::locate_artifact;
use crate::source_map;
use crate::state::{LiveState, LiveStateCell};
use crate::stats::{BuildStats, MultiBuildStats};
use serde_json::Value;
use std::sync::{Arc, Weak};

/// Name the done listener is registered under.
pub const PLUGIN_NAME: &str = "FobHotServer";

/// Role prefix of the server compilation unit.
pub const SERVER_ROLE: &str = "server";

/// Role prefix of client compilation units.
pub const CLIENT_ROLE: &str = "client";

/// Routes requests to the most recent server build.
///
/// Cloning is cheap; clones share the same live state.
pub struct HotServer<H: CreateHandler = ConnectHandler> {
    inner: Arc<Inner<H>>,
}

struct Inner<H: CreateHandler> {
    state: LiveStateCell<H::Renderer>,
    handler: H,
    evaluator: Box<dyn ModuleEvaluator<H::Renderer>>,
    server: Arc<dyn Compiler>,
    clients: Vec<Arc<dyn Compiler>>,
    chunk_name: String,
    server_renderer_options: RendererOptions,
    /// Removes the done listener once the last `HotServer` clone is gone
    subscription: DoneSubscription,
}

impl<H: CreateHandler> Clone for HotServer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: CreateHandler> HotServer<H> {
    /// Validate `handle` and subscribe to its done notification.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the handle is not a multi compiler,
    /// has no unit named `server`, or offers no done notification.
    pub fn new(
        handle: CompilerHandle,
        evaluator: impl ModuleEvaluator<H::Renderer> + 'static,
        options: HotServerOptions<H>,
    ) -> Result<Self, ConfigurationError> {
        tracing::debug!("Using fob-hot-server");

        let multi = handle.as_multi()?;
        let units = multi.compilers();

        let server = find_compilers(&units, SERVER_ROLE)
            .into_iter()
            .next()
            .ok_or_else(|| ConfigurationError::MissingCompiler(SERVER_ROLE.to_string()))?;

        let clients = find_compilers(&units, CLIENT_ROLE);
        if clients.is_empty() {
            tracing::warn!(
                "Expected a compiler named '{}'; renderers will receive null client stats",
                CLIENT_ROLE
            );
        }

        let install_source_maps = options.install_source_maps;
        let compiler = Arc::clone(multi);
        let inner = Arc::new_cyclic(|weak: &Weak<Inner<H>>| {
            let listener = Weak::clone(weak);
            Inner {
                state: LiveStateCell::new(),
                handler: options.create_handler,
                evaluator: Box::new(evaluator),
                server,
                clients,
                chunk_name: options.chunk_name,
                server_renderer_options: options.server_renderer_options,
                subscription: DoneSubscription::new(
                    compiler,
                    Arc::new(move |stats: &MultiBuildStats| {
                        if let Some(inner) = listener.upgrade() {
                            inner.on_build_complete(stats);
                        }
                    }),
                ),
            }
        });
        inner.subscription.subscribe(PLUGIN_NAME)?;

        // Nothing below may fail.
        if install_source_maps {
            source_map::install(inner.server.output_file_system());
        }

        Ok(Self { inner })
    }

    /// Apply a finished build cycle.
    ///
    /// Called by the done listener; build systems without notifications may
    /// call it directly.
    pub fn on_build_complete(&self, stats: &MultiBuildStats) {
        self.inner.on_build_complete(stats);
    }

    /// Serve one request with the current live state.
    pub fn dispatch(&self, args: H::Args) -> H::Output {
        let state = self.inner.state.load();
        self.inner.handler.dispatch(state.current(), args)
    }

    /// Snapshot of the live state.
    pub fn state(&self) -> Arc<LiveState<H::Renderer>> {
        self.inner.state.load()
    }

    pub fn handler(&self) -> &H {
        &self.inner.handler
    }

    pub fn chunk_name(&self) -> &str {
        &self.inner.chunk_name
    }

    pub fn server_name(&self) -> &str {
        self.inner.server.name()
    }

    /// Names of the client units, in registry order.
    pub fn client_names(&self) -> Vec<&str> {
        self.inner.clients.iter().map(|client| client.name()).collect()
    }
}

impl<H: CreateHandler> Inner<H> {
    fn on_build_complete(&self, stats: &MultiBuildStats) {
        let next = match self.build_renderer(stats) {
            Ok(renderer) => LiveState::Ready(renderer),
            Err(error) => {
                if matches!(error, HotServerError::Load(LoadError::MissingStats(_))) {
                    tracing::error!(server = self.server.name(), "{}", error);
                } else {
                    tracing::warn!(server = self.server.name(), "Server build failed: {}", error);
                }
                LiveState::Failed(Arc::new(error))
            }
        };

        let previous = self.state.replace(next);
        tracing::debug!(
            from = previous.label(),
            to = self.state.load().label(),
            "Server renderer updated"
        );
    }

    fn build_renderer(&self, stats: &MultiBuildStats) -> Result<H::Renderer> {
        let server_name = self.server.name();
        let server_stats = stats
            .find(server_name)
            .ok_or_else(|| LoadError::MissingStats(server_name.to_string()))?;

        // Compile errors take priority over the previous renderer.
        if let Some(error) = server_stats.errors.first() {
            return Err(HotServerError::Compile(error.clone()));
        }

        let client_stats = aggregate_client_stats(&self.client_stats(stats));

        let filename = locate_artifact(
            &server_stats.assets_by_chunk_name,
            self.server.output_path(),
            &self.chunk_name,
        )?;

        let source = self
            .server
            .output_file_system()
            .read_file(&filename)
            .map_err(|source| LoadError::Read {
                path: filename.clone(),
                source,
            })?;

        tracing::debug!(
            filename = %filename.display(),
            bytes = source.len(),
            "Loading server renderer"
        );

        let options = renderer_options(
            client_stats,
            server_stats.to_json(),
            &self.server_renderer_options,
        );

        load_renderer(
            &*self.evaluator,
            &filename,
            &source,
            options,
            self.handler.export_shape(),
        )
    }

    fn client_stats<'a>(&self, stats: &'a MultiBuildStats) -> Vec<&'a BuildStats> {
        self.clients
            .iter()
            .filter_map(|client| {
                let found = stats.find(client.name());
                if found.is_none() {
                    tracing::warn!("Unable to find stats for '{}' compilation.", client.name());
                }
                found
            })
            .collect()
    }
}

/// Collapse client stats: `null` for none, the object for one, an array otherwise.
pub fn aggregate_client_stats(clients: &[&BuildStats]) -> Value {
    match clients {
        [] => Value::Null,
        [single] => single.to_json(),
        many => Value::Array(many.iter().map(|stats| stats.to_json()).collect()),
    }
}

/// Build the options handed to the server factory. Caller options win.
pub fn renderer_options(
    client_stats: Value,
    server_stats: Value,
    overrides: &RendererOptions,
) -> RendererOptions {
    let mut options = RendererOptions::new();
    options.insert("clientStats".to_string(), client_stats);
    options.insert("serverStats".to_string(), server_stats);
    options.extend(overrides.clone());
    options
}
