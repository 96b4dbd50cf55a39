//! Fob hot server - serve the latest server build from a running dev server.
//!
//! A build that compiles one bundle for the browser (`client`) and one for
//! the server (`server`) normally needs a restart whenever the server bundle
//! changes. This crate sits in front of the request pipeline instead: after
//! every build cycle it reads the freshly emitted server artifact, evaluates
//! it and swaps the request renderer in place.
//!
//! # Architecture
//!
//! - [`compiler`] - Build-system capabilities (units, output filesystem, done hook)
//! - [`stats`] - Per-compilation build stats
//! - [`locator`] - Resolves the server entry chunk to a file
//! - [`loader`] - Evaluates the artifact and validates its exports
//! - [`state`] - Live renderer state shared with in-flight requests
//! - [`server`] - The compilation state machine
//! - [`handler`] - Framework adapters (connect and context style)
//! - [`source_map`] - Source map lookups against the output filesystem
//! - [`config`] - Options and layered configuration loading
//! - [`memory`] - In-memory build system
//!
//! # Example
//!
//! ```rust,ignore
//! use axum::{middleware, Router};
//! use fob_hot_server::{connect_middleware, CompilerHandle, HotServer, HotServerOptions};
//!
//! let hot = HotServer::new(CompilerHandle::multi(compiler), evaluator, HotServerOptions::new())?;
//! let app = Router::new()
//!     .fallback(render_error)
//!     .layer(middleware::from_fn_with_state(hot, connect_middleware));
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod handler;
pub mod loader;
pub mod locator;
pub mod memory;
pub mod server;
pub mod source_map;
pub mod state;
pub mod stats;

pub use compiler::{Compiler, CompilerHandle, CompilerHooks, MultiCompiler, OutputFileSystem};
pub use config::{HotServerConfig, HotServerOptions};
pub use error::{ConfigurationError, HotServerError, LoadError, Result, SharedError};
pub use handler::{
    connect_middleware, connect_renderer, context_middleware, context_renderer, ConnectHandler,
    ConnectRenderer, ContextHandler, ContextRenderer, CreateHandler, RenderAbort, RenderError,
};
pub use loader::{ExportValue, ModuleEvaluator, RendererOptions};
pub use server::HotServer;
pub use state::LiveState;
pub use stats::{BuildDiagnostic, BuildStats, ChunkAssets, MultiBuildStats};
