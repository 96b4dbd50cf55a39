//! Build-system capabilities the hot server depends on.
//!
//! The hot server never drives a build itself. It needs a handle exposing
//! several named compilation units, a way to read what they emitted and a
//! notification when a build cycle is done. Build systems provide these by
//! implementing [`Compiler`], [`MultiCompiler`] and [`OutputFileSystem`].

use crate::error::ConfigurationError;
use crate::stats::MultiBuildStats;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Read access to the filesystem a compiler writes its output to.
pub trait OutputFileSystem: Send + Sync {
    /// Read the whole file at `path`.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// One independently configured build target.
pub trait Compiler: Send + Sync {
    fn name(&self) -> &str;

    /// Directory emitted filenames are relative to.
    fn output_path(&self) -> &Path;

    fn output_file_system(&self) -> Arc<dyn OutputFileSystem>;
}

/// Callback invoked once per finished build cycle.
pub type DoneListener = Arc<dyn Fn(&MultiBuildStats) + Send + Sync>;

/// Named taps on a build lifecycle event.
#[derive(Default)]
pub struct DoneHook {
    taps: RwLock<Vec<(String, DoneListener)>>,
}

impl DoneHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener under a plugin name.
    pub fn tap(&self, name: impl Into<String>, listener: DoneListener) {
        self.taps.write().push((name.into(), listener));
    }

    /// Run every listener in registration order.
    ///
    /// The tap list is snapshotted first so listeners may tap further hooks.
    pub fn call(&self, stats: &MultiBuildStats) {
        let taps: Vec<DoneListener> = self
            .taps
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in taps {
            listener(stats);
        }
    }

    /// Remove a previously tapped listener. Returns whether it was found.
    pub fn untap(&self, listener: &DoneListener) -> bool {
        let mut taps = self.taps.write();
        let before = taps.len();
        taps.retain(|(_, tapped)| !Arc::ptr_eq(tapped, listener));
        taps.len() != before
    }

    pub fn tap_names(&self) -> Vec<String> {
        self.taps.read().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.taps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.read().is_empty()
    }
}

/// Lifecycle hooks of a multi compiler.
#[derive(Default)]
pub struct CompilerHooks {
    pub done: DoneHook,
}

/// Registry of plugin callbacks keyed by event name, for build systems that
/// use direct subscription instead of hooks.
#[derive(Default)]
pub struct PluginRegistry {
    listeners: RwLock<HashMap<String, Vec<DoneListener>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, event: &str, listener: DoneListener) {
        self.listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    pub fn emit(&self, event: &str, stats: &MultiBuildStats) {
        let listeners = self.listeners.read().get(event).cloned().unwrap_or_default();
        for listener in listeners {
            listener(stats);
        }
    }

    pub fn unregister(&self, event: &str, listener: &DoneListener) -> bool {
        let mut listeners = self.listeners.write();
        let Some(registered) = listeners.get_mut(event) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|candidate| !Arc::ptr_eq(candidate, listener));
        registered.len() != before
    }

    pub fn count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }
}

/// A compiler made of several named compilation units.
pub trait MultiCompiler: Send + Sync {
    /// Compilation units in registry order.
    fn compilers(&self) -> Vec<Arc<dyn Compiler>>;

    /// Hook-style lifecycle notifications, if supported.
    fn hooks(&self) -> Option<&CompilerHooks> {
        None
    }

    /// Direct subscription to a lifecycle event.
    ///
    /// Returns `false` when the compiler does not support it.
    fn plugin(&self, _event: &str, _listener: DoneListener) -> bool {
        false
    }

    /// Undo a [`plugin`](Self::plugin) registration.
    fn unplug(&self, _event: &str, _listener: &DoneListener) -> bool {
        false
    }
}

/// What a caller hands to [`HotServer::new`](crate::HotServer::new).
#[derive(Clone)]
pub enum CompilerHandle {
    /// A lone compilation unit. Always rejected at setup.
    Single(Arc<dyn Compiler>),
    Multi(Arc<dyn MultiCompiler>),
}

impl CompilerHandle {
    pub fn single(compiler: Arc<impl Compiler + 'static>) -> Self {
        Self::Single(compiler)
    }

    pub fn multi(compiler: Arc<impl MultiCompiler + 'static>) -> Self {
        Self::Multi(compiler)
    }

    /// The multi compiler behind this handle, if it has any units.
    pub fn as_multi(&self) -> Result<&Arc<dyn MultiCompiler>, ConfigurationError> {
        match self {
            Self::Multi(multi) if !multi.compilers().is_empty() => Ok(multi),
            _ => Err(ConfigurationError::NotMultiCompiler),
        }
    }
}

/// Find every unit whose name equals or starts with `target`, in registry order.
pub fn find_compilers(units: &[Arc<dyn Compiler>], target: &str) -> Vec<Arc<dyn Compiler>> {
    units
        .iter()
        .filter(|unit| unit.name().starts_with(target))
        .cloned()
        .collect()
}

/// Register `listener` for done notifications.
///
/// Prefers the hook API and falls back to plugin registration.
pub fn subscribe_done(
    compiler: &dyn MultiCompiler,
    plugin_name: &str,
    listener: DoneListener,
) -> Result<(), ConfigurationError> {
    if let Some(hooks) = compiler.hooks() {
        hooks.done.tap(plugin_name, listener);
        return Ok(());
    }

    if compiler.plugin("done", listener) {
        return Ok(());
    }

    Err(ConfigurationError::NoDoneNotification)
}

/// Remove a listener registered with [`subscribe_done`].
pub fn unsubscribe_done(compiler: &dyn MultiCompiler, listener: &DoneListener) -> bool {
    match compiler.hooks() {
        Some(hooks) => hooks.done.untap(listener),
        None => compiler.unplug("done", listener),
    }
}

/// A done listener that is removed from its compiler when dropped.
pub struct DoneSubscription {
    compiler: Arc<dyn MultiCompiler>,
    listener: DoneListener,
}

impl DoneSubscription {
    pub fn new(compiler: Arc<dyn MultiCompiler>, listener: DoneListener) -> Self {
        Self { compiler, listener }
    }

    /// Register the listener through [`subscribe_done`].
    pub fn subscribe(&self, plugin_name: &str) -> Result<(), ConfigurationError> {
        subscribe_done(&*self.compiler, plugin_name, Arc::clone(&self.listener))
    }
}

impl Drop for DoneSubscription {
    fn drop(&mut self) {
        if unsubscribe_done(&*self.compiler, &self.listener) {
            tracing::debug!("Removed done listener");
        }
    }
}
