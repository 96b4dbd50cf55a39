//! In-memory build system.
//!
//! Provides a [`MultiCompiler`] whose units write to a shared in-memory
//! filesystem and whose done notifications are fired by hand. Bundler
//! integrations use it to feed builds into a [`HotServer`](crate::HotServer)
//! without touching disk; tests use it as the build system.

use crate::compiler::{
    Compiler, CompilerHooks, DoneListener, MultiCompiler, OutputFileSystem, PluginRegistry,
};
use crate::stats::MultiBuildStats;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Path-addressed file store.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty filesystem behind an `Arc`, ready to share between units.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Write (or overwrite) a file.
    pub fn write(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.write().remove(path)
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl OutputFileSystem for MemoryFs {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }
}

/// A named compilation unit writing into a [`MemoryFs`].
pub struct MemoryCompiler {
    name: String,
    output_path: PathBuf,
    fs: Arc<MemoryFs>,
}

impl MemoryCompiler {
    pub fn new(name: impl Into<String>, output_path: impl Into<PathBuf>, fs: Arc<MemoryFs>) -> Self {
        Self {
            name: name.into(),
            output_path: output_path.into(),
            fs,
        }
    }

    pub fn fs(&self) -> &Arc<MemoryFs> {
        &self.fs
    }
}

impl Compiler for MemoryCompiler {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn output_file_system(&self) -> Arc<dyn OutputFileSystem> {
        Arc::clone(&self.fs) as Arc<dyn OutputFileSystem>
    }
}

enum Notifier {
    Hooks(CompilerHooks),
    Plugins(PluginRegistry),
}

/// A set of compilation units with hand-fired done notifications.
pub struct MemoryMultiCompiler {
    compilers: Vec<Arc<dyn Compiler>>,
    notifier: Notifier,
}

impl MemoryMultiCompiler {
    /// Multi compiler exposing a hook-style `done` hook.
    pub fn new(compilers: Vec<Arc<dyn Compiler>>) -> Self {
        Self {
            compilers,
            notifier: Notifier::Hooks(CompilerHooks::default()),
        }
    }

    /// Multi compiler that only supports `plugin("done", ..)` registration.
    pub fn legacy(compilers: Vec<Arc<dyn Compiler>>) -> Self {
        Self {
            compilers,
            notifier: Notifier::Plugins(PluginRegistry::new()),
        }
    }

    /// Notify every done listener that a build cycle finished.
    pub fn emit_done(&self, stats: &MultiBuildStats) {
        match &self.notifier {
            Notifier::Hooks(hooks) => hooks.done.call(stats),
            Notifier::Plugins(plugins) => plugins.emit("done", stats),
        }
    }

    /// Number of listeners waiting for done notifications.
    pub fn done_listeners(&self) -> usize {
        match &self.notifier {
            Notifier::Hooks(hooks) => hooks.done.len(),
            Notifier::Plugins(plugins) => plugins.count("done"),
        }
    }
}

impl MultiCompiler for MemoryMultiCompiler {
    fn compilers(&self) -> Vec<Arc<dyn Compiler>> {
        self.compilers.clone()
    }

    fn hooks(&self) -> Option<&CompilerHooks> {
        match &self.notifier {
            Notifier::Hooks(hooks) => Some(hooks),
            Notifier::Plugins(_) => None,
        }
    }

    fn plugin(&self, event: &str, listener: DoneListener) -> bool {
        match &self.notifier {
            Notifier::Plugins(plugins) => {
                plugins.register(event, listener);
                true
            }
            Notifier::Hooks(_) => false,
        }
    }

    fn unplug(&self, event: &str, listener: &DoneListener) -> bool {
        match &self.notifier {
            Notifier::Plugins(plugins) => plugins.unregister(event, listener),
            Notifier::Hooks(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_fs_read_write() {
        let fs = MemoryFs::new();
        assert!(fs.is_empty());

        fs.write("/dist/server.js", "module");
        assert!(fs.exists(Path::new("/dist/server.js")));
        assert_eq!(fs.read_file(Path::new("/dist/server.js")).unwrap(), b"module");

        fs.write("/dist/server.js", "rebuilt");
        assert_eq!(fs.len(), 1);
        assert_eq!(fs.read_file(Path::new("/dist/server.js")).unwrap(), b"rebuilt");
    }

    #[test]
    fn test_memory_fs_missing_file() {
        let fs = MemoryFs::new();
        let err = fs.read_file(Path::new("/dist/missing.js")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_units_share_filesystem() {
        let fs = MemoryFs::shared();
        let client = MemoryCompiler::new("client", "/dist/client", Arc::clone(&fs));
        let server = MemoryCompiler::new("server", "/dist/server", Arc::clone(&fs));

        client.fs().write("/dist/server/main.js", "shared");
        let read = server
            .output_file_system()
            .read_file(Path::new("/dist/server/main.js"))
            .unwrap();
        assert_eq!(read, b"shared");
    }

    #[test]
    fn test_legacy_compiler_has_no_hooks() {
        let compiler = MemoryMultiCompiler::legacy(vec![]);
        assert!(compiler.hooks().is_none());
        assert!(compiler.plugin("done", Arc::new(|_: &MultiBuildStats| {})));
        assert_eq!(compiler.done_listeners(), 1);
    }
}
