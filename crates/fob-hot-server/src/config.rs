//! Hot server configuration.
//!
//! [`HotServerConfig`] holds the serializable settings and can be loaded from
//! several sources. [`HotServerOptions`] adds the handler adapter and is what
//! [`HotServer::new`](crate::HotServer::new) consumes.

use crate::error::ConfigurationError;
use crate::handler::ConnectHandler;
use crate::loader::RendererOptions;
use figment::{
    providers::{Env, Format as _, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "fob.hot.json";

/// Prefix of environment variable overrides (`FOB_HOT_CHUNK_NAME`, ...).
pub const ENV_PREFIX: &str = "FOB_HOT_";

fn default_chunk_name() -> String {
    "main".to_string()
}

fn default_install_source_maps() -> bool {
    true
}

/// Serializable hot server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotServerConfig {
    /// Name of the server entry chunk
    #[serde(default = "default_chunk_name")]
    pub chunk_name: String,

    /// Mixed into `{clientStats, serverStats}` and passed to the server factory
    #[serde(default)]
    pub server_renderer_options: RendererOptions,

    /// Register source map support for the server output
    #[serde(default = "default_install_source_maps")]
    pub install_source_maps: bool,
}

impl Default for HotServerConfig {
    fn default() -> Self {
        Self {
            chunk_name: default_chunk_name(),
            server_renderer_options: RendererOptions::new(),
            install_source_maps: default_install_source_maps(),
        }
    }
}

impl HotServerConfig {
    /// Load configuration from multiple sources.
    /// Priority: environment variables > config file > defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::figment(config_path)
            .extract()
            .map_err(|e| ConfigurationError::InvalidValue(e.to_string()))
    }

    /// The layered provider stack used by [`load`](Self::load).
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let config_file = config_path.map(Path::to_path_buf).or_else(|| {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            default_path.exists().then(|| default_path.to_path_buf())
        });

        if let Some(path) = config_file {
            tracing::debug!("Loading hot server config from {}", path.display());
            figment = figment.merge(Json::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX))
    }
}

/// Setup options for [`HotServer::new`](crate::HotServer::new).
#[derive(Debug, Clone)]
pub struct HotServerOptions<H = ConnectHandler> {
    /// Name of the server entry chunk (default `main`)
    pub chunk_name: String,

    /// Caller options; these win over `clientStats` / `serverStats`
    pub server_renderer_options: RendererOptions,

    pub install_source_maps: bool,

    /// Adapter between the live renderer and the HTTP framework
    pub create_handler: H,
}

impl HotServerOptions<ConnectHandler> {
    pub fn new() -> Self {
        Self::from_config(HotServerConfig::default(), ConnectHandler)
    }
}

impl Default for HotServerOptions<ConnectHandler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> HotServerOptions<H> {
    pub fn from_config(config: HotServerConfig, create_handler: H) -> Self {
        Self {
            chunk_name: config.chunk_name,
            server_renderer_options: config.server_renderer_options,
            install_source_maps: config.install_source_maps,
            create_handler,
        }
    }

    /// Swap the handler adapter, keeping the other options.
    pub fn with_handler<H2>(self, create_handler: H2) -> HotServerOptions<H2> {
        HotServerOptions {
            chunk_name: self.chunk_name,
            server_renderer_options: self.server_renderer_options,
            install_source_maps: self.install_source_maps,
            create_handler,
        }
    }

    pub fn chunk_name(mut self, chunk_name: impl Into<String>) -> Self {
        self.chunk_name = chunk_name.into();
        self
    }

    pub fn server_renderer_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.server_renderer_options.insert(key.into(), value.into());
        self
    }

    pub fn install_source_maps(mut self, install: bool) -> Self {
        self.install_source_maps = install;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ContextHandler;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = HotServerOptions::new();
        assert_eq!(options.chunk_name, "main");
        assert!(options.server_renderer_options.is_empty());
        assert!(options.install_source_maps);
    }

    #[test]
    fn test_builder_methods() {
        let options = HotServerOptions::new()
            .chunk_name("ssr")
            .server_renderer_option("foo", "Bar")
            .install_source_maps(false)
            .with_handler(ContextHandler);

        assert_eq!(options.chunk_name, "ssr");
        assert_eq!(options.server_renderer_options["foo"], "Bar");
        assert!(!options.install_source_maps);
    }

    #[test]
    #[serial]
    fn test_load_from_json_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hot.json");
        fs::write(
            &path,
            r#"{ "chunk_name": "server", "server_renderer_options": { "foo": "Bar" } }"#,
        )
        .unwrap();

        let config = HotServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.chunk_name, "server");
        assert_eq!(config.server_renderer_options["foo"], "Bar");
        assert!(config.install_source_maps);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hot.json");
        fs::write(&path, r#"{ "chunk_name": "server" }"#).unwrap();

        unsafe {
            std::env::set_var("FOB_HOT_CHUNK_NAME", "ssr");
        }
        let config = HotServerConfig::load(Some(&path));
        unsafe {
            std::env::remove_var("FOB_HOT_CHUNK_NAME");
        }

        assert_eq!(config.unwrap().chunk_name, "ssr");
    }

    #[test]
    #[serial]
    fn test_invalid_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hot.json");
        fs::write(&path, r#"{ "install_source_maps": "sometimes" }"#).unwrap();

        let err = HotServerConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue(_)));
    }

    #[test]
    fn test_options_from_config() {
        let config = HotServerConfig {
            chunk_name: "ssr".into(),
            ..Default::default()
        };
        let options = HotServerOptions::from_config(config, ConnectHandler);
        assert_eq!(options.chunk_name, "ssr");
    }
}
