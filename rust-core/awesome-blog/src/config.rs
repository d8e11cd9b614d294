//! Configuration management using Figment
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `awesome.toml` in the working directory, or the file named by `AWESOME_CONFIG`
//! 3. Environment variables prefixed `AWESOME_`, nested with `__`
//!    (e.g. `AWESOME_SERVER__PORT=8080`)

use crate::error::{Error, Result};
use awesome_core::ServerConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default configuration file
pub const DEFAULT_CONFIG_FILE: &str = "awesome.toml";

/// Variable naming an alternative configuration file
pub const CONFIG_PATH_VAR: &str = "AWESOME_CONFIG";

/// Application configuration, immutable once loaded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener
    pub server: ServerSection,
    /// SQLite store
    pub database: DatabaseSection,
    /// Session cookie
    pub session: SessionSection,
    /// Template directory
    pub templates: TemplateSection,
    /// Static assets
    pub static_files: StaticSection,
    /// Log output
    pub log: LogSection,
}

/// `[server]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Largest accepted request body in bytes
    pub max_body_size: usize,
    /// Grace period for open connections on shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            max_body_size: 1024 * 1024,
            shutdown_timeout_secs: 30,
        }
    }
}

/// `[database]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// sqlx connection URL
    pub url: String,
    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite:awesome.db?mode=rwc".to_string(),
            max_connections: 10,
        }
    }
}

/// `[session]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Cookie carrying the signed session
    pub cookie_name: String,
    /// Signing secret
    pub secret: String,
    /// Cookie lifetime in seconds
    pub max_age: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            cookie_name: "awesession".to_string(),
            secret: "Awesome".to_string(),
            max_age: awesome_core::session::DEFAULT_MAX_AGE,
        }
    }
}

/// `[templates]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSection {
    /// Directory searched for template files
    pub directory: PathBuf,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
        }
    }
}

/// `[static_files]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSection {
    /// URL prefix
    pub prefix: String,
    /// Directory the prefix maps onto
    pub directory: PathBuf,
}

impl Default for StaticSection {
    fn default() -> Self {
        Self {
            prefix: "/static/".to_string(),
            directory: PathBuf::from("static"),
        }
    }
}

/// `[log]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    /// JSON lines instead of human-readable output
    pub json: bool,
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            json: true,
            filter: "awesome=info,awesome_core=info,awesome_blog=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the default file (or `AWESOME_CONFIG`) and the environment
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a source cannot be parsed or a value has
    /// the wrong type. A missing file is not an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load from a specific file and the environment
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a source cannot be parsed.
    pub fn load_from(path: &str) -> Result<Self> {
        tracing::debug!("Loading configuration from: {}", path);
        Ok(Self::figment(path).extract()?)
    }

    /// Provider stack behind [`Self::load_from`]
    #[must_use]
    pub fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("AWESOME_").split("__"))
    }

    /// Listener settings for the dispatch core
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAddress` if host and port do not form a socket
    /// address.
    pub fn server_config(&self) -> Result<ServerConfig> {
        let address = format!("{}:{}", self.server.host, self.server.port);
        let parsed: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| Error::InvalidAddress {
            address: address.clone(),
            reason: e.to_string(),
        })?;

        Ok(ServerConfig {
            address: parsed,
            shutdown_timeout: Duration::from_secs(self.server.shutdown_timeout_secs),
            max_body_size: self.server.max_body_size,
            ..ServerConfig::default()
        })
    }
}
