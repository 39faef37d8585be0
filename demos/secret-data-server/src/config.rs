//! TOML configuration file.
//!
//! ```toml
//! [server_parameters]
//! host = "0.0.0.0"
//! port = 8080
//! version = "v1"
//! threads = 4
//!
//! [logging]
//! level = "info"
//! directory = "logs"
//! filename = "json_rpc_server.log"
//! ```

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid host address {host:?}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_parameters: ServerParameters,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerParameters {
    pub host: String,
    pub port: u16,
    /// Advertised in the handshake `Server` header
    pub version: String,
    /// Runtime worker threads
    pub threads: usize,
}

impl Default for ServerParameters {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            version: "v1".to_string(),
            threads: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Log to `<directory>/<filename>` instead of stdout
    pub directory: Option<PathBuf>,
    pub filename: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            filename: "json_rpc_server.log".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn log_file(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join(&self.filename))
    }
}

impl AppConfig {
    /// Read and parse `path`. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

impl ServerParameters {
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|source| ConfigError::InvalidHost {
            host: self.host.clone(),
            source,
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Apply command-line overrides on top of the file values.
    pub fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<u16>,
        threads: Option<usize>,
    ) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(threads) = threads {
            self.threads = threads;
        }
    }

    /// Worker count for the runtime; zero is treated as one.
    pub fn worker_threads(&self) -> usize {
        self.threads.max(1)
    }
}
