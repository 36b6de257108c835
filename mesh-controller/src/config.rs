//! Configuration loading for syncmesh.
//!
//! Configuration is loaded from an optional TOML file, then overridden from
//! the environment variables a Syncthing stack already sets.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// API key variable shared with the Syncthing GUI.
pub const ENV_API_KEY: &str = "STGUIAPIKEY";
/// Poll interval in seconds.
pub const ENV_INTERVAL: &str = "SYNCTHING_SLEEP";
/// Peer API port.
pub const ENV_PORT: &str = "SYNCTHING_PORT";
/// Discovery group name.
pub const ENV_GROUP: &str = "SYNCMESH_SERVICE";
/// Folder name.
pub const ENV_FOLDER: &str = "SYNCMESH_FOLDER";

/// Root configuration for syncmesh.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Peer API access.
    #[serde(default)]
    pub peers: PeersConfig,
    /// Peer discovery.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Reconciliation target and cadence.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Health and metrics endpoint.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Peer API configuration.
#[derive(Clone, Deserialize, Serialize)]
pub struct PeersConfig {
    /// Port every peer serves its control API on (default: 8384).
    #[serde(default = "default_port")]
    pub port: u16,
    /// API key sent with every request (default: empty).
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Peers contacted at once within a pass (default: 8).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl std::fmt::Debug for PeersConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeersConfig")
            .field("port", &self.port)
            .field("api_key", &redact(&self.api_key))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

/// Which discovery backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryBackend {
    /// Docker Swarm tasks of a service.
    #[default]
    Docker,
    /// A DNS name resolving to every member.
    Dns,
    /// A fixed list of addresses.
    Static,
}

/// Discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Backend (default: docker).
    #[serde(default)]
    pub backend: DiscoveryBackend,
    /// Group whose running members form the fleet (default: syncthing_syncthing).
    #[serde(default = "default_group")]
    pub group: String,
    /// Docker Engine API socket (default: /var/run/docker.sock).
    #[serde(default = "default_docker_socket")]
    pub docker_socket: PathBuf,
    /// Docker Engine TCP endpoint; takes precedence over the socket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_host: Option<String>,
    /// Only use task addresses on this swarm network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Prefix prepended to the group for DNS lookups (default: "tasks.").
    #[serde(default = "default_dns_prefix")]
    pub dns_prefix: String,
    /// Addresses returned by the static backend.
    #[serde(default)]
    pub static_peers: Vec<IpAddr>,
}

/// Reconciliation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Folder kept shared across the fleet (default: "default").
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Seconds between passes (default: 60).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Serve /health and /metrics (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Bind address for the HTTP server (default: 0.0.0.0:9384).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
}

// Default value functions
fn default_port() -> u16 {
    8384
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    8
}

fn default_group() -> String {
    "syncthing_syncthing".to_string()
}

fn default_docker_socket() -> PathBuf {
    PathBuf::from("/var/run/docker.sock")
}

fn default_dns_prefix() -> String {
    "tasks.".to_string()
}

fn default_folder() -> String {
    "default".to_string()
}

fn default_interval_secs() -> u64 {
    60
}

fn default_http_bind() -> String {
    "0.0.0.0:9384".to_string()
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            backend: DiscoveryBackend::default(),
            group: default_group(),
            docker_socket: default_docker_socket(),
            docker_host: None,
            network: None,
            dns_prefix: default_dns_prefix(),
            static_peers: Vec::new(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_http_bind(),
        }
    }
}

impl PeersConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ReconcileConfig {
    /// Sleep between passes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Effective configuration: the file (or defaults), then the process
    /// environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Unset variables leave the current value alone. The API key may be set
    /// to an empty string; every other variable must be non-empty to count.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.peers.api_key = key;
        }
        if let Some(value) = non_empty(lookup(ENV_INTERVAL)) {
            self.reconcile.interval_secs = parse_env(ENV_INTERVAL, &value)?;
        }
        if let Some(value) = non_empty(lookup(ENV_PORT)) {
            self.peers.port = parse_env(ENV_PORT, &value)?;
        }
        if let Some(group) = non_empty(lookup(ENV_GROUP)) {
            self.discovery.group = group;
        }
        if let Some(folder) = non_empty(lookup(ENV_FOLDER)) {
            self.reconcile.folder = folder;
        }
        Ok(())
    }

    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile.interval_secs == 0 {
            return Err(ConfigError::Invalid("reconcile.interval_secs must be at least 1".into()));
        }
        if self.peers.max_concurrent == 0 {
            return Err(ConfigError::Invalid("peers.max_concurrent must be at least 1".into()));
        }
        if self.reconcile.folder.trim().is_empty() {
            return Err(ConfigError::Invalid("reconcile.folder must not be empty".into()));
        }
        if self.discovery.group.trim().is_empty() {
            return Err(ConfigError::Invalid("discovery.group must not be empty".into()));
        }
        if self.discovery.backend == DiscoveryBackend::Static
            && self.discovery.static_peers.is_empty()
        {
            tracing::warn!(
                "static discovery configured without static_peers; every pass will be empty"
            );
        }
        Ok(())
    }

    /// A copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.peers.api_key = redact(&self.peers.api_key).to_string();
        config
    }

    /// Render as TOML, API key masked.
    pub fn to_toml_redacted(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&self.redacted()).map_err(ConfigError::Render)
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() {
        ""
    } else {
        "***"
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// An environment override does not parse.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
    /// A setting is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Failed to render configuration.
    #[error("failed to render config: {0}")]
    Render(#[source] toml::ser::Error),
}
