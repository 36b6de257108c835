//! Docker Swarm discovery through the Engine API `/tasks` endpoint.
//!
//! Talks to the local daemon over its unix socket (or a TCP endpoint such as
//! a socket proxy) and flattens the network attachments of every running task
//! of a service into bare IP addresses.

use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::{dedup_preserving_order, Discovery, DiscoveryError};

/// Docker discovery configuration.
#[derive(Debug, Clone)]
pub struct DockerDiscoveryConfig {
    /// Engine API unix socket (default: `/var/run/docker.sock`).
    pub socket: PathBuf,
    /// TCP endpoint (`tcp://host:2375` or `http://host:2375`); overrides `socket`.
    pub host: Option<String>,
    /// Only use addresses on this swarm network.
    pub network: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for DockerDiscoveryConfig {
    fn default() -> Self {
        Self {
            socket: PathBuf::from("/var/run/docker.sock"),
            host: None,
            network: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// A swarm task as returned by `GET /tasks`, reduced to what discovery needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwarmTask {
    /// Task ID.
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Network attachments, each with CIDR-suffixed addresses.
    #[serde(rename = "NetworksAttachments", default)]
    pub networks_attachments: Option<Vec<NetworkAttachment>>,
}

/// One network attachment of a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkAttachment {
    /// The attached network.
    #[serde(rename = "Network", default)]
    pub network: Option<AttachedNetwork>,
    /// Addresses in `ip/prefix` form.
    #[serde(rename = "Addresses", default)]
    pub addresses: Option<Vec<String>>,
}

/// Network object embedded in an attachment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachedNetwork {
    /// Network spec.
    #[serde(rename = "Spec", default)]
    pub spec: Option<AttachedNetworkSpec>,
}

/// Spec of an attached network.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachedNetworkSpec {
    /// Network name, e.g. `syncthing_default`.
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
}

impl NetworkAttachment {
    fn network_name(&self) -> Option<&str> {
        self.network
            .as_ref()
            .and_then(|n| n.spec.as_ref())
            .and_then(|s| s.name.as_deref())
    }
}

/// Flatten task attachments into bare IPs, stripping the `/prefix` suffix.
///
/// With `network` set, attachments to other networks are skipped. Any address
/// that is not an IP (with or without prefix) makes the whole answer malformed.
pub fn task_addresses(
    tasks: &[SwarmTask],
    network: Option<&str>,
) -> Result<Vec<IpAddr>, DiscoveryError> {
    let mut ips = Vec::new();
    for task in tasks {
        for attachment in task.networks_attachments.iter().flatten() {
            if let Some(wanted) = network {
                if attachment.network_name() != Some(wanted) {
                    continue;
                }
            }
            for address in attachment.addresses.iter().flatten() {
                let bare = address.split('/').next().unwrap_or(address);
                let ip = bare.parse::<IpAddr>().map_err(|_| {
                    DiscoveryError::Malformed(format!(
                        "task {} has invalid address {:?}",
                        task.id, address
                    ))
                })?;
                ips.push(ip);
            }
        }
    }
    Ok(dedup_preserving_order(ips))
}

/// Discovery backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerDiscovery {
    http: reqwest::Client,
    base_url: String,
    network: Option<String>,
}

impl DockerDiscovery {
    /// Create a client for the configured Engine API endpoint.
    pub fn new(config: DockerDiscoveryConfig) -> Result<Self, DiscoveryError> {
        let builder = reqwest::Client::builder().timeout(config.timeout);

        let (builder, base_url) = match &config.host {
            Some(host) => (builder, engine_base_url(host)),
            None => Self::socket_builder(builder, &config)?,
        };

        let http = builder
            .build()
            .map_err(|e| DiscoveryError::Unavailable(format!("docker client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            network: config.network,
        })
    }

    #[cfg(unix)]
    fn socket_builder(
        builder: reqwest::ClientBuilder,
        config: &DockerDiscoveryConfig,
    ) -> Result<(reqwest::ClientBuilder, String), DiscoveryError> {
        Ok((
            builder.unix_socket(config.socket.as_path()),
            "http://localhost".to_string(),
        ))
    }

    #[cfg(not(unix))]
    fn socket_builder(
        _builder: reqwest::ClientBuilder,
        config: &DockerDiscoveryConfig,
    ) -> Result<(reqwest::ClientBuilder, String), DiscoveryError> {
        Err(DiscoveryError::Unavailable(format!(
            "unix socket {} not supported on this platform; set a docker host",
            config.socket.display()
        )))
    }

    /// URL of the tasks endpoint.
    pub fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    async fn fetch_tasks(&self, group: &str) -> Result<Vec<SwarmTask>, DiscoveryError> {
        let filters = serde_json::json!({
            "service": [group],
            "desired-state": ["running"],
        });

        let response = self
            .http
            .get(self.tasks_url())
            .query(&[("filters", filters.to_string())])
            .send()
            .await
            .map_err(|e| DiscoveryError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        response.json::<Vec<SwarmTask>>().await.map_err(|e| {
            if e.is_decode() {
                DiscoveryError::Malformed(e.to_string())
            } else {
                DiscoveryError::Unavailable(e.to_string())
            }
        })
    }
}

/// Normalize `DOCKER_HOST`-style endpoints to an HTTP base URL.
fn engine_base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    match host.strip_prefix("tcp://") {
        Some(rest) => format!("http://{}", rest),
        None => host.to_string(),
    }
}

#[async_trait]
impl Discovery for DockerDiscovery {
    async fn list_peers(&self, group: &str) -> Result<Vec<IpAddr>, DiscoveryError> {
        let tasks = self.fetch_tasks(group).await?;
        let ips = task_addresses(&tasks, self.network.as_deref())?;
        tracing::debug!(
            group,
            tasks = tasks.len(),
            addresses = ips.len(),
            "docker discovery"
        );
        Ok(ips)
    }
}
