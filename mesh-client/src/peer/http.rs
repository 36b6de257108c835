//! Syncthing REST implementation of [`PeerApi`].

use async_trait::async_trait;
use mesh_types::{DeviceConfig, DeviceId, FolderConfig, FolderDevice, PeerAddr, SystemStatus};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::{PeerApi, PeerError};

/// Header carrying the API key on every request.
const API_KEY_HEADER: &str = "X-API-Key";

/// Peer API client configuration.
#[derive(Clone)]
pub struct PeerApiConfig {
    /// API key sent with every request. Empty is allowed.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for PeerApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerApiConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for PeerApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the Syncthing REST API.
#[derive(Debug, Clone)]
pub struct HttpPeerApi {
    http: reqwest::Client,
    api_key: String,
}

impl HttpPeerApi {
    /// Create a new client. The timeout bounds every request end to end.
    pub fn new(config: PeerApiConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key,
        })
    }

    /// Build the URL for `segments` under the peer's base URL.
    pub fn endpoint(&self, peer: &PeerAddr, segments: &[&str]) -> Result<Url, PeerError> {
        let mut url = Url::parse(&peer.base_url()).map_err(|e| PeerError::Unreachable {
            peer: *peer,
            reason: format!("invalid peer url: {}", e),
        })?;
        url.path_segments_mut()
            .map_err(|_| PeerError::Unreachable {
                peer: *peer,
                reason: "peer url cannot carry a path".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        peer: &PeerAddr,
        segments: &[&str],
    ) -> Result<T, PeerError> {
        let url = self.endpoint(peer, segments)?;
        let path = url.path().to_string();
        let response = self.send(peer, "GET", &path, self.request(Method::GET, url)).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                PeerError::Decode {
                    peer: *peer,
                    path,
                    reason: e.to_string(),
                }
            } else {
                transport_error(peer, e)
            }
        })
    }

    async fn write_json<B: Serialize + ?Sized>(
        &self,
        peer: &PeerAddr,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<(), PeerError> {
        let url = self.endpoint(peer, segments)?;
        let path = url.path().to_string();
        let label = if method == Method::PATCH { "PATCH" } else { "POST" };
        self.send(peer, label, &path, self.request(method, url).json(body))
            .await?;
        Ok(())
    }

    async fn send(
        &self,
        peer: &PeerAddr,
        method: &'static str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Response, PeerError> {
        tracing::trace!(peer = %peer, method, path, "peer request");
        let response = request.send().await.map_err(|e| transport_error(peer, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PeerError::Api {
                peer: *peer,
                method,
                path: path.to_string(),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(response)
    }
}

fn transport_error(peer: &PeerAddr, e: reqwest::Error) -> PeerError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    PeerError::Unreachable {
        peer: *peer,
        reason,
    }
}

#[derive(Serialize)]
struct DevicesPatch<'a> {
    devices: &'a [FolderDevice],
}

#[async_trait]
impl PeerApi for HttpPeerApi {
    async fn status(&self, peer: &PeerAddr) -> Result<SystemStatus, PeerError> {
        self.get_json(peer, &["rest", "system", "status"]).await
    }

    async fn devices(&self, peer: &PeerAddr) -> Result<Vec<DeviceConfig>, PeerError> {
        self.get_json(peer, &["rest", "config", "devices"]).await
    }

    async fn add_device(&self, peer: &PeerAddr, device: &DeviceConfig) -> Result<(), PeerError> {
        self.write_json(peer, Method::POST, &["rest", "config", "devices"], device)
            .await
    }

    async fn folders(&self, peer: &PeerAddr) -> Result<Vec<FolderConfig>, PeerError> {
        self.get_json(peer, &["rest", "config", "folders"]).await
    }

    async fn create_folder(
        &self,
        peer: &PeerAddr,
        folder: &FolderConfig,
    ) -> Result<(), PeerError> {
        self.write_json(peer, Method::POST, &["rest", "config", "folders"], folder)
            .await
    }

    async fn folder(&self, peer: &PeerAddr, folder_id: &str) -> Result<FolderConfig, PeerError> {
        self.get_json(peer, &["rest", "config", "folders", folder_id])
            .await
    }

    async fn patch_folder_devices(
        &self,
        peer: &PeerAddr,
        folder_id: &str,
        devices: &[DeviceId],
    ) -> Result<(), PeerError> {
        let devices: Vec<FolderDevice> = devices.iter().cloned().map(FolderDevice::from).collect();
        self.write_json(
            peer,
            Method::PATCH,
            &["rest", "config", "folders", folder_id],
            &DevicesPatch { devices: &devices },
        )
        .await
    }
}
