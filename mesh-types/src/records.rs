//! Records exchanged with a peer's control API.
//!
//! Field names follow the Syncthing REST API (`/rest/system/status`,
//! `/rest/config/devices`, `/rest/config/folders`). Unknown fields returned by
//! the daemon are ignored on decode.

use serde::{Deserialize, Serialize};

use crate::DeviceId;

/// Response of the status query; only the self-reported identity matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// The daemon's own device ID
    #[serde(rename = "myID")]
    pub my_id: DeviceId,
}

/// A device entry in a peer's trusted-device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Identity of the trusted device
    #[serde(rename = "deviceID")]
    pub device_id: DeviceId,
    /// Display name, filled in by the daemon when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Accept folders this device shares with us without prompting
    #[serde(rename = "autoAcceptFolders", default)]
    pub auto_accept_folders: bool,
}

impl DeviceConfig {
    /// The payload used when adding a fleet member to a peer.
    pub fn fleet_member(device_id: DeviceId) -> Self {
        Self {
            device_id,
            name: None,
            auto_accept_folders: true,
        }
    }
}

/// Folder synchronization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    /// Send local changes and receive remote ones
    SendReceive,
    /// Only send local changes
    SendOnly,
    /// Only receive remote changes
    ReceiveOnly,
    /// Receive encrypted data only
    ReceiveEncrypted,
    /// Any mode this crate does not know about
    #[serde(other)]
    Unknown,
}

/// A device a folder is shared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDevice {
    /// Identity of the device
    #[serde(rename = "deviceID")]
    pub device_id: DeviceId,
}

impl From<DeviceId> for FolderDevice {
    fn from(device_id: DeviceId) -> Self {
        Self { device_id }
    }
}

/// A folder entry in a peer's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    /// Folder ID, unique per peer
    pub id: String,
    /// Human-readable label
    #[serde(default)]
    pub label: String,
    /// Filesystem path on the peer
    #[serde(default)]
    pub path: String,
    /// Synchronization mode
    #[serde(rename = "type")]
    pub folder_type: FolderType,
    /// Devices the folder is shared with
    #[serde(default)]
    pub devices: Vec<FolderDevice>,
}

impl FolderConfig {
    /// A send-receive folder whose ID, label and path are all `name`.
    pub fn send_receive(name: &str, devices: impl IntoIterator<Item = DeviceId>) -> Self {
        Self {
            id: name.to_string(),
            label: name.to_string(),
            path: name.to_string(),
            folder_type: FolderType::SendReceive,
            devices: devices.into_iter().map(FolderDevice::from).collect(),
        }
    }

    /// Whether this folder is the one called `name` (by ID or by path).
    pub fn is_named(&self, name: &str) -> bool {
        self.id == name || self.path == name
    }

    /// IDs of the devices this folder is shared with, in daemon order.
    pub fn shared_with(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.device_id.clone()).collect()
    }
}
