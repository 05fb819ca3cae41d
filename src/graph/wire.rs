//! Wire shapes exchanged with the routing authority
//!
//! The authority encodes empty collections as `null` and integer map keys as
//! JSON strings; both are accepted here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DeviceId, PortId, PortRef};

/// Reply to `GET status`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub devices: Option<BTreeMap<DeviceId, WireDevice>>,
    #[serde(default)]
    pub outputtoinput: Option<ConnectionTree>,
    #[serde(default)]
    pub config: Option<HostConfig>,
}

/// `device_id -> port_id -> destinations`
pub type ConnectionTree = BTreeMap<DeviceId, BTreeMap<PortId, Option<Vec<PortRef>>>>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireDevice {
    pub name: String,
    #[serde(default)]
    pub ports: Option<BTreeMap<PortId, WirePort>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WirePort {
    pub name: String,
    #[serde(default)]
    pub is_input: bool,
    #[serde(default)]
    pub is_output: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default)]
    pub hostname: String,
}

/// Body of `POST connect` and `POST disconnect`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EdgeRequest {
    pub from: PortRef,
    pub to: PortRef,
}
