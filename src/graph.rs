//! Port/device graph
//!
//! In-memory mirror of the authority's routing state. A `Snapshot` is built
//! wholesale from one `status` reply and never patched afterwards.

pub mod sync;
pub mod wire;


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{EdgeFault, Error, Result};

pub use sync::GraphSync;
pub use wire::{EdgeRequest, StatusResponse};

pub type DeviceId = u32;
pub type PortId = u32;

/// Global identity of a port: `(device_id, port_id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct PortRef {
    pub device_id: DeviceId,
    pub port_id: PortId,
}

impl PortRef {
    pub fn new(device_id: DeviceId, port_id: PortId) -> Self {
        Self { device_id, port_id }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_id, self.port_id)
    }
}

impl FromStr for PortRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidPortAddress(s.to_string());
        let (device, port) = s.trim().split_once(':').ok_or_else(invalid)?;
        let device_id = device.parse().map_err(|_| invalid())?;
        let port_id = port.parse().map_err(|_| invalid())?;
        Ok(Self { device_id, port_id })
    }
}

/// Point-in-time copy of one port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub device_id: DeviceId,
    pub port_id: PortId,
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
}

impl Port {
    pub fn port_ref(&self) -> PortRef {
        PortRef::new(self.device_id, self.port_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub device_id: DeviceId,
    pub name: String,
    pub ports: BTreeMap<PortId, Arc<Port>>,
}

/// One listing row: a port and where it currently routes to
#[derive(Debug, Clone)]
pub struct PortRow<'a> {
    pub device: &'a Device,
    pub port: &'a Arc<Port>,
    pub connected_to: &'a [Arc<Port>],
    /// Input-capable ports this port is not yet routed to
    pub available: Vec<Arc<Port>>,
}

/// Full local view of devices, connections and the authority's hostname
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    devices: BTreeMap<DeviceId, Device>,
    connections: BTreeMap<DeviceId, BTreeMap<PortId, Vec<Arc<Port>>>>,
    hostname: String,
}

impl Snapshot {
    /// Build a snapshot from a `status` reply
    ///
    /// Edges naming a port absent from the device tree are dropped, and
    /// repeated edges are collapsed to one.
    pub fn from_status(status: StatusResponse) -> Self {
        let mut devices = BTreeMap::new();
        for (device_id, wire_device) in status.devices.unwrap_or_default() {
            let ports = wire_device
                .ports
                .unwrap_or_default()
                .into_iter()
                .map(|(port_id, p)| {
                    let port = Port {
                        device_id,
                        port_id,
                        name: p.name,
                        is_input: p.is_input,
                        is_output: p.is_output,
                    };
                    (port_id, Arc::new(port))
                })
                .collect();

            devices.insert(
                device_id,
                Device {
                    device_id,
                    name: wire_device.name,
                    ports,
                },
            );
        }

        let mut snapshot = Self {
            devices,
            connections: BTreeMap::new(),
            hostname: status.config.map(|c| c.hostname).unwrap_or_default(),
        };

        let mut dropped = 0usize;
        for (device_id, ports) in status.outputtoinput.unwrap_or_default() {
            for (port_id, destinations) in ports {
                let from = PortRef::new(device_id, port_id);
                if snapshot.port(&from).is_none() {
                    dropped += destinations.as_ref().map_or(0, Vec::len);
                    continue;
                }

                let mut resolved: Vec<Arc<Port>> = Vec::new();
                for to in destinations.unwrap_or_default() {
                    match snapshot.port(&to) {
                        Some(port) if !resolved.iter().any(|p| p.port_ref() == to) => {
                            resolved.push(Arc::clone(port));
                        }
                        Some(_) => debug!("Duplicate edge {} -> {} collapsed", from, to),
                        None => dropped += 1,
                    }
                }

                if !resolved.is_empty() {
                    snapshot
                        .connections
                        .entry(device_id)
                        .or_default()
                        .insert(port_id, resolved);
                }
            }
        }

        if dropped > 0 {
            warn!("Dropped {} dangling edge(s) from authority status", dropped);
        }

        snapshot
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn device(&self, device_id: DeviceId) -> Option<&Device> {
        self.devices.get(&device_id)
    }

    pub fn port(&self, port: &PortRef) -> Option<&Arc<Port>> {
        self.devices.get(&port.device_id)?.ports.get(&port.port_id)
    }

    /// All ports, ordered by device id then port id
    pub fn ports(&self) -> impl Iterator<Item = &Arc<Port>> {
        self.devices.values().flat_map(|d| d.ports.values())
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Arc<Port>> {
        self.ports().filter(|p| p.is_input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Arc<Port>> {
        self.ports().filter(|p| p.is_output)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.connections
            .values()
            .flat_map(|ports| ports.values())
            .map(Vec::len)
            .sum()
    }

    /// Destinations currently routed from `from`
    pub fn connected_to(&self, from: &PortRef) -> &[Arc<Port>] {
        self.connections
            .get(&from.device_id)
            .and_then(|ports| ports.get(&from.port_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_edge(&self, from: &PortRef, to: &PortRef) -> bool {
        self.connected_to(from).iter().any(|p| p.port_ref() == *to)
    }

    /// Input-capable ports not yet routed from `from`
    pub fn available_targets(&self, from: &PortRef) -> Vec<Arc<Port>> {
        let connected = self.connected_to(from);
        self.inputs()
            .filter(|p| !connected.iter().any(|c| c.port_ref() == p.port_ref()))
            .cloned()
            .collect()
    }

    /// One row per port, derived from the current snapshot on every call
    pub fn rows(&self) -> Vec<PortRow<'_>> {
        self.devices
            .values()
            .flat_map(|device| {
                device.ports.values().map(move |port| {
                    let from = port.port_ref();
                    PortRow {
                        device,
                        port,
                        connected_to: self.connected_to(&from),
                        available: self.available_targets(&from),
                    }
                })
            })
            .collect()
    }

    /// `"{device} / {port}"`, or the bare address for unknown ports
    pub fn display_name(&self, port: &PortRef) -> String {
        match (self.device(port.device_id), self.port(port)) {
            (Some(device), Some(p)) => format!("{} / {}", device.name, p.name),
            _ => port.to_string(),
        }
    }

    /// Referential check for an edge, done locally before any round-trip
    pub fn validate_edge(&self, from: &PortRef, to: &PortRef) -> Result<()> {
        let fault = match (self.port(from), self.port(to)) {
            (None, _) => Some(EdgeFault::SourceMissing),
            (_, None) => Some(EdgeFault::TargetMissing),
            (Some(src), _) if !src.is_output => Some(EdgeFault::SourceNotOutput),
            (_, Some(dst)) if !dst.is_input => Some(EdgeFault::TargetNotInput),
            _ => None,
        };

        match fault {
            Some(fault) => Err(Error::InvalidEdge {
                from: *from,
                to: *to,
                fault,
            }),
            None => Ok(()),
        }
    }
}
