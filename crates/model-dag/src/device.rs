// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device identities and addressing.

use crate::{DagError, DeviceId};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

/// A cluster device: identity plus the address its peers reach it on.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeviceInfo {
    /// Opaque device identifier.
    pub id: DeviceId,
    /// IPv4/IPv6 address as text.
    pub ip_address: String,
    /// TCP port the device's network handler listens on.
    pub port: u16,
}

impl DeviceInfo {
    /// Resolves the device's socket address.
    ///
    /// # Errors
    /// Returns the underlying parse error when `ip_address` is not a
    /// literal IPv4/IPv6 address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.ip_address.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Mapping from device id to device info. The local device's id must be a
/// key of the map handed to the runtime.
pub type DeviceMap = HashMap<DeviceId, DeviceInfo>;

/// Parses a JSON device list (`[{ "id", "ip_address", "port" }, ...]`).
pub fn load_device_list(json: &str) -> Result<Vec<DeviceInfo>, DagError> {
    let devices: Vec<DeviceInfo> = serde_json::from_str(json)?;
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let d = DeviceInfo {
            id: "device0".into(),
            ip_address: "127.0.0.1".into(),
            port: 9000,
        };
        let addr = d.socket_addr().unwrap();
        assert_eq!(addr.port(), 9000);
        assert!(addr.is_ipv4());
    }

    #[test]
    fn test_socket_addr_bad_ip() {
        let d = DeviceInfo {
            id: "device0".into(),
            ip_address: "not-an-ip".into(),
            port: 9000,
        };
        assert!(d.socket_addr().is_err());
    }

    #[test]
    fn test_load_device_list() {
        let json = r#"[
            { "id": "device0", "ip_address": "10.0.0.1", "port": 9000 },
            { "id": "device1", "ip_address": "10.0.0.2", "port": 9001 }
        ]"#;
        let devices = load_device_list(json).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].id, "device1");
        assert_eq!(devices[1].port, 9001);
    }

    #[test]
    fn test_load_device_list_malformed() {
        assert!(load_device_list("{ not a list }").is_err());
    }
}
