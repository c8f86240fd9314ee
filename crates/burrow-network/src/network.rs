//! Network and endpoint model plus the driver seam.

use std::net::Ipv4Addr;
use std::path::Path;

use burrow_common::error::{BurrowError, Result};
use serde::{Deserialize, Serialize};

use crate::subnet::Subnet;

/// A named container network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network name, also the name of its host interface.
    pub name: String,
    /// Address range containers are assigned from.
    pub subnet: Subnet,
    /// Host-side address of the network, first address of the subnet.
    pub gateway: Ipv4Addr,
    /// Name of the driver that owns the network.
    pub driver: String,
}

impl Network {
    /// Gateway address in `ADDR/PREFIX` form.
    #[must_use]
    pub fn gateway_cidr(&self) -> String {
        format!("{}/{}", self.gateway, self.subnet.prefix())
    }

    /// Writes the definition to `<dir>/<name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn dump(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| BurrowError::io(dir, e))?;
        let path = dir.join(&self.name);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| BurrowError::io(&path, e))
    }

    /// Reads a definition written by [`Self::dump`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| BurrowError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// One container's attachment to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `<container id>-<network name>`.
    pub id: String,
    /// Pid whose network namespace receives the interface.
    pub pid: u32,
    /// Address assigned to the container.
    pub ip: Ipv4Addr,
    /// `HOST:CONTAINER` TCP forwarding rules.
    pub port_mappings: Vec<String>,
}

impl Endpoint {
    /// Host-side interface name.
    #[must_use]
    pub fn host_interface(&self) -> String {
        format!("veth{}", self.short_id())
    }

    /// Container-side interface name.
    #[must_use]
    pub fn container_interface(&self) -> String {
        format!("cif-{}", self.short_id())
    }

    // Interface names are capped at 15 bytes.
    fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// Back end that realizes networks on the host.
pub trait NetworkDriver {
    /// Driver name, as given to `network create --driver`.
    fn name(&self) -> &'static str;

    /// Creates the host-side plumbing of `network`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host configuration fails.
    fn create(&self, network: &Network) -> Result<()>;

    /// Removes the host-side plumbing of `network`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host configuration fails.
    fn delete(&self, network: &Network) -> Result<()>;

    /// Plugs `endpoint` into `network` and configures it inside the
    /// endpoint's network namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created or configured.
    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_names_fit_kernel_limit() {
        let ep = Endpoint {
            id: "0123456789-testnet".into(),
            pid: 1,
            ip: Ipv4Addr::new(10, 0, 0, 2),
            port_mappings: Vec::new(),
        };
        assert_eq!(ep.host_interface(), "veth01234567");
        assert_eq!(ep.container_interface(), "cif-01234567");
        assert!(ep.container_interface().len() <= 15);
    }

    #[test]
    fn network_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let net = Network {
            name: "testnet".into(),
            subnet: "192.168.0.0/24".parse().unwrap(),
            gateway: Ipv4Addr::new(192, 168, 0, 1),
            driver: "bridge".into(),
        };
        net.dump(dir.path()).unwrap();
        assert_eq!(Network::load(&dir.path().join("testnet")).unwrap(), net);
        assert_eq!(net.gateway_cidr(), "192.168.0.1/24");
    }
}
