//! Registry of drivers and persisted networks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use burrow_common::error::{BurrowError, Result};
use burrow_common::types::ContainerId;

use crate::NetworkConnector;
use crate::bridge::BridgeDriver;
use crate::ipam::Ipam;
use crate::network::{Endpoint, Network, NetworkDriver};
use crate::subnet::Subnet;

/// Drivers and networks known to this host.
///
/// Built once per engine invocation by [`NetworkRegistry::init`] and passed
/// by reference to whoever needs it.
pub struct NetworkRegistry {
    definitions: PathBuf,
    drivers: BTreeMap<&'static str, Box<dyn NetworkDriver>>,
    networks: BTreeMap<String, Network>,
    ipam: Ipam,
}

impl std::fmt::Debug for NetworkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkRegistry")
            .field("definitions", &self.definitions)
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .field("networks", &self.networks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl NetworkRegistry {
    /// Loads the bridge driver and every network persisted under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the network directory cannot be created or listed.
    pub fn init(root: &Path) -> Result<Self> {
        Self::with_drivers(root, vec![Box::new(BridgeDriver)])
    }

    /// Like [`Self::init`] with an explicit driver set.
    ///
    /// Definitions that cannot be read are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the network directory cannot be created or listed.
    pub fn with_drivers(root: &Path, drivers: Vec<Box<dyn NetworkDriver>>) -> Result<Self> {
        let definitions = root.join("network");
        std::fs::create_dir_all(&definitions).map_err(|e| BurrowError::io(&definitions, e))?;

        let mut networks = BTreeMap::new();
        let entries =
            std::fs::read_dir(&definitions).map_err(|e| BurrowError::io(&definitions, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            match Network::load(&path) {
                Ok(network) => {
                    let _ = networks.insert(network.name.clone(), network);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping network"),
            }
        }

        let drivers = drivers.into_iter().map(|d| (d.name(), d)).collect();
        tracing::debug!(count = networks.len(), "networks loaded");
        Ok(Self {
            definitions,
            drivers,
            networks,
            ipam: Ipam::new(root.join("ipam").join("subnet.json")),
        })
    }

    /// Creates and persists a network.
    ///
    /// The subnet's first address becomes the gateway. If the driver fails,
    /// the gateway is released again and nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken, the driver is unknown, the
    /// subnet is invalid or exhausted, or the driver fails.
    pub fn create(&mut self, driver: &str, subnet: &str, name: &str) -> Result<&Network> {
        if self.networks.contains_key(name) {
            return Err(BurrowError::Network {
                message: format!("network {name} already exists"),
            });
        }
        let driver_impl = self.driver(driver)?;
        let subnet: Subnet = subnet.parse()?;
        let gateway = self.ipam.allocate(&subnet)?;
        let network = Network {
            name: name.to_string(),
            subnet,
            gateway,
            driver: driver_impl.name().to_string(),
        };

        if let Err(e) = driver_impl.create(&network) {
            if let Err(release) = self.ipam.release(&subnet, gateway) {
                tracing::warn!(network = name, error = %release, "failed to release gateway");
            }
            return Err(e);
        }
        network.dump(&self.definitions)?;
        tracing::info!(network = name, subnet = %subnet, gateway = %gateway, "network created");
        Ok(self.networks.entry(name.to_string()).or_insert(network))
    }

    /// All known networks, ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    /// Looks up a network by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Network> {
        self.networks.get(name)
    }

    /// Releases the gateway, tears down the driver state, and deletes the
    /// persisted definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is unknown or any step fails.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let network = self.networks.get(name).ok_or_else(|| BurrowError::NotFound {
            kind: "network",
            id: name.to_string(),
        })?;
        self.ipam.release(&network.subnet, network.gateway)?;
        self.driver(&network.driver)?.delete(network)?;

        let path = self.definitions.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BurrowError::io(path, e)),
        }
        let _ = self.networks.remove(name);
        tracing::info!(network = name, "network removed");
        Ok(())
    }

    fn driver(&self, name: &str) -> Result<&dyn NetworkDriver> {
        self.drivers
            .get(name)
            .map(|driver| &**driver)
            .ok_or_else(|| BurrowError::NotFound {
                kind: "network driver",
                id: name.to_string(),
            })
    }
}

impl NetworkConnector for NetworkRegistry {
    fn connect(
        &mut self,
        network: &str,
        container: &ContainerId,
        pid: u32,
        port_mappings: &[String],
    ) -> Result<()> {
        let net = self.networks.get(network).ok_or_else(|| BurrowError::Network {
            message: format!("no such network: {network}"),
        })?;
        let ip = self.ipam.allocate(&net.subnet)?;
        let endpoint = Endpoint {
            id: format!("{container}-{network}"),
            pid,
            ip,
            port_mappings: port_mappings.to_vec(),
        };
        if let Err(e) = self.driver(&net.driver).and_then(|driver| driver.connect(net, &endpoint)) {
            if let Err(release) = self.ipam.release(&net.subnet, ip) {
                tracing::warn!(network, ip = %ip, error = %release, "failed to release address");
            }
            return Err(e);
        }
        tracing::info!(network, container = %container, ip = %ip, "container connected");
        Ok(())
    }
}
