//! # burrow-network
//!
//! Container networking for the burrow engine.
//!
//! - **Registry**: drivers plus the networks persisted under the network root.
//! - **Bridge**: a Linux bridge per network, a veth pair per container.
//! - **IPAM**: a locked bit-set per subnet.
//!
//! The engine only sees [`NetworkConnector`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bridge;
pub mod ipam;
pub mod network;
pub mod registry;
pub mod subnet;

use burrow_common::error::Result;
use burrow_common::types::ContainerId;

pub use network::{Endpoint, Network, NetworkDriver};
pub use registry::NetworkRegistry;

/// Attaches running containers to networks.
pub trait NetworkConnector {
    /// Gives the network namespace of `pid` an address on `network`,
    /// a default route through its gateway, and the requested
    /// `HOST:CONTAINER` port forwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is unknown, no address is free, or
    /// the driver fails.
    fn connect(
        &mut self,
        network: &str,
        container: &ContainerId,
        pid: u32,
        port_mappings: &[String],
    ) -> Result<()>;
}
