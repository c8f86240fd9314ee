//! Linux bridge driver.
//!
//! Drives the host through the `ip`, `iptables`, and `nsenter` tools. Each
//! network is a bridge named after it, with the gateway address assigned
//! and outbound traffic masqueraded. Each endpoint is a veth pair whose
//! container side is moved into the container's network namespace.

use std::process::Command;

use burrow_common::error::{BurrowError, Result};
use burrow_common::types::PortMapping;

use crate::network::{Endpoint, Network, NetworkDriver};

/// Runs `program` with `args`, failing on a non-zero exit.
fn run(program: &str, args: &[String]) -> Result<()> {
    tracing::debug!(program, ?args, "running network command");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| BurrowError::Network {
            message: format!("failed to execute {program}: {e}"),
        })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(BurrowError::Network {
            message: format!(
                "{program} {} failed ({}): {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        })
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

/// Prefixes `command` so it runs in the network namespace of `pid`.
fn in_netns(pid: u32, command: &[&str]) -> Vec<String> {
    let mut full = args(&["-t", &pid.to_string(), "-n"]);
    full.extend(args(command));
    full
}

/// `iptables` arguments that masquerade traffic leaving `network`.
#[must_use]
pub fn masquerade_rule(network: &Network, action: &str) -> Vec<String> {
    args(&[
        "-t",
        "nat",
        action,
        "POSTROUTING",
        "-s",
        &network.subnet.to_string(),
        "!",
        "-o",
        &network.name,
        "-j",
        "MASQUERADE",
    ])
}

/// `iptables` arguments that forward a host port to `endpoint`, or `None`
/// when `mapping` is not `HOST:CONTAINER`.
#[must_use]
pub fn port_forward_rule(endpoint: &Endpoint, mapping: &str) -> Option<Vec<String>> {
    let mapping: PortMapping = mapping.parse().ok()?;
    Some(args(&[
        "-t",
        "nat",
        "-A",
        "PREROUTING",
        "-p",
        "tcp",
        "-m",
        "tcp",
        "--dport",
        &mapping.host.to_string(),
        "-j",
        "DNAT",
        "--to-destination",
        &format!("{}:{}", endpoint.ip, mapping.container),
    ]))
}

/// Bridge network driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeDriver;

impl BridgeDriver {
    fn configure_container_side(network: &Network, endpoint: &Endpoint) -> Result<()> {
        let peer = endpoint.container_interface();
        let address = format!("{}/{}", endpoint.ip, network.subnet.prefix());
        let gateway = network.gateway.to_string();
        let commands: [&[&str]; 4] = [
            &["ip", "addr", "add", address.as_str(), "dev", peer.as_str()],
            &["ip", "link", "set", peer.as_str(), "up"],
            &["ip", "link", "set", "lo", "up"],
            &["ip", "route", "add", "default", "via", gateway.as_str(), "dev", peer.as_str()],
        ];
        for command in commands {
            run("nsenter", &in_netns(endpoint.pid, command))?;
        }
        Ok(())
    }

    fn install_port_mappings(endpoint: &Endpoint) {
        for mapping in &endpoint.port_mappings {
            let Some(rule) = port_forward_rule(endpoint, mapping) else {
                tracing::warn!(mapping, "ignoring malformed port mapping");
                continue;
            };
            if let Err(e) = run("iptables", &rule) {
                tracing::warn!(mapping, error = %e, "failed to install port mapping");
            }
        }
    }
}

impl NetworkDriver for BridgeDriver {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn create(&self, network: &Network) -> Result<()> {
        let bridge = network.name.as_str();
        if run("ip", &args(&["link", "show", bridge])).is_err() {
            run("ip", &args(&["link", "add", "name", bridge, "type", "bridge"]))?;
        }
        run("ip", &args(&["addr", "add", &network.gateway_cidr(), "dev", bridge]))?;
        run("ip", &args(&["link", "set", bridge, "up"]))?;
        run("iptables", &masquerade_rule(network, "-A"))?;
        tracing::info!(bridge, subnet = %network.subnet, "bridge created");
        Ok(())
    }

    fn delete(&self, network: &Network) -> Result<()> {
        if let Err(e) = run("iptables", &masquerade_rule(network, "-D")) {
            tracing::warn!(bridge = %network.name, error = %e, "failed to remove masquerade rule");
        }
        run("ip", &args(&["link", "delete", &network.name, "type", "bridge"]))?;
        tracing::info!(bridge = %network.name, "bridge deleted");
        Ok(())
    }

    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()> {
        let host = endpoint.host_interface();
        let peer = endpoint.container_interface();
        let pid = endpoint.pid.to_string();

        run("ip", &args(&["link", "add", &host, "type", "veth", "peer", "name", &peer]))?;
        run("ip", &args(&["link", "set", &host, "master", &network.name]))?;
        run("ip", &args(&["link", "set", &host, "up"]))?;
        run("ip", &args(&["link", "set", &peer, "netns", &pid]))?;
        Self::configure_container_side(network, endpoint)?;
        Self::install_port_mappings(endpoint);

        tracing::info!(
            network = %network.name,
            endpoint = %endpoint.id,
            ip = %endpoint.ip,
            "endpoint connected"
        );
        Ok(())
    }
}
