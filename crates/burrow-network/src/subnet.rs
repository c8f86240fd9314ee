//! IPv4 subnets in CIDR notation.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use burrow_common::error::BurrowError;
use serde::{Deserialize, Serialize};

/// Widest prefix accepted; keeps the allocation bit-set at a few kilobytes.
pub const MIN_PREFIX: u8 = 16;

/// Narrowest prefix that still leaves a gateway and one container address.
pub const MAX_PREFIX: u8 = 30;

/// An IPv4 network, normalized to its network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet {
    network: Ipv4Addr,
    prefix: u8,
}

impl Subnet {
    /// Network address (host bits cleared).
    #[must_use]
    pub const fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Prefix length.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of assignable addresses, excluding network and broadcast.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        (1usize << (32 - self.prefix)) - 2
    }

    /// Returns the `index`-th assignable address, counting from the first
    /// address after the network address.
    #[must_use]
    pub fn host(&self, index: usize) -> Option<Ipv4Addr> {
        if index >= self.capacity() {
            return None;
        }
        let offset = u32::try_from(index).ok()?.checked_add(1)?;
        u32::from(self.network).checked_add(offset).map(Ipv4Addr::from)
    }

    /// Inverse of [`Self::host`].
    #[must_use]
    pub fn index_of(&self, ip: Ipv4Addr) -> Option<usize> {
        let offset = u32::from(ip).checked_sub(u32::from(self.network))?;
        let index = usize::try_from(offset.checked_sub(1)?).ok()?;
        (index < self.capacity()).then_some(index)
    }

    fn mask(prefix: u8) -> u32 {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl FromStr for Subnet {
    type Err = BurrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| BurrowError::Config {
            message: format!("invalid subnet `{s}`: {why}"),
        };
        let (addr, prefix) = s.split_once('/').ok_or_else(|| invalid("expected ADDR/PREFIX"))?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid("bad IPv4 address"))?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid("bad prefix length"))?;
        if !(MIN_PREFIX..=MAX_PREFIX).contains(&prefix) {
            return Err(invalid(&format!(
                "prefix must be between {MIN_PREFIX} and {MAX_PREFIX}"
            )));
        }
        Ok(Self {
            network: Ipv4Addr::from(u32::from(addr) & Self::mask(prefix)),
            prefix,
        })
    }
}

impl TryFrom<String> for Subnet {
    type Error = BurrowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subnet> for String {
    fn from(subnet: Subnet) -> Self {
        subnet.to_string()
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_clears_host_bits() {
        let subnet: Subnet = "192.168.10.77/24".parse().unwrap();
        assert_eq!(subnet.network(), Ipv4Addr::new(192, 168, 10, 0));
        assert_eq!(subnet.to_string(), "192.168.10.0/24");
        assert_eq!(subnet.capacity(), 254);
    }

    #[test]
    fn host_and_index_are_inverse() {
        let subnet: Subnet = "10.0.0.0/16".parse().unwrap();
        assert_eq!(subnet.host(0), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(subnet.host(255), Some(Ipv4Addr::new(10, 0, 1, 0)));
        assert_eq!(subnet.index_of(Ipv4Addr::new(10, 0, 1, 0)), Some(255));
        assert_eq!(subnet.index_of(Ipv4Addr::new(10, 0, 0, 0)), None);
        assert_eq!(subnet.index_of(Ipv4Addr::new(10, 0, 255, 255)), None);
        assert_eq!(subnet.host(subnet.capacity()), None);
    }

    #[test]
    fn rejects_malformed_and_out_of_range() {
        for bad in ["10.0.0.0", "10.0.0/24", "10.0.0.0/x", "10.0.0.0/8", "10.0.0.0/31"] {
            assert!(bad.parse::<Subnet>().is_err(), "{bad}");
        }
    }

    #[test]
    fn serializes_as_cidr_string() {
        let subnet: Subnet = "172.18.0.0/24".parse().unwrap();
        assert_eq!(serde_json::to_string(&subnet).unwrap(), "\"172.18.0.0/24\"");
        let back: Subnet = serde_json::from_str("\"172.18.0.0/24\"").unwrap();
        assert_eq!(back, subnet);
    }
}
