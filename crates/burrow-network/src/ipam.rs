//! IP address management.
//!
//! Allocations of every subnet live in one JSON file mapping the subnet to
//! a fixed-size bit-set, bit `i` standing for [`Subnet::host`]`(i)`. Each
//! operation loads, mutates, and stores the file while holding an exclusive
//! `flock`, so concurrent engine invocations never lose an update.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use burrow_common::error::{BurrowError, Result};
use serde::{Deserialize, Serialize};

use crate::subnet::Subnet;

const WORD_BITS: usize = u64::BITS as usize;

/// Allocation bit-set of one subnet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BitSet(Vec<u64>);

impl BitSet {
    /// Creates an all-clear set holding `len` bits.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self(vec![0; len.div_ceil(WORD_BITS)])
    }

    /// Returns the lowest clear bit below `len`.
    #[must_use]
    pub fn first_clear(&self, len: usize) -> Option<usize> {
        (0..len).find(|&i| !self.get(i))
    }

    /// Returns bit `index`; bits beyond the storage read as clear.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        self.0
            .get(index / WORD_BITS)
            .is_some_and(|word| word & (1 << (index % WORD_BITS)) != 0)
    }

    /// Sets or clears bit `index`, growing the storage if needed.
    pub fn set(&mut self, index: usize, value: bool) {
        let word = index / WORD_BITS;
        if word >= self.0.len() {
            self.0.resize(word + 1, 0);
        }
        let mask = 1 << (index % WORD_BITS);
        if value {
            self.0[word] |= mask;
        } else {
            self.0[word] &= !mask;
        }
    }
}

type Allocations = BTreeMap<String, BitSet>;

/// Address allocator backed by a locked allocation file.
#[derive(Debug, Clone)]
pub struct Ipam {
    path: PathBuf,
}

impl Ipam {
    /// Creates an allocator persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Hands out the lowest free address of `subnet`.
    ///
    /// The first address a subnet ever hands out is its gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the subnet is exhausted or the allocation file
    /// cannot be locked, read, or written.
    pub fn allocate(&self, subnet: &Subnet) -> Result<Ipv4Addr> {
        let ip = self.with_locked(|allocations| {
            let bits = allocations
                .entry(subnet.to_string())
                .or_insert_with(|| BitSet::with_len(subnet.capacity()));
            let index = bits
                .first_clear(subnet.capacity())
                .ok_or_else(|| BurrowError::Network {
                    message: format!("subnet {subnet} has no free address"),
                })?;
            bits.set(index, true);
            subnet.host(index).ok_or_else(|| BurrowError::Network {
                message: format!("address {index} out of range for {subnet}"),
            })
        })?;
        tracing::debug!(subnet = %subnet, ip = %ip, "address allocated");
        Ok(ip)
    }

    /// Returns `ip` to the free pool of `subnet`.
    ///
    /// Releasing an address that was never allocated is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if `ip` is outside `subnet` or the allocation file
    /// cannot be locked, read, or written.
    pub fn release(&self, subnet: &Subnet, ip: Ipv4Addr) -> Result<()> {
        let index = subnet.index_of(ip).ok_or_else(|| BurrowError::Network {
            message: format!("{ip} is not an assignable address of {subnet}"),
        })?;
        self.with_locked(|allocations| {
            if let Some(bits) = allocations.get_mut(&subnet.to_string()) {
                bits.set(index, false);
            }
            Ok(())
        })?;
        tracing::debug!(subnet = %subnet, ip = %ip, "address released");
        Ok(())
    }

    /// Runs `op` on the allocations while holding an exclusive lock on the
    /// allocation file. Nothing is written back when `op` fails.
    fn with_locked<T>(&self, op: impl FnOnce(&mut Allocations) -> Result<T>) -> Result<T> {
        use nix::fcntl::{Flock, FlockArg};

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| BurrowError::io(dir, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| BurrowError::io(&self.path, e))?;
        let mut file = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            BurrowError::io(&self.path, std::io::Error::from_raw_os_error(errno as i32))
        })?;

        let mut allocations = self.read(&mut file)?;
        let value = op(&mut allocations)?;
        self.write(&mut file, &allocations)?;
        Ok(value)
    }

    fn read(&self, file: &mut File) -> Result<Allocations> {
        let mut raw = String::new();
        let _ = file
            .read_to_string(&mut raw)
            .map_err(|e| BurrowError::io(&self.path, e))?;
        if raw.trim().is_empty() {
            return Ok(Allocations::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write(&self, file: &mut File, allocations: &Allocations) -> Result<()> {
        let raw = serde_json::to_vec(allocations)?;
        let io = |e| BurrowError::io(&self.path, e);
        file.set_len(0).map_err(io)?;
        let _ = file.seek(SeekFrom::Start(0)).map_err(io)?;
        file.write_all(&raw).map_err(io)?;
        file.sync_data().map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet() -> Subnet {
        "192.168.0.0/24".parse().unwrap()
    }

    #[test]
    fn first_allocation_is_gateway_then_next_free() {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("ipam/subnet.json"));
        assert_eq!(ipam.allocate(&subnet()).unwrap(), Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(ipam.allocate(&subnet()).unwrap(), Ipv4Addr::new(192, 168, 0, 2));
        assert_eq!(ipam.allocate(&subnet()).unwrap(), Ipv4Addr::new(192, 168, 0, 3));
    }

    #[test]
    fn released_address_is_handed_out_again() {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("subnet.json"));
        let _gateway = ipam.allocate(&subnet()).unwrap();
        let first = ipam.allocate(&subnet()).unwrap();
        let _second = ipam.allocate(&subnet()).unwrap();
        ipam.release(&subnet(), first).unwrap();
        assert_eq!(ipam.allocate(&subnet()).unwrap(), first);
    }

    #[test]
    fn allocations_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subnet.json");
        let _ = Ipam::new(&path).allocate(&subnet()).unwrap();
        let next = Ipam::new(&path).allocate(&subnet()).unwrap();
        assert_eq!(next, Ipv4Addr::new(192, 168, 0, 2));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("192.168.0.0/24"));
    }

    #[test]
    fn exhausted_subnet_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("subnet.json"));
        let tiny: Subnet = "10.1.1.0/30".parse().unwrap();
        assert_eq!(ipam.allocate(&tiny).unwrap(), Ipv4Addr::new(10, 1, 1, 1));
        assert_eq!(ipam.allocate(&tiny).unwrap(), Ipv4Addr::new(10, 1, 1, 2));
        assert!(matches!(ipam.allocate(&tiny), Err(BurrowError::Network { .. })));
    }

    #[test]
    fn releasing_foreign_address_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("subnet.json"));
        assert!(ipam.release(&subnet(), Ipv4Addr::new(10, 0, 0, 5)).is_err());
    }

    #[test]
    fn concurrent_allocations_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subnet.json");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || Ipam::new(path).allocate(&subnet()).unwrap())
            })
            .collect();
        let mut ips: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ips.sort();
        ips.dedup();
        assert_eq!(ips.len(), 8);
    }

    #[test]
    fn bitset_grows_and_clears() {
        let mut bits = BitSet::with_len(10);
        bits.set(3, true);
        bits.set(130, true);
        assert!(bits.get(3) && bits.get(130));
        assert_eq!(bits.first_clear(4), Some(0));
        bits.set(3, false);
        assert!(!bits.get(3));
    }
}
