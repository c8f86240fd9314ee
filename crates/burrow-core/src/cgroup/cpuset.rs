//! CPU affinity control via the cgroup v1 `cpuset` hierarchy.

use std::path::Path;

use burrow_common::error::Result;
use burrow_common::types::ResourceLimits;

use super::{Subsystem, write_control};

/// CPUs the container may be scheduled on (`cpuset.cpus`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CpusetSubsystem;

impl Subsystem for CpusetSubsystem {
    fn name(&self) -> &'static str {
        "cpuset"
    }

    fn set(&self, cgroup: &Path, limits: &ResourceLimits) -> Result<()> {
        match &limits.cpuset {
            Some(cpus) => write_control(self.name(), cgroup, "cpuset.cpus", cpus),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_cpu_list_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            cpuset: Some("0-1,3".into()),
            ..ResourceLimits::default()
        };
        CpusetSubsystem.set(dir.path(), &limits).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("cpuset.cpus")).unwrap(), "0-1,3");
    }
}
