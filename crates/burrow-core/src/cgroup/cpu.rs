//! CPU share control via the cgroup v1 `cpu` hierarchy.

use std::path::Path;

use burrow_common::error::Result;
use burrow_common::types::ResourceLimits;

use super::{Subsystem, write_control};

/// Relative CPU weight under contention (`cpu.shares`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuShareSubsystem;

impl Subsystem for CpuShareSubsystem {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn set(&self, cgroup: &Path, limits: &ResourceLimits) -> Result<()> {
        match &limits.cpu_share {
            Some(shares) => write_control(self.name(), cgroup, "cpu.shares", shares),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_shares_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            cpu_share: Some("512".into()),
            ..ResourceLimits::default()
        };
        CpuShareSubsystem.set(dir.path(), &limits).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("cpu.shares")).unwrap(), "512");
    }

    #[test]
    fn ignores_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            memory: Some("100m".into()),
            cpuset: Some("0".into()),
            ..ResourceLimits::default()
        };
        CpuShareSubsystem.set(dir.path(), &limits).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
