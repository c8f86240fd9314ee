//! Memory ceiling via the cgroup v1 `memory` hierarchy.

use std::path::Path;

use burrow_common::error::Result;
use burrow_common::types::ResourceLimits;

use super::{Subsystem, write_control};

/// Hard memory limit (`memory.limit_in_bytes`).
///
/// The kernel accepts unit suffixes, so values such as `100m` are written
/// unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySubsystem;

impl Subsystem for MemorySubsystem {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn set(&self, cgroup: &Path, limits: &ResourceLimits) -> Result<()> {
        match &limits.memory {
            Some(limit) => write_control(self.name(), cgroup, "memory.limit_in_bytes", limit),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_limit_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            memory: Some("100m".into()),
            ..ResourceLimits::default()
        };
        MemorySubsystem.set(dir.path(), &limits).unwrap();
        let written = std::fs::read_to_string(dir.path().join("memory.limit_in_bytes")).unwrap();
        assert_eq!(written, "100m");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            memory: Some("100m".into()),
            ..ResourceLimits::default()
        };
        assert!(MemorySubsystem.set(&dir.path().join("absent"), &limits).is_err());
    }
}
