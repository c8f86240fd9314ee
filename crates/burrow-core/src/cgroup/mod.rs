//! Cgroups v1 resource management.
//!
//! Each resource backend lives in its own hierarchy (`cpu`, `cpuset`,
//! `memory`) whose mount point is discovered from the process mount table.
//! All backends implement [`Subsystem`] and are driven in a fixed order by
//! [`CgroupManager`], which never inspects which concrete backend it holds.

pub mod cpu;
pub mod cpuset;
pub mod memory;

use std::path::{Path, PathBuf};

use burrow_common::error::{BurrowError, Result};
use burrow_common::types::ResourceLimits;

/// A cgroup v1 resource backend.
pub trait Subsystem: Sync {
    /// Hierarchy name, matched against the super-options of the mount table.
    fn name(&self) -> &'static str;

    /// Writes the limits this backend owns into `cgroup`.
    ///
    /// Fields that are `None` must leave the control files untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a control file cannot be written.
    fn set(&self, cgroup: &Path, limits: &ResourceLimits) -> Result<()>;

    /// Moves `pid` into `cgroup` by writing the `tasks` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the `tasks` file cannot be written.
    fn apply(&self, cgroup: &Path, pid: u32) -> Result<()> {
        write_control(self.name(), cgroup, "tasks", &pid.to_string())
    }

    /// Deletes `cgroup`.
    ///
    /// cgroupfs directories are removed with a plain `rmdir`, their control
    /// files vanish with them. Anything else falls back to a recursive delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    fn remove(&self, cgroup: &Path) -> Result<()> {
        let removed = std::fs::remove_dir(cgroup).or_else(|e| {
            if e.kind() == std::io::ErrorKind::DirectoryNotEmpty {
                std::fs::remove_dir_all(cgroup)
            } else {
                Err(e)
            }
        });
        removed.map_err(|e| BurrowError::ResourceControl {
            subsystem: self.name(),
            message: format!("remove {}: {e}", cgroup.display()),
        })
    }
}

/// Every backend, in the order they are set, applied, and removed.
pub static SUBSYSTEMS: [&dyn Subsystem; 3] = [
    &cpuset::CpusetSubsystem,
    &memory::MemorySubsystem,
    &cpu::CpuShareSubsystem,
];

/// Writes `value` verbatim into `file` under `cgroup`.
pub(crate) fn write_control(
    subsystem: &'static str,
    cgroup: &Path,
    file: &str,
    value: &str,
) -> Result<()> {
    let path = cgroup.join(file);
    std::fs::write(&path, value).map_err(|e| BurrowError::ResourceControl {
        subsystem,
        message: format!("write {value:?} to {}: {e}", path.display()),
    })?;
    tracing::debug!(subsystem, file, value, "cgroup control file written");
    Ok(())
}

/// Finds the mount point of a cgroup v1 hierarchy in `mountinfo` content.
///
/// A line matches when `subsystem` appears as a whole token in its
/// comma-separated super-options (the last field), so `cpu` matches
/// `rw,cpu,cpuacct` but not `rw,cpuset`.
#[must_use]
pub fn find_mountpoint(mountinfo: &str, subsystem: &str) -> Option<PathBuf> {
    mountinfo.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(' ').collect();
        let options = fields.last()?;
        if options.split(',').any(|opt| opt == subsystem) {
            fields.get(4).map(PathBuf::from)
        } else {
            None
        }
    })
}

/// Drives every [`Subsystem`] for one container.
///
/// Holds no open resources: each call resolves the per-subsystem directory
/// again from the mount table.
#[derive(Debug, Clone)]
pub struct CgroupManager {
    /// Container cgroup path relative to each hierarchy root.
    relative_path: PathBuf,
    /// Mount table used to locate hierarchy roots.
    mountinfo: PathBuf,
}

impl CgroupManager {
    /// Creates a manager for the cgroup at `relative_path` in every hierarchy.
    pub fn new(relative_path: impl Into<PathBuf>, mountinfo: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
            mountinfo: mountinfo.into(),
        }
    }

    /// Resolves the absolute cgroup directory of `subsystem`.
    ///
    /// With `create` set, a missing directory is created; otherwise a
    /// missing directory is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read, the hierarchy is
    /// not mounted, or the directory is missing and cannot be created.
    pub fn subsystem_path(&self, subsystem: &dyn Subsystem, create: bool) -> Result<PathBuf> {
        let name = subsystem.name();
        let mountinfo = std::fs::read_to_string(&self.mountinfo)
            .map_err(|e| BurrowError::io(&self.mountinfo, e))?;
        let root =
            find_mountpoint(&mountinfo, name).ok_or_else(|| BurrowError::ResourceControl {
                subsystem: name,
                message: "hierarchy is not mounted".into(),
            })?;
        let path = root.join(&self.relative_path);
        if path.exists() {
            return Ok(path);
        }
        if !create {
            return Err(BurrowError::ResourceControl {
                subsystem: name,
                message: format!("{} does not exist", path.display()),
            });
        }
        std::fs::create_dir_all(&path).map_err(|e| BurrowError::ResourceControl {
            subsystem: name,
            message: format!("create {}: {e}", path.display()),
        })?;
        tracing::debug!(subsystem = name, path = %path.display(), "cgroup created");
        Ok(path)
    }

    /// Creates every subsystem directory and writes the configured limits.
    ///
    /// All subsystems are attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first path or write failure encountered.
    pub fn set(&self, limits: &ResourceLimits) -> Result<()> {
        self.for_each(|subsystem| {
            let path = self.subsystem_path(subsystem, true)?;
            subsystem.set(&path, limits)
        })
    }

    /// Moves `pid` into every subsystem's cgroup.
    ///
    /// All subsystems are attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first path or write failure encountered.
    pub fn apply(&self, pid: u32) -> Result<()> {
        self.for_each(|subsystem| {
            let path = self.subsystem_path(subsystem, false)?;
            subsystem.apply(&path, pid)
        })
    }

    /// Removes every subsystem's cgroup, logging failures.
    pub fn destroy(&self) {
        for subsystem in SUBSYSTEMS {
            let removed = self
                .subsystem_path(subsystem, false)
                .and_then(|path| subsystem.remove(&path));
            if let Err(e) = removed {
                tracing::warn!(subsystem = subsystem.name(), error = %e, "failed to remove cgroup");
            }
        }
        tracing::info!(path = %self.relative_path.display(), "cgroups destroyed");
    }

    fn for_each(&self, mut op: impl FnMut(&dyn Subsystem) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for subsystem in SUBSYSTEMS {
            if let Err(e) = op(subsystem) {
                tracing::warn!(subsystem = subsystem.name(), error = %e, "cgroup operation failed");
                let _ = first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
