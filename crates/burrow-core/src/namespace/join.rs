//! Joining the namespaces of a running container via `setns(2)`.

use std::path::{Path, PathBuf};

use burrow_common::error::{BurrowError, Result};

/// Namespace files under `/proc/<pid>/ns`, in the order they are joined.
///
/// The mount namespace comes last: once joined, `/proc` belongs to the
/// container and the remaining files would no longer resolve.
pub const JOIN_ORDER: [&str; 5] = ["ipc", "uts", "net", "pid", "mnt"];

/// Returns the namespace file paths of `pid` below `proc_root`, in join order.
#[must_use]
pub fn namespace_paths(proc_root: &Path, pid: i32) -> Vec<PathBuf> {
    let ns_dir = proc_root.join(pid.to_string()).join("ns");
    JOIN_ORDER.iter().map(|ns| ns_dir.join(ns)).collect()
}

/// Moves the calling thread into every namespace of `pid`.
///
/// All namespace files are opened before the first `setns`. Joining the
/// PID namespace only affects children forked afterwards.
///
/// # Errors
///
/// Returns an error if a namespace file cannot be opened or `setns(2)` fails.
#[cfg(target_os = "linux")]
pub fn join_namespaces(pid: i32) -> Result<()> {
    use nix::sched::{CloneFlags, setns};

    let files = namespace_paths(Path::new("/proc"), pid)
        .into_iter()
        .map(|path| std::fs::File::open(&path).map_err(|e| BurrowError::io(path, e)))
        .collect::<Result<Vec<_>>>()?;

    for (name, file) in JOIN_ORDER.iter().zip(&files) {
        setns(file, CloneFlags::empty()).map_err(|e| BurrowError::Setup {
            message: format!("setns {name} of pid {pid} failed: {e}"),
        })?;
        tracing::debug!(namespace = name, pid, "joined namespace");
    }
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: namespace joining requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn join_namespaces(_pid: i32) -> Result<()> {
    Err(BurrowError::Config {
        message: "Linux required for native container operations".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_namespace_is_joined_last() {
        let paths = namespace_paths(Path::new("/proc"), 42);
        assert_eq!(paths.first(), Some(&PathBuf::from("/proc/42/ns/ipc")));
        assert_eq!(paths.last(), Some(&PathBuf::from("/proc/42/ns/mnt")));
        assert_eq!(paths.len(), 5);
    }

    #[test]
    fn joining_a_missing_process_fails_before_any_setns() {
        let err = join_namespaces(i32::MAX).unwrap_err();
        assert!(matches!(err, BurrowError::Io { .. } | BurrowError::Config { .. }));
    }
}
