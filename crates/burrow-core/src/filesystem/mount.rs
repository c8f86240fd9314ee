//! Mount utilities for container filesystem setup.
//!
//! Thin wrappers over `mount(2)`/`umount2(2)` that tag every failure with
//! the step it belongs to.

use std::path::Path;

use burrow_common::error::{BurrowError, Result};

/// Creates a bind mount from `source` onto `target`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn bind_mount(source: &Path, target: &Path, recursive: bool) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let mut flags = MsFlags::MS_BIND;
    if recursive {
        flags |= MsFlags::MS_REC;
    }
    mount(Some(source), target, None::<&str>, flags, None::<&str>)
        .map_err(|e| BurrowError::mount("bind mount", e as i32))?;
    tracing::debug!(
        source = %source.display(),
        target = %target.display(),
        recursive,
        "bind mount created"
    );
    Ok(())
}

/// Marks every mount in the current namespace as private, recursively.
///
/// Without this, mounts made inside a fresh mount namespace propagate back
/// to the host on systems whose root is a shared mount.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn make_rprivate() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| BurrowError::mount("make root private", e as i32))
}

/// Mounts a fresh `proc` filesystem at `/proc`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_proc() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let flags = MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV;
    mount(Some("proc"), "/proc", Some("proc"), flags, None::<&str>)
        .map_err(|e| BurrowError::mount("mount /proc", e as i32))?;
    tracing::debug!("proc mounted");
    Ok(())
}

/// Mounts a fresh `tmpfs` at `/dev`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_dev() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let flags = MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME;
    mount(Some("tmpfs"), "/dev", Some("tmpfs"), flags, Some("mode=755"))
        .map_err(|e| BurrowError::mount("mount /dev", e as i32))?;
    tracing::debug!("tmpfs mounted at /dev");
    Ok(())
}

/// Lazily detaches the filesystem mounted at `target`.
///
/// # Errors
///
/// Returns an error if the `umount2(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn detach(target: &Path) -> Result<()> {
    nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH)
        .map_err(|e| BurrowError::mount("unmount", e as i32))?;
    tracing::debug!(target = %target.display(), "unmounted");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> BurrowError {
    BurrowError::Config {
        message: "Linux required for native container operations".into(),
    }
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn bind_mount(_source: &Path, _target: &Path, _recursive: bool) -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn make_rprivate() -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_proc() -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_dev() -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: unmounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn detach(_target: &Path) -> Result<()> {
    Err(unsupported())
}
