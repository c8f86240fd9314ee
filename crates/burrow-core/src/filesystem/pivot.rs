//! Secure root filesystem switching via `pivot_root(2)`.
//!
//! More secure than `chroot` because it actually changes the root mount
//! point rather than just the process's view of `/`. Every step is
//! irreversible; a failure leaves the process unusable and the caller must
//! exit rather than retry.

use std::path::Path;

use burrow_common::constants::PIVOT_STAGING_DIR;
use burrow_common::error::{BurrowError, Result};

use super::mount;

/// Switches the calling process onto `new_root` and mounts fresh `/proc`
/// and `/dev` filesystems.
///
/// Must run inside a private mount namespace.
///
/// # Errors
///
/// Returns a [`BurrowError::Mount`] naming the first step that failed.
pub fn enter_root(new_root: &Path) -> Result<()> {
    mount::make_rprivate()?;
    switch_root(new_root)?;
    mount::mount_proc()?;
    mount::mount_dev()?;
    tracing::info!(root = %new_root.display(), "root filesystem switched");
    Ok(())
}

/// Swaps the process root for `new_root` and detaches the old root.
///
/// # Errors
///
/// Returns a [`BurrowError::Mount`] naming the first step that failed.
#[cfg(target_os = "linux")]
pub fn switch_root(new_root: &Path) -> Result<()> {
    // pivot_root rejects a new root that is not itself a mount point.
    mount::bind_mount(new_root, new_root, true)?;

    let staging = new_root.join(PIVOT_STAGING_DIR);
    std::fs::create_dir_all(&staging).map_err(|e| BurrowError::Mount {
        step: "create pivot staging dir",
        source: e,
    })?;

    nix::unistd::pivot_root(new_root, &staging)
        .map_err(|e| BurrowError::mount("pivot_root", e as i32))?;
    nix::unistd::chdir("/").map_err(|e| BurrowError::mount("chdir /", e as i32))?;

    let old_root = Path::new("/").join(PIVOT_STAGING_DIR);
    nix::mount::umount2(&old_root, nix::mount::MntFlags::MNT_DETACH)
        .map_err(|e| BurrowError::mount("unmount old root", e as i32))?;
    std::fs::remove_dir(&old_root).map_err(|e| BurrowError::Mount {
        step: "remove pivot staging dir",
        source: e,
    })?;

    tracing::debug!(root = %new_root.display(), "pivot_root complete");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: `pivot_root` requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn switch_root(_new_root: &Path) -> Result<()> {
    Err(BurrowError::Config {
        message: "Linux required for native container operations".into(),
    })
}
