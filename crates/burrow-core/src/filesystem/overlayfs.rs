//! `OverlayFS` union mounts for layered container filesystems.
//!
//! Stacks one writable layer over the read-only image layer, so every
//! container sharing an image sees the same base and only pays for its own
//! changes.

use std::path::{Path, PathBuf};

use burrow_common::error::{BurrowError, Result};

/// Configuration for an `OverlayFS` mount.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Read-only lower layers (top to bottom).
    pub lower_dirs: Vec<PathBuf>,
    /// Work directory required by `OverlayFS`, on the same filesystem as `upper_dir`.
    pub work_dir: PathBuf,
    /// Final merged mount point.
    pub merged_dir: PathBuf,
}

impl OverlayConfig {
    /// Returns the mount data string.
    ///
    /// The writable layer is named first so the union treats it as the
    /// layer that receives writes.
    #[must_use]
    pub fn options(&self) -> String {
        let lowers = self
            .lower_dirs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        format!(
            "upperdir={},lowerdir={},workdir={}",
            self.upper_dir.display(),
            lowers,
            self.work_dir.display()
        )
    }
}

/// Mounts an `OverlayFS` with the given configuration.
///
/// Creates the upper, work, and merged directories if they do not exist,
/// then issues the `mount(2)` syscall with overlay-specific options.
///
/// # Errors
///
/// Returns an error if directory creation fails or if the mount syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_overlay(config: &OverlayConfig) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    for dir in [&config.upper_dir, &config.work_dir, &config.merged_dir] {
        std::fs::create_dir_all(dir).map_err(|e| BurrowError::io(dir, e))?;
    }

    let opts = config.options();
    mount(
        Some("overlay"),
        &config.merged_dir,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|e| BurrowError::mount("overlay mount", e as i32))?;

    tracing::info!(merged = %config.merged_dir.display(), options = %opts, "overlayfs mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: `OverlayFS` mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_overlay(_config: &OverlayConfig) -> Result<()> {
    Err(BurrowError::Config {
        message: "Linux required for native container operations".into(),
    })
}

/// Unmounts an `OverlayFS` at the given path.
///
/// Uses `MNT_DETACH` to lazily detach the filesystem.
///
/// # Errors
///
/// Returns an error if the unmount syscall fails.
pub fn unmount_overlay(merged_dir: &Path) -> Result<()> {
    super::mount::detach(merged_dir)?;
    tracing::info!(path = %merged_dir.display(), "overlayfs unmounted");
    Ok(())
}
