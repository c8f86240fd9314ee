//! Per-container layered root filesystem.
//!
//! A container root is an overlay of a writable layer on top of the
//! extracted image, plus an optional host directory bound inside it:
//!
//! ```text
//! <image_root>/<image>            read-only, shared by every container of the image
//! <write_layer_root>/<name>/upper writable layer
//! <write_layer_root>/<name>/work  overlay scratch space
//! <mnt_root>/<name>               merged view, becomes the container's `/`
//! ```

use std::path::{Path, PathBuf};

use burrow_common::config::EngineConfig;
use burrow_common::error::{BurrowError, Result};
use burrow_common::types::VolumeSpec;

use super::mount;
use super::overlayfs::{self, OverlayConfig};

/// Extracts an image archive (first argument) into a directory (second argument).
pub type ImageUnpacker<'a> = &'a dyn Fn(&Path, &Path) -> Result<()>;

/// Makes sure the read-only layer of an image exists.
///
/// Extraction happens only when `layer` is missing. Returns `true` when the
/// archive was unpacked by this call. A failed extraction removes the
/// partially filled directory so a later run can retry.
///
/// # Errors
///
/// Returns an error if the archive is missing, the directory cannot be
/// created, or the unpacker fails.
pub fn prepare_read_only_layer(
    layer: &Path,
    archive: &Path,
    unpack: ImageUnpacker<'_>,
) -> Result<bool> {
    if layer.exists() {
        tracing::debug!(layer = %layer.display(), "read-only layer already extracted");
        return Ok(false);
    }
    if !archive.is_file() {
        return Err(BurrowError::NotFound {
            kind: "image archive",
            id: archive.display().to_string(),
        });
    }
    std::fs::create_dir_all(layer).map_err(|e| BurrowError::io(layer, e))?;
    if let Err(e) = unpack(archive, layer) {
        if let Err(cleanup) = std::fs::remove_dir_all(layer) {
            tracing::warn!(layer = %layer.display(), error = %cleanup, "failed to remove partial layer");
        }
        return Err(e);
    }
    tracing::info!(archive = %archive.display(), layer = %layer.display(), "image extracted");
    Ok(true)
}

/// The layered root filesystem of one container.
#[derive(Debug, Clone)]
pub struct LayeredFilesystem {
    container: String,
    config: EngineConfig,
    write_layer: PathBuf,
    mount_path: PathBuf,
    volume: Option<VolumeSpec>,
}

impl LayeredFilesystem {
    /// Describes the filesystem of `container`; nothing is touched on disk.
    #[must_use]
    pub fn new(config: &EngineConfig, container: &str, volume: Option<VolumeSpec>) -> Self {
        Self {
            container: container.to_string(),
            config: config.clone(),
            write_layer: config.write_layer_path(container),
            mount_path: config.mount_path(container),
            volume,
        }
    }

    /// Union mount point, the future `/` of the container.
    #[must_use]
    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    /// Per-container writable layer directory.
    #[must_use]
    pub fn write_layer(&self) -> &Path {
        &self.write_layer
    }

    /// Builds the root filesystem for `image`.
    ///
    /// Steps run in order: read-only layer, writable layer, union mount,
    /// volume bind. Nothing is undone on failure; call [`Self::teardown`].
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub fn build(&self, image: &str, unpack: ImageUnpacker<'_>) -> Result<()> {
        let layer = self.config.image_layer_path(image);
        let _ = prepare_read_only_layer(&layer, &self.config.image_archive_path(image), unpack)?;

        let overlay = self.overlay_config(layer);
        for dir in [&overlay.upper_dir, &overlay.work_dir] {
            std::fs::create_dir_all(dir).map_err(|e| BurrowError::io(dir, e))?;
        }
        overlayfs::mount_overlay(&overlay)?;

        if let Some(volume) = &self.volume {
            self.mount_volume(volume)?;
        }
        tracing::info!(
            container = %self.container,
            image,
            mount = %self.mount_path.display(),
            "layered filesystem ready"
        );
        Ok(())
    }

    /// Unmounts and deletes everything [`Self::build`] created, except the
    /// shared read-only layer.
    ///
    /// Every step is attempted; failures are logged.
    pub fn teardown(&self) {
        if let Some(volume) = &self.volume {
            let target = self.mount_path.join(volume.container_relative());
            if let Err(e) = mount::detach(&target) {
                tracing::warn!(target = %target.display(), error = %e, "failed to unmount volume");
            }
        }

        if let Err(e) = overlayfs::unmount_overlay(&self.mount_path) {
            tracing::warn!(path = %self.mount_path.display(), error = %e, "failed to unmount root");
        }
        // A plain rmdir refuses a directory that is still mounted or non-empty.
        if let Err(e) = std::fs::remove_dir(&self.mount_path) {
            tracing::warn!(path = %self.mount_path.display(), error = %e, "failed to remove mount point");
        }

        if let Err(e) = std::fs::remove_dir_all(&self.write_layer) {
            tracing::warn!(path = %self.write_layer.display(), error = %e, "failed to remove write layer");
        }
        tracing::info!(container = %self.container, "layered filesystem torn down");
    }

    fn overlay_config(&self, image_layer: PathBuf) -> OverlayConfig {
        OverlayConfig {
            upper_dir: self.write_layer.join("upper"),
            lower_dirs: vec![image_layer],
            work_dir: self.write_layer.join("work"),
            merged_dir: self.mount_path.clone(),
        }
    }

    fn mount_volume(&self, volume: &VolumeSpec) -> Result<()> {
        let target = self.mount_path.join(volume.container_relative());
        for dir in [&volume.host, &target] {
            std::fs::create_dir_all(dir).map_err(|e| BurrowError::io(dir, e))?;
        }
        mount::bind_mount(&volume.host, &target, false)?;
        tracing::info!(container = %self.container, volume = %volume, "volume mounted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn scratch_config(root: &Path) -> EngineConfig {
        EngineConfig::default()
            .with_state_root(&root.join("state"))
            .with_image_root(root)
    }

    #[test]
    fn read_only_layer_is_extracted_once() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("busybox.tar");
        std::fs::write(&archive, b"archive").unwrap();
        let layer = dir.path().join("busybox");

        let calls = Cell::new(0);
        let unpack = |_: &Path, to: &Path| {
            calls.set(calls.get() + 1);
            std::fs::write(to.join("bin"), b"").map_err(|e| BurrowError::io(to, e))
        };

        assert!(prepare_read_only_layer(&layer, &archive, &unpack).unwrap());
        assert!(!prepare_read_only_layer(&layer, &archive, &unpack).unwrap());
        assert_eq!(calls.get(), 1);
        assert!(layer.join("bin").exists());
    }

    #[test]
    fn missing_archive_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let unpack = |_: &Path, _: &Path| -> Result<()> { Ok(()) };
        let err = prepare_read_only_layer(
            &dir.path().join("nope"),
            &dir.path().join("nope.tar"),
            &unpack,
        )
        .unwrap_err();
        assert!(matches!(err, BurrowError::NotFound { .. }));
        assert!(!dir.path().join("nope").exists());
    }

    #[test]
    fn failed_extraction_leaves_no_layer_behind() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.tar");
        std::fs::write(&archive, b"garbage").unwrap();
        let layer = dir.path().join("broken");
        let unpack = |_: &Path, _: &Path| -> Result<()> {
            Err(BurrowError::Setup {
                message: "corrupt archive".into(),
            })
        };
        assert!(prepare_read_only_layer(&layer, &archive, &unpack).is_err());
        assert!(!layer.exists());
    }

    #[test]
    fn paths_follow_config() {
        let cfg = EngineConfig::default();
        let fs = LayeredFilesystem::new(&cfg, "c1", None);
        assert_eq!(fs.mount_path(), Path::new("/root/mnt/c1"));
        assert_eq!(fs.write_layer(), Path::new("/root/writeLayer/c1"));
        let opts = fs.overlay_config(cfg.image_layer_path("busybox")).options();
        assert!(opts.starts_with("upperdir=/root/writeLayer/c1/upper,lowerdir=/root/busybox"));
    }

    #[test]
    fn teardown_removes_write_layer_and_keeps_image() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = scratch_config(dir.path());
        let fs = LayeredFilesystem::new(&cfg, "c1", None);
        std::fs::create_dir_all(fs.write_layer().join("upper/etc")).unwrap();
        std::fs::create_dir_all(fs.mount_path()).unwrap();
        std::fs::create_dir_all(cfg.image_layer_path("busybox")).unwrap();

        fs.teardown();

        assert!(!fs.write_layer().exists());
        assert!(!fs.mount_path().exists());
        assert!(cfg.image_layer_path("busybox").exists());
    }

    #[test]
    fn teardown_of_missing_filesystem_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let volume: VolumeSpec = "/tmp/host:/data".parse().unwrap();
        LayeredFilesystem::new(&scratch_config(dir.path()), "ghost", Some(volume)).teardown();
    }
}
