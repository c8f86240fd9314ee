//! Global configuration model for the burrow engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration for the engine.
///
/// Every on-disk location the engine touches is derived from this struct,
/// which lets tests point the whole engine at a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Parent of the per-container metadata directories.
    pub info_root: PathBuf,
    /// Directory holding image archives and extracted read-only layers.
    pub image_root: PathBuf,
    /// Parent of the per-container union mount points.
    pub mnt_root: PathBuf,
    /// Parent of the per-container writable layers.
    pub write_layer_root: PathBuf,
    /// Directory holding network definitions and address allocations.
    pub network_root: PathBuf,
    /// Mount table scanned for cgroup hierarchies.
    pub mountinfo_path: PathBuf,
    /// Cgroup directory (relative to each hierarchy) that parents container cgroups.
    pub cgroup_parent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            info_root: PathBuf::from(constants::DEFAULT_INFO_ROOT),
            image_root: PathBuf::from(constants::DEFAULT_IMAGE_ROOT),
            mnt_root: PathBuf::from(constants::DEFAULT_MNT_ROOT),
            write_layer_root: PathBuf::from(constants::DEFAULT_WRITE_LAYER_ROOT),
            network_root: PathBuf::from(constants::DEFAULT_NETWORK_ROOT),
            mountinfo_path: PathBuf::from(constants::DEFAULT_MOUNTINFO),
            cgroup_parent: constants::DEFAULT_CGROUP_PARENT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Relocates the metadata and network state under `root`.
    #[must_use]
    pub fn with_state_root(mut self, root: &Path) -> Self {
        self.info_root = root.to_path_buf();
        self.network_root = root.join(constants::NETWORK_DIR);
        self
    }

    /// Relocates images, mount points, and writable layers under `root`.
    #[must_use]
    pub fn with_image_root(mut self, root: &Path) -> Self {
        self.image_root = root.to_path_buf();
        self.mnt_root = root.join("mnt");
        self.write_layer_root = root.join("writeLayer");
        self
    }

    /// Returns the metadata directory of a container.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.info_root.join(name)
    }

    /// Returns the union mount point of a container.
    #[must_use]
    pub fn mount_path(&self, name: &str) -> PathBuf {
        self.mnt_root.join(name)
    }

    /// Returns the writable layer of a container.
    #[must_use]
    pub fn write_layer_path(&self, name: &str) -> PathBuf {
        self.write_layer_root.join(name)
    }

    /// Returns the extracted read-only layer of an image.
    #[must_use]
    pub fn image_layer_path(&self, image: &str) -> PathBuf {
        self.image_root.join(image)
    }

    /// Returns the archive file of an image.
    #[must_use]
    pub fn image_archive_path(&self, image: &str) -> PathBuf {
        self.image_root
            .join(format!("{image}.{}", constants::IMAGE_ARCHIVE_EXTENSION))
    }

    /// Returns the cgroup path of a container, relative to each hierarchy root.
    #[must_use]
    pub fn cgroup_relative_path(&self, container_id: &str) -> PathBuf {
        Path::new(&self.cgroup_parent).join(container_id)
    }
}
