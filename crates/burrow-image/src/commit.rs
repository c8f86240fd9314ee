//! Snapshotting a container root into an image archive.

use std::fs::File;
use std::path::Path;

use burrow_common::error::{BurrowError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;

/// Writes `source` as a gzip-compressed tar archive at `archive_path`.
///
/// Entries are stored relative to `source`, so extracting the archive
/// recreates the tree at the extraction root. Symlinks are archived as
/// links, not followed. The archive is written next to its destination
/// and renamed into place, so an existing image is only replaced by a
/// complete one.
///
/// Returns the size of the written archive in bytes.
///
/// # Errors
///
/// Returns an error if `source` cannot be walked or the archive cannot be written.
pub fn create_archive(source: &Path, archive_path: &Path) -> Result<u64> {
    if !source.is_dir() {
        return Err(BurrowError::NotFound {
            kind: "container root",
            id: source.display().to_string(),
        });
    }
    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BurrowError::io(parent, e))?;
    }

    let partial = archive_path.with_extension("partial");
    let written = write_archive(source, &partial);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }
    std::fs::rename(&partial, archive_path).map_err(|e| BurrowError::io(archive_path, e))?;

    let size = std::fs::metadata(archive_path)
        .map_err(|e| BurrowError::io(archive_path, e))?
        .len();
    tracing::info!(
        source = %source.display(),
        archive = %archive_path.display(),
        size,
        "image committed"
    );
    Ok(size)
}

fn write_archive(source: &Path, destination: &Path) -> Result<()> {
    let file = File::create(destination).map_err(|e| BurrowError::io(destination, e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder
        .append_dir_all(".", source)
        .map_err(|e| BurrowError::io(source, e))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| BurrowError::io(destination, e))?;
    let _ = encoder
        .finish()
        .map_err(|e| BurrowError::io(destination, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::extract_layer;

    #[test]
    fn committed_archive_extracts_to_the_same_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mnt/c1");
        std::fs::create_dir_all(root.join("etc")).unwrap();
        std::fs::write(root.join("etc/hostname"), "c1\n").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink("/etc/hostname", root.join("hostname-link")).unwrap();

        let archive = dir.path().join("images/snap.tar");
        let size = create_archive(&root, &archive).unwrap();
        assert!(size > 0);
        assert!(!archive.with_extension("partial").exists());

        let out = dir.path().join("images/snap");
        let layer = extract_layer(&archive, &out).unwrap();
        assert!(layer.compressed);
        assert_eq!(std::fs::read_to_string(out.join("etc/hostname")).unwrap(), "c1\n");
        #[cfg(unix)]
        assert!(
            std::fs::symlink_metadata(out.join("hostname-link"))
                .unwrap()
                .file_type()
                .is_symlink()
        );
    }

    #[test]
    fn missing_root_is_not_found_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("snap.tar");
        let err = create_archive(&dir.path().join("absent"), &archive).unwrap_err();
        assert!(matches!(err, BurrowError::NotFound { .. }));
        assert!(!archive.exists());
    }
}
