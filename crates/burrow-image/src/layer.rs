//! Read-only layer extraction.

use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use burrow_common::error::{BurrowError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Summary of an extracted image archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layer {
    /// Size of the archive in bytes.
    pub size_bytes: u64,
    /// Whether the archive was gzip-compressed.
    pub compressed: bool,
}

/// Extracts an image archive into `target`.
///
/// Compression is detected from the leading magic bytes rather than the
/// file name, since committed images are gzip data under a `.tar` name.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or unpacked.
pub fn extract_layer(archive_path: &Path, target: &Path) -> Result<Layer> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting layer"
    );

    std::fs::create_dir_all(target).map_err(|e| BurrowError::io(target, e))?;

    let mut file =
        std::fs::File::open(archive_path).map_err(|e| BurrowError::io(archive_path, e))?;
    let size_bytes = file
        .metadata()
        .map_err(|e| BurrowError::io(archive_path, e))?
        .len();
    let compressed = is_gzip(&mut file).map_err(|e| BurrowError::io(archive_path, e))?;

    let reader = BufReader::new(file);
    let unpacked = if compressed {
        tar::Archive::new(flate2::read::GzDecoder::new(reader)).unpack(target)
    } else {
        tar::Archive::new(reader).unpack(target)
    };
    unpacked.map_err(|e| BurrowError::io(target, e))?;

    tracing::info!(size = size_bytes, compressed, "layer extracted");
    Ok(Layer {
        size_bytes,
        compressed,
    })
}

/// Peeks at the first two bytes and rewinds.
fn is_gzip<R: Read + Seek>(reader: &mut R) -> std::io::Result<bool> {
    let mut magic = [0u8; 2];
    let n = reader.read(&mut magic)?;
    let _ = reader.seek(SeekFrom::Start(0))?;
    Ok(n == magic.len() && magic == GZIP_MAGIC)
}
