//! Container log management.
//!
//! A detached container's standard output goes straight into
//! `<info_root>/<name>/container.log`; the engine never copies or rotates it.

use std::fs::File;
use std::path::{Path, PathBuf};

use burrow_common::constants::CONTAINER_LOG_FILE;
use burrow_common::error::{BurrowError, Result};

/// Returns the log file path for a container.
#[must_use]
pub fn log_path(info_root: &Path, name: &str) -> PathBuf {
    info_root.join(name).join(CONTAINER_LOG_FILE)
}

/// Creates (or truncates) the log file of a container, creating its
/// directory if needed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn create_log(info_root: &Path, name: &str) -> Result<File> {
    let path = log_path(info_root, name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BurrowError::io(parent, e))?;
    }
    File::create(&path).map_err(|e| BurrowError::io(path, e))
}

/// Reads container logs from disk.
///
/// # Errors
///
/// Returns an error naming the file if it does not exist or cannot be read.
pub fn read_logs(info_root: &Path, name: &str) -> Result<String> {
    let path = log_path(info_root, name);
    std::fs::read_to_string(&path).map_err(|e| BurrowError::Io { path, source: e })
}

/// Removes the directory [`create_log`] made for a container that never
/// got a record. Failures are logged.
pub fn discard_log(info_root: &Path, name: &str) {
    let dir = info_root.join(name);
    match std::fs::remove_dir_all(&dir) {
        Ok(()) => tracing::debug!(name, "container log discarded"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %dir.display(), error = %e, "failed to discard log"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn log_path_is_constructed_correctly() {
        let p = log_path(Path::new("/var/run/burrow"), "c1");
        assert_eq!(p.to_str().unwrap(), "/var/run/burrow/c1/container.log");
    }

    #[test]
    fn read_logs_missing_file_names_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_logs(dir.path(), "nonexistent").unwrap_err();
        assert!(err.to_string().contains("nonexistent/container.log"));
    }

    #[test]
    fn create_then_read_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut file = create_log(dir.path(), "c1").expect("create");
        writeln!(file, "line one").expect("write 1");
        writeln!(file, "line two").expect("write 2");

        let content = read_logs(dir.path(), "c1").expect("read");
        assert_eq!(content, "line one\nline two\n");
    }

    #[test]
    fn create_truncates_previous_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        writeln!(create_log(dir.path(), "c1").unwrap(), "old").unwrap();
        let _ = create_log(dir.path(), "c1").unwrap();
        assert!(read_logs(dir.path(), "c1").unwrap().is_empty());
    }

    #[test]
    fn discard_removes_the_container_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        writeln!(create_log(dir.path(), "c1").unwrap(), "partial").unwrap();
        discard_log(dir.path(), "c1");
        assert!(!dir.path().join("c1").exists());
        assert!(read_logs(dir.path(), "c1").is_err());
        discard_log(dir.path(), "c1");
    }

    #[test]
    fn separate_containers_have_separate_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        writeln!(create_log(dir.path(), "a").unwrap(), "from a").unwrap();
        writeln!(create_log(dir.path(), "b").unwrap(), "from b").unwrap();

        let a_logs = read_logs(dir.path(), "a").expect("read a");
        assert!(a_logs.contains("from a"));
        assert!(!a_logs.contains("from b"));
    }
}
