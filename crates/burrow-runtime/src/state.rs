//! Persistent container state.
//!
//! Every container owns a directory under the info root holding its
//! `config.json` record and, when detached, its `container.log`. Records
//! are the only place lifecycle state lives; the engine reloads them on
//! every operation.

use std::path::{Path, PathBuf};

use burrow_common::constants::{CONFIG_NAME, NETWORK_DIR};
use burrow_common::error::{BurrowError, Result};
use burrow_common::types::{ContainerId, ContainerStatus, VolumeSpec};
use serde::{Deserialize, Serialize};

/// Format of [`ContainerRecord::created_time`].
pub const CREATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Checks that `name` can be used as a container name.
///
/// A name becomes a single directory under the info root, so it must be a
/// plain path component and must not collide with the network state.
///
/// # Errors
///
/// Returns [`BurrowError::Config`] for an empty name, `.`, `..`, a name
/// containing `/` or NUL, or the reserved network directory name.
pub fn validate_name(name: &str) -> Result<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\0']);
    if plain && name != NETWORK_DIR {
        Ok(())
    } else {
        Err(BurrowError::Config {
            message: format!("invalid container name `{name}`"),
        })
    }
}

/// Persisted metadata of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Host pid of the container init process; empty unless running.
    pub pid: String,
    /// Unique container identifier.
    pub id: ContainerId,
    /// Container name, defaults to the id.
    pub name: String,
    /// Command line the container was started with.
    pub command: String,
    /// Local creation time, see [`CREATE_TIME_FORMAT`].
    #[serde(rename = "createTime")]
    pub created_time: String,
    /// Lifecycle state.
    pub status: ContainerStatus,
    /// `HOST:CONTAINER` volume, empty when none.
    pub volume: String,
    /// `HOST:CONTAINER` port mappings, in the order given.
    #[serde(rename = "portmapping", default)]
    pub port_mapping: Vec<String>,
}

impl ContainerRecord {
    /// Creates the record of a container whose init process is `pid`,
    /// stamped with the current local time.
    #[must_use]
    pub fn running(
        id: ContainerId,
        name: impl Into<String>,
        pid: u32,
        command: impl Into<String>,
        volume: Option<&VolumeSpec>,
        port_mapping: Vec<String>,
    ) -> Self {
        Self {
            pid: pid.to_string(),
            id,
            name: name.into(),
            command: command.into(),
            created_time: chrono::Local::now().format(CREATE_TIME_FORMAT).to_string(),
            status: ContainerStatus::Running,
            volume: volume.map(ToString::to_string).unwrap_or_default(),
            port_mapping,
        }
    }

    /// Pid of the init process while the container is running.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::StateViolation`] if the container is not
    /// running, or a config error if the stored pid is not a positive
    /// number. Zero and negative values address process groups in
    /// `kill(2)`, never a single container.
    pub fn running_pid(&self) -> Result<i32> {
        if self.status != ContainerStatus::Running {
            return Err(BurrowError::StateViolation {
                message: format!("container {} is {}, not running", self.name, self.status),
            });
        }
        match self.pid.parse::<i32>() {
            Ok(pid) if pid > 0 => Ok(pid),
            _ => Err(BurrowError::Config {
                message: format!("container {} has invalid pid `{}`", self.name, self.pid),
            }),
        }
    }

    /// Moves the record from running to stopped and clears the pid.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::StateViolation`] unless the container is running.
    pub fn stop(&mut self) -> Result<()> {
        if self.status != ContainerStatus::Running {
            return Err(BurrowError::StateViolation {
                message: format!("cannot stop container {}: it is {}", self.name, self.status),
            });
        }
        self.status = ContainerStatus::Stopped;
        self.pid.clear();
        Ok(())
    }

    /// Checks that the container may be removed.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::StateViolation`] unless the container is stopped.
    pub fn ensure_removable(&self) -> Result<()> {
        if self.status == ContainerStatus::Stopped {
            Ok(())
        } else {
            Err(BurrowError::StateViolation {
                message: format!(
                    "cannot remove container {}: it is {}, stop it first",
                    self.name, self.status
                ),
            })
        }
    }

    /// Parsed volume, if one was recorded.
    #[must_use]
    pub fn volume_spec(&self) -> Option<VolumeSpec> {
        if self.volume.is_empty() {
            return None;
        }
        self.volume.parse().ok()
    }
}

/// On-disk store of container records.
#[derive(Debug, Clone)]
pub struct ContainerStore {
    root: PathBuf,
}

impl ContainerStore {
    /// Creates a store rooted at `root` (one subdirectory per container).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding one container's files.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of one container's detached output log.
    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        crate::logs::log_path(&self.root, name)
    }

    fn config_path(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(CONFIG_NAME)
    }

    /// Returns `true` if a record exists for `name`.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.config_path(name).is_file()
    }

    /// Writes `record`, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the directory or file
    /// cannot be written.
    pub fn save(&self, record: &ContainerRecord) -> Result<()> {
        validate_name(&record.name)?;
        let dir = self.container_dir(&record.name);
        std::fs::create_dir_all(&dir).map_err(|e| BurrowError::io(&dir, e))?;
        let path = dir.join(CONFIG_NAME);
        let json = serde_json::to_string(record)?;
        std::fs::write(&path, json).map_err(|e| BurrowError::io(&path, e))?;
        tracing::debug!(name = %record.name, status = %record.status, "record saved");
        Ok(())
    }

    /// Reads the record of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::NotFound`] if there is no record, or an error
    /// if the name is invalid or the record cannot be read or parsed.
    pub fn load(&self, name: &str) -> Result<ContainerRecord> {
        validate_name(name)?;
        let path = self.config_path(name);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BurrowError::NotFound {
                    kind: "container",
                    id: name.to_string(),
                });
            }
            Err(e) => return Err(BurrowError::io(path, e)),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Deletes the whole directory of `name`, log included.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, or the directory exists
    /// and cannot be removed.
    pub fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.container_dir(name);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!(name, "record deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BurrowError::io(dir, e)),
        }
    }

    /// Loads every record, ordered by creation time.
    ///
    /// The network state directory and entries that cannot be read are
    /// skipped, the latter with a log line.
    ///
    /// # Errors
    ///
    /// Returns an error if the root exists but cannot be listed.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BurrowError::io(&self.root, e)),
        };

        let mut records: Vec<ContainerRecord> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir() && !is_reserved(&entry.path()))
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                self.load(&name)
                    .inspect_err(|e| tracing::warn!(name, error = %e, "skipping container"))
                    .ok()
            })
            .collect();
        records.sort_by(|a, b| a.created_time.cmp(&b.created_time).then(a.name.cmp(&b.name)));
        Ok(records)
    }
}

/// The network state shares the info root by default.
fn is_reserved(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == NETWORK_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ContainerRecord {
        ContainerRecord::running(
            ContainerId::new("a1b2c3d4e5"),
            name,
            4242,
            "/bin/sh -c top",
            Some(&"/data:/mnt/data".parse().unwrap()),
            vec!["8080:80".into(), "2222:22".into(), "53:53".into()],
        )
    }

    #[test]
    fn record_round_trips_every_field() {
        let original = record("c1");
        let json = serde_json::to_string(&original).unwrap();
        let back: ContainerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
        assert_eq!(back.port_mapping, ["8080:80", "2222:22", "53:53"]);
    }

    #[test]
    fn record_uses_legacy_field_names() {
        let json = serde_json::to_string(&record("c1")).unwrap();
        for field in [
            "\"pid\":\"4242\"",
            "\"name\":\"c1\"",
            "\"createTime\":",
            "\"status\":\"running\"",
            "\"volume\":\"/data:/mnt/data\"",
            "\"portmapping\":[",
        ] {
            assert!(json.contains(field), "{field} missing from {json}");
        }
    }

    #[test]
    fn create_time_has_second_precision() {
        let created = record("c1").created_time;
        assert!(chrono::NaiveDateTime::parse_from_str(&created, CREATE_TIME_FORMAT).is_ok());
    }

    #[test]
    fn stop_clears_pid_and_blocks_second_stop() {
        let mut rec = record("c1");
        assert_eq!(rec.running_pid().unwrap(), 4242);
        rec.stop().unwrap();
        assert_eq!(rec.status, ContainerStatus::Stopped);
        assert!(rec.pid.is_empty());
        assert!(matches!(rec.stop(), Err(BurrowError::StateViolation { .. })));
        assert!(rec.running_pid().is_err());
    }

    #[test]
    fn corrupted_pids_are_never_signalled() {
        for pid in ["0", "-1", "-4242", "", "abc"] {
            let mut rec = record("c1");
            rec.pid = pid.into();
            assert!(
                matches!(rec.running_pid(), Err(BurrowError::Config { .. })),
                "{pid:?} accepted"
            );
        }
    }

    #[test]
    fn only_stopped_records_are_removable() {
        let mut rec = record("c1");
        assert!(matches!(rec.ensure_removable(), Err(BurrowError::StateViolation { .. })));
        rec.stop().unwrap();
        rec.ensure_removable().unwrap();
    }

    #[test]
    fn store_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path());
        let rec = record("c1");
        store.save(&rec).unwrap();

        assert!(store.exists("c1"));
        let raw = std::fs::read_to_string(dir.path().join("c1/config.json")).unwrap();
        assert!(raw.contains("\"name\":\"c1\""));
        assert_eq!(store.load("c1").unwrap(), rec);

        store.delete("c1").unwrap();
        assert!(!dir.path().join("c1").exists());
        assert!(matches!(store.load("c1"), Err(BurrowError::NotFound { .. })));
        store.delete("c1").unwrap();
    }

    #[test]
    fn list_skips_network_dir_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path());
        store.save(&record("c1")).unwrap();
        store.save(&record("c2")).unwrap();
        std::fs::create_dir_all(dir.path().join("network/network")).unwrap();
        std::fs::create_dir_all(dir.path().join("broken")).unwrap();
        std::fs::write(dir.path().join("broken/config.json"), "{").unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["c1", "c2"]);
    }

    #[test]
    fn names_must_be_plain_unreserved_components() {
        for name in ["c1", "web.1", "a-b_c", "..x"] {
            validate_name(name).unwrap();
        }
        for name in ["", ".", "..", "a/b", "../c1", "/abs", "network", "nul\0"] {
            assert!(
                matches!(validate_name(name), Err(BurrowError::Config { .. })),
                "{name:?} accepted"
            );
        }
    }

    #[test]
    fn store_never_touches_network_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path());
        let definition = dir.path().join("network/network/br0");
        std::fs::create_dir_all(definition.parent().unwrap()).unwrap();
        std::fs::write(&definition, "{}").unwrap();

        assert!(store.save(&record("network")).is_err());
        assert!(store.delete("network").is_err());
        assert!(store.load("network").is_err());
        assert!(!store.exists("network"));
        assert!(definition.exists());
    }

    #[test]
    fn list_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }
}
