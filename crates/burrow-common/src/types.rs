//! Domain primitive types used across the burrow workspace.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BurrowError;

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    ///
    /// Ten hex digits taken from a v4 UUID. Callers that need uniqueness
    /// against existing records must check and regenerate.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(crate::constants::CONTAINER_ID_LENGTH);
        Self(id)
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The init process has been started and not yet stopped.
    Running,
    /// The init process was signalled by `stop`.
    Stopped,
    /// The init process exited on its own.
    Exited,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Resource limits for a container.
///
/// Values are passed verbatim to the kernel's control files. `None` means
/// the limit is left untouched, never that it is set to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory ceiling, e.g. `100m`.
    pub memory: Option<String>,
    /// Relative CPU weight, e.g. `512`.
    pub cpu_share: Option<String>,
    /// CPUs the container may run on, e.g. `0-1`.
    pub cpuset: Option<String>,
}

/// A host directory bind-mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Directory on the host.
    pub host: PathBuf,
    /// Directory inside the container, relative to its root.
    pub container: PathBuf,
}

impl VolumeSpec {
    /// Returns the container path with any leading `/` removed, so it can be
    /// joined onto a mount point.
    #[must_use]
    pub fn container_relative(&self) -> PathBuf {
        self.container
            .strip_prefix("/")
            .map_or_else(|_| self.container.clone(), PathBuf::from)
    }
}

impl FromStr for VolumeSpec {
    type Err = BurrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split(':').collect::<Vec<_>>().as_slice() {
            [host, container] if !host.is_empty() && !container.is_empty() => Ok(Self {
                host: PathBuf::from(host),
                container: PathBuf::from(container),
            }),
            _ => Err(BurrowError::Config {
                message: format!("volume must be HOST:CONTAINER, got `{s}`"),
            }),
        }
    }
}

impl fmt::Display for VolumeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host.display(), self.container.display())
    }
}

/// A `HOST:CONTAINER` TCP port forwarding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port on the host.
    pub host: u16,
    /// Port inside the container.
    pub container: u16,
}

impl FromStr for PortMapping {
    type Err = BurrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BurrowError::Config {
            message: format!("port mapping must be HOST:CONTAINER, got `{s}`"),
        };
        let (host, container) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            host: host.parse().map_err(|_| invalid())?,
            container: container.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_fixed_length() {
        let id = ContainerId::generate();
        assert_eq!(id.as_str().len(), crate::constants::CONTAINER_ID_LENGTH);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ContainerStatus::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
    }

    #[test]
    fn volume_spec_parses_pair() {
        let v: VolumeSpec = "/data:/mnt/data".parse().unwrap();
        assert_eq!(v.host, PathBuf::from("/data"));
        assert_eq!(v.container_relative(), PathBuf::from("mnt/data"));
    }

    #[test]
    fn volume_spec_rejects_missing_half() {
        assert!("/data:".parse::<VolumeSpec>().is_err());
        assert!("/data".parse::<VolumeSpec>().is_err());
        assert!("a:b:c".parse::<VolumeSpec>().is_err());
    }

    #[test]
    fn port_mapping_parses_and_displays() {
        let p: PortMapping = "8080:80".parse().unwrap();
        assert_eq!(p, PortMapping { host: 8080, container: 80 });
        assert_eq!(p.to_string(), "8080:80");
        assert!("80".parse::<PortMapping>().is_err());
        assert!("x:80".parse::<PortMapping>().is_err());
    }
}
