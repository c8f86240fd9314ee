//! System-wide constants and default paths.

/// Directory holding one metadata directory per container.
pub const DEFAULT_INFO_ROOT: &str = "/var/run/burrow";

/// Directory holding persisted network definitions and the IPAM file.
pub const DEFAULT_NETWORK_ROOT: &str = "/var/run/burrow/network";

/// Directory holding image archives (`<image>.tar`) and their extracted read-only layers.
pub const DEFAULT_IMAGE_ROOT: &str = "/root";

/// Parent directory of per-container union mount points.
pub const DEFAULT_MNT_ROOT: &str = "/root/mnt";

/// Parent directory of per-container writable layers.
pub const DEFAULT_WRITE_LAYER_ROOT: &str = "/root/writeLayer";

/// Mount table scanned to locate cgroup v1 hierarchies.
pub const DEFAULT_MOUNTINFO: &str = "/proc/self/mountinfo";

/// Cgroup directory, relative to each hierarchy root, that parents every container cgroup.
pub const DEFAULT_CGROUP_PARENT: &str = "burrow";

/// Directory under the state root holding network state. Never a container name.
pub const NETWORK_DIR: &str = "network";

/// Name of the per-container metadata file.
pub const CONFIG_NAME: &str = "config.json";

/// Name of the per-container log file capturing detached stdout.
pub const CONTAINER_LOG_FILE: &str = "container.log";

/// Extension of image archive files.
pub const IMAGE_ARCHIVE_EXTENSION: &str = "tar";

/// Reserved argument that makes the binary run the in-container bootstrap.
pub const INIT_ARG: &str = "init";

/// Reserved argument that makes the binary join a container's namespaces.
pub const ENTER_ARG: &str = "enter";

/// Descriptor slot the startup-command pipe is installed at in the child.
pub const INIT_PIPE_FD: i32 = 3;

/// Environment variable carrying the target pid for `enter`.
pub const ENV_EXEC_PID: &str = "BURROW_EXEC_PID";

/// Environment variable carrying the command line for `enter`.
pub const ENV_EXEC_CMD: &str = "BURROW_EXEC_CMD";

/// Name of the staging directory that receives the old root during `pivot_root`.
pub const PIVOT_STAGING_DIR: &str = ".pivot_root";

/// Length of generated container ids.
pub const CONTAINER_ID_LENGTH: usize = 10;

/// Application name used in CLI output.
pub const APP_NAME: &str = "burrow";
