//! Linux namespace management for container isolation.
//!
//! New containers get their namespaces from the `clone(2)` flags built
//! here; `exec` joins an existing container through [`join`].

pub mod join;

/// Which namespaces a new container process is created in.
///
/// User and cgroup namespaces are never requested: the container runs as
/// host root and sees the host cgroup tree.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate mount namespace.
    pub mount: bool,
    /// Isolate network namespace.
    pub network: bool,
    /// Isolate IPC namespace.
    pub ipc: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            uts: true,
            pid: true,
            mount: true,
            network: true,
            ipc: true,
        }
    }
}

#[cfg(target_os = "linux")]
impl NamespaceConfig {
    /// Returns the `clone(2)` flags requesting the configured namespaces.
    #[must_use]
    pub fn clone_flags(&self) -> nix::sched::CloneFlags {
        use nix::sched::CloneFlags;

        [
            (self.uts, CloneFlags::CLONE_NEWUTS),
            (self.pid, CloneFlags::CLONE_NEWPID),
            (self.mount, CloneFlags::CLONE_NEWNS),
            (self.network, CloneFlags::CLONE_NEWNET),
            (self.ipc, CloneFlags::CLONE_NEWIPC),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(CloneFlags::empty(), |acc, (_, flag)| acc | flag)
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use nix::sched::CloneFlags;

    use super::*;

    #[test]
    fn default_requests_five_namespaces_without_user() {
        let flags = NamespaceConfig::default().clone_flags();
        assert!(flags.contains(
            CloneFlags::CLONE_NEWUTS
                | CloneFlags::CLONE_NEWPID
                | CloneFlags::CLONE_NEWNS
                | CloneFlags::CLONE_NEWNET
                | CloneFlags::CLONE_NEWIPC
        ));
        assert!(!flags.contains(CloneFlags::CLONE_NEWUSER));
        assert!(!flags.contains(CloneFlags::CLONE_NEWCGROUP));
    }

    #[test]
    fn disabled_namespaces_are_left_out() {
        let config = NamespaceConfig {
            network: false,
            ..NamespaceConfig::default()
        };
        assert!(!config.clone_flags().contains(CloneFlags::CLONE_NEWNET));
    }
}
