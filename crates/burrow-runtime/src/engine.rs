//! Runtime engine that orchestrates container lifecycle.
//!
//! The engine holds no container state of its own: every operation reloads
//! the record from the [`ContainerStore`] and writes it back.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use burrow_common::config::EngineConfig;
use burrow_common::error::{BurrowError, Result};
use burrow_common::types::{ContainerId, ResourceLimits, VolumeSpec};
use burrow_core::cgroup::CgroupManager;
use burrow_core::filesystem::workspace::LayeredFilesystem;
use burrow_network::NetworkConnector;

use crate::process::{self, LaunchSpec};
use crate::state::{ContainerRecord, ContainerStore, validate_name};

/// Everything `burrow run` accepts.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Attach to the terminal and clean up once the container exits.
    pub interactive: bool,
    /// Container name; the generated id when absent.
    pub name: Option<String>,
    /// Image providing the root filesystem.
    pub image: String,
    /// Command and arguments.
    pub command: Vec<String>,
    /// Resource limits.
    pub limits: ResourceLimits,
    /// `HOST:CONTAINER` volume.
    pub volume: Option<String>,
    /// Extra `K=V` environment entries.
    pub env: Vec<String>,
    /// Network to attach to.
    pub network: Option<String>,
    /// `HOST:CONTAINER` port mappings.
    pub port_mappings: Vec<String>,
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The record as persisted when the container was started.
    pub record: ContainerRecord,
    /// Exit code of the container, for interactive runs.
    pub exit_code: Option<i32>,
}

/// Coordinates the launcher, the store, cgroups, and the layered filesystem.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    store: ContainerStore,
}

impl Engine {
    /// Creates an engine over the given on-disk layout.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let store = ContainerStore::new(config.info_root.clone());
        Self { config, store }
    }

    /// The layout this engine works on.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The record store.
    #[must_use]
    pub const fn store(&self) -> &ContainerStore {
        &self.store
    }

    fn cgroups(&self, id: &ContainerId) -> CgroupManager {
        CgroupManager::new(
            self.config.cgroup_relative_path(id.as_str()),
            self.config.mountinfo_path.clone(),
        )
    }

    /// Creates and starts a container.
    ///
    /// Launch failures abort before any record is written. Cgroup and
    /// network failures are logged and the container keeps running without
    /// them. Detached runs return as soon as the startup command has been
    /// delivered; interactive runs wait for the container to exit and then
    /// remove every trace of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty, the name is invalid or
    /// taken, or the container cannot be launched or recorded.
    pub fn run(
        &self,
        opts: &RunOptions,
        network: Option<&mut dyn NetworkConnector>,
    ) -> Result<RunOutcome> {
        if opts.command.is_empty() {
            return Err(BurrowError::Config {
                message: "no command given".into(),
            });
        }
        let id = self.unique_id(ContainerId::generate)?;
        let name = opts.name.clone().unwrap_or_else(|| id.to_string());
        validate_name(&name)?;
        if self.store.exists(&name) {
            return Err(BurrowError::Config {
                message: format!("container name {name} is already in use"),
            });
        }
        let volume = opts.volume.as_deref().and_then(|raw| {
            raw.parse::<VolumeSpec>()
                .inspect_err(|e| tracing::warn!(volume = raw, error = %e, "ignoring volume"))
                .ok()
        });

        let spec = LaunchSpec {
            interactive: opts.interactive,
            name: &name,
            image: &opts.image,
            volume: volume.clone(),
            env: &opts.env,
        };
        let unpack = |archive: &Path, target: &Path| {
            burrow_image::layer::extract_layer(archive, target).map(|_| ())
        };
        let (mut parent, mut init_pipe) = process::new_parent_process(&self.config, &spec, &unpack)?;

        let pid = match parent.start() {
            Ok(pid) => pid,
            Err(e) => {
                parent.workspace().teardown();
                self.discard(&name);
                return Err(e);
            }
        };

        let command = opts.command.join(" ");
        let record = ContainerRecord::running(
            id.clone(),
            name.as_str(),
            pid,
            command.as_str(),
            volume.as_ref(),
            opts.port_mappings.clone(),
        );
        if let Err(e) = self.store.save(&record) {
            // Closing the pipe empty makes init exit on its own.
            drop(init_pipe);
            let _ = parent.wait();
            parent.workspace().teardown();
            self.discard(&name);
            return Err(e);
        }

        let cgroups = self.cgroups(&id);
        if let Err(e) = cgroups.set(&opts.limits) {
            tracing::warn!(name = %name, error = %e, "resource limits not fully set");
        }
        if let Err(e) = cgroups.apply(pid) {
            tracing::warn!(name = %name, pid, error = %e, "container not fully placed in cgroups");
        }

        if let (Some(net), Some(connector)) = (opts.network.as_deref(), network) {
            if let Err(e) = connector.connect(net, &id, pid, &opts.port_mappings) {
                tracing::warn!(name = %name, network = net, error = %e, "network attach failed");
            }
        }

        init_pipe
            .write_all(command.as_bytes())
            .map_err(|e| BurrowError::io("init pipe", e))?;
        drop(init_pipe);
        tracing::info!(name = %name, id = %id, pid, command = %command, "container started");

        if !opts.interactive {
            return Ok(RunOutcome {
                record,
                exit_code: None,
            });
        }

        // The terminal's SIGINT goes to the whole foreground group; the
        // engine must outlive the container to clean up after it.
        if let Err(e) = ctrlc::set_handler(|| {}) {
            tracing::warn!(error = %e, "could not install interrupt handler");
        }
        let code = parent.wait()?;
        if let Err(e) = self.store.delete(&name) {
            tracing::warn!(name = %name, error = %e, "failed to delete record");
        }
        cgroups.destroy();
        parent.workspace().teardown();
        Ok(RunOutcome {
            record,
            exit_code: Some(code),
        })
    }

    /// Drops the info directory of a container whose launch failed.
    fn discard(&self, name: &str) {
        if let Err(e) = self.store.delete(name) {
            tracing::warn!(name, error = %e, "failed to remove container directory");
        }
    }

    /// Generates an id no existing record uses.
    fn unique_id(&self, mut generate: impl FnMut() -> ContainerId) -> Result<ContainerId> {
        let taken: HashSet<ContainerId> = self.store.list()?.into_iter().map(|r| r.id).collect();
        loop {
            let id = generate();
            if !taken.contains(&id) {
                return Ok(id);
            }
            tracing::debug!(id = %id, "generated id already taken");
        }
    }

    /// Sends SIGTERM to a running container and marks it stopped.
    ///
    /// Does not wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or not running, or the
    /// record cannot be rewritten.
    pub fn stop(&self, name: &str) -> Result<ContainerRecord> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let mut record = self.store.load(name)?;
        let pid = record.running_pid()?;
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => tracing::info!(name, pid, "SIGTERM sent"),
            Err(nix::errno::Errno::ESRCH) => {
                tracing::warn!(name, pid, "container process already gone");
            }
            Err(e) => {
                return Err(BurrowError::Setup {
                    message: format!("signal pid {pid}: {e}"),
                });
            }
        }
        record.stop()?;
        self.store.save(&record)?;
        Ok(record)
    }

    /// Deletes a stopped container: its record, cgroups, and filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::StateViolation`] unless the container is
    /// stopped, in which case nothing is touched.
    pub fn remove(&self, name: &str) -> Result<()> {
        let record = self.store.load(name)?;
        record.ensure_removable()?;

        self.store.delete(name)?;
        self.cgroups(&record.id).destroy();
        LayeredFilesystem::new(&self.config, name, record.volume_spec()).teardown();
        tracing::info!(name, "container removed");
        Ok(())
    }

    /// Runs `command` inside a running container and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is not running or the command
    /// cannot be started.
    pub fn exec(&self, name: &str, command: &[String]) -> Result<i32> {
        let pid = self.store.load(name)?.running_pid()?;
        crate::exec::exec_in_container(pid, command)
    }

    /// Snapshots the mounted root of `name` as image `image`.
    ///
    /// Returns the archive size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or archiving fails.
    pub fn commit(&self, name: &str, image: &str) -> Result<u64> {
        let _ = self.store.load(name)?;
        let source = self.config.mount_path(name);
        let archive = self.config.image_archive_path(image);
        let size = burrow_image::commit::create_archive(&source, &archive)
            .inspect_err(|e| tracing::error!(name, image, error = %e, "commit failed"))?;
        tracing::info!(name, image, archive = %archive.display(), size, "container committed");
        Ok(size)
    }

    /// Every known container, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the info root cannot be listed.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        self.store.list()
    }

    /// Captured standard output of a detached container.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, or an error naming the log
    /// file if it cannot be read.
    pub fn logs(&self, name: &str) -> Result<String> {
        validate_name(name)?;
        crate::logs::read_logs(&self.config.info_root, name)
    }
}
