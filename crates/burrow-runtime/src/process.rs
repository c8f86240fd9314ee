//! Launching the container init process.
//!
//! The engine re-executes its own binary with the `init` argument inside
//! fresh UTS, PID, mount, network, and IPC namespaces. The user command is
//! not passed on the command line: the child finds the read end of a pipe
//! at descriptor 3 and blocks on it until the engine has finished preparing
//! the container and writes the command.

use std::ffi::{CString, OsString};
use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use burrow_common::config::EngineConfig;
use burrow_common::constants::{INIT_ARG, INIT_PIPE_FD};
use burrow_common::error::{BurrowError, Result};
use burrow_common::types::VolumeSpec;
use burrow_core::filesystem::workspace::{ImageUnpacker, LayeredFilesystem};
use burrow_core::namespace::NamespaceConfig;

/// Stack handed to `clone(2)`; the child execs almost immediately.
const STACK_SIZE: usize = 1024 * 1024;

/// What to launch.
#[derive(Debug, Clone)]
pub struct LaunchSpec<'a> {
    /// Attach the child to the engine's terminal instead of a log file.
    pub interactive: bool,
    /// Container name; selects the mount point, write layer, and log file.
    pub name: &'a str,
    /// Image providing the read-only layer.
    pub image: &'a str,
    /// Optional host directory to bind into the container.
    pub volume: Option<VolumeSpec>,
    /// Extra `K=V` environment entries.
    pub env: &'a [String],
}

#[derive(Debug)]
enum ChildStdio {
    Inherit,
    Detached { log: File, null: File },
}

/// A prepared but not yet started container init process.
#[derive(Debug)]
pub struct ParentProcess {
    program: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
    cwd: CString,
    init_pipe: Option<OwnedFd>,
    stdio: ChildStdio,
    namespaces: NamespaceConfig,
    workspace: LayeredFilesystem,
    child: Option<nix::unistd::Pid>,
}

fn setup_error(step: &str, err: impl std::fmt::Display) -> BurrowError {
    BurrowError::Setup {
        message: format!("{step}: {err}"),
    }
}

fn c_string(value: impl Into<Vec<u8>>, what: &str) -> Result<CString> {
    CString::new(value).map_err(|e| setup_error(what, e))
}

fn c_path(path: &Path, what: &str) -> Result<CString> {
    c_string(path.as_os_str().as_bytes(), what)
}

/// Builds the child environment: the inherited variables followed by the
/// `extra` `K=V` entries. An extra entry replaces an inherited variable of
/// the same name.
///
/// # Errors
///
/// Returns a setup error if an entry contains a NUL byte.
pub fn build_env(
    inherited: impl IntoIterator<Item = (OsString, OsString)>,
    extra: &[String],
) -> Result<Vec<CString>> {
    let overridden: Vec<&str> = extra
        .iter()
        .map(|entry| entry.split_once('=').map_or(entry.as_str(), |(key, _)| key))
        .collect();
    let mut env = Vec::new();
    for (key, value) in inherited {
        if overridden.iter().any(|k| k.as_bytes() == key.as_bytes()) {
            continue;
        }
        let mut entry = key.as_bytes().to_vec();
        entry.push(b'=');
        entry.extend_from_slice(value.as_bytes());
        env.push(c_string(entry, "environment entry")?);
    }
    for entry in extra {
        env.push(c_string(entry.as_bytes(), "environment entry")?);
    }
    Ok(env)
}

/// Prepares the container init process and its root filesystem.
///
/// Order matters: the pipe, the self path, stdio, and the environment are
/// set up first, then the layered filesystem is built, and only then is
/// its mount point recorded as the child's working directory. If building
/// the filesystem fails, whatever part of it exists is torn down again, and
/// so is the log directory of a detached container.
///
/// Returns the unstarted process and the write end of the init pipe.
///
/// # Errors
///
/// Returns [`BurrowError::Setup`] if any preparation step fails.
#[cfg(target_os = "linux")]
pub fn new_parent_process(
    config: &EngineConfig,
    spec: &LaunchSpec<'_>,
    unpack: ImageUnpacker<'_>,
) -> Result<(ParentProcess, File)> {
    use nix::fcntl::OFlag;

    let (read_end, write_end) =
        nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| setup_error("create init pipe", e))?;

    // Resolved once; replacing the binary before the child execs is not handled.
    let self_exe: PathBuf =
        std::fs::read_link("/proc/self/exe").map_err(|e| setup_error("resolve /proc/self/exe", e))?;
    let program = c_path(&self_exe, "self path")?;
    let argv = vec![program.clone(), c_string(INIT_ARG, "init argument")?];

    let stdio = if spec.interactive {
        ChildStdio::Inherit
    } else {
        let log = crate::logs::create_log(&config.info_root, spec.name)
            .map_err(|e| setup_error("create container log", e))?;
        let null = File::options()
            .read(true)
            .write(true)
            .open("/dev/null")
            .map_err(|e| setup_error("open /dev/null", e))?;
        ChildStdio::Detached { log, null }
    };

    let envp = build_env(std::env::vars_os(), spec.env)?;

    let workspace = LayeredFilesystem::new(config, spec.name, spec.volume.clone());
    if let Err(e) = workspace.build(spec.image, unpack) {
        workspace.teardown();
        if !spec.interactive {
            crate::logs::discard_log(&config.info_root, spec.name);
        }
        return Err(setup_error("build container filesystem", e));
    }
    let cwd = c_path(workspace.mount_path(), "mount path")?;

    tracing::debug!(
        name = spec.name,
        interactive = spec.interactive,
        program = %self_exe.display(),
        cwd = %workspace.mount_path().display(),
        "parent process prepared"
    );
    Ok((
        ParentProcess {
            program,
            argv,
            envp,
            cwd,
            init_pipe: Some(read_end),
            stdio,
            namespaces: NamespaceConfig::default(),
            workspace,
            child: None,
        },
        File::from(write_end),
    ))
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: containers require Linux.
#[cfg(not(target_os = "linux"))]
pub fn new_parent_process(
    _config: &EngineConfig,
    _spec: &LaunchSpec<'_>,
    _unpack: ImageUnpacker<'_>,
) -> Result<(ParentProcess, File)> {
    Err(BurrowError::Config {
        message: "Linux required for native container operations".into(),
    })
}

impl ParentProcess {
    /// The container filesystem this process will run on.
    #[must_use]
    pub const fn workspace(&self) -> &LayeredFilesystem {
        &self.workspace
    }

    /// Clones the child into its new namespaces and returns its host pid.
    ///
    /// The child execs the engine binary right away; it then blocks on the
    /// init pipe, so nothing user-visible runs until the command is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the process was already started or `clone(2)` fails.
    #[cfg(target_os = "linux")]
    pub fn start(&mut self) -> Result<u32> {
        use nix::sys::signal::Signal;

        if self.child.is_some() {
            return Err(BurrowError::StateViolation {
                message: "container process already started".into(),
            });
        }
        let pipe = self
            .init_pipe
            .take()
            .ok_or_else(|| setup_error("start", "init pipe already consumed"))?;

        let image = ChildImage {
            program: self.program.as_ptr(),
            argv: null_terminated(&self.argv),
            envp: null_terminated(&self.envp),
            cwd: self.cwd.as_ptr(),
            pipe: pipe.as_raw_fd(),
            stdio: match &self.stdio {
                ChildStdio::Inherit => None,
                ChildStdio::Detached { log, null } => Some((log.as_raw_fd(), null.as_raw_fd())),
            },
        };

        let mut stack = vec![0u8; STACK_SIZE];
        // SAFETY: without CLONE_VM the child runs on a private copy of the
        // address space, and `exec_child` only issues async-signal-safe
        // syscalls on data prepared before the clone.
        let pid = unsafe {
            nix::sched::clone(
                Box::new(|| image.exec_child()),
                &mut stack,
                self.namespaces.clone_flags(),
                Some(Signal::SIGCHLD as i32),
            )
        }
        .map_err(|e| setup_error("clone container process", e))?;

        // The parent keeps only the write end.
        drop(pipe);
        self.stdio = ChildStdio::Inherit;
        self.child = Some(pid);
        tracing::info!(pid = pid.as_raw(), "container process started");
        u32::try_from(pid.as_raw()).map_err(|e| setup_error("child pid", e))
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error: containers require Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn start(&mut self) -> Result<u32> {
        Err(BurrowError::Config {
            message: "Linux required for native container operations".into(),
        })
    }

    /// Blocks until the child exits and returns its exit code.
    ///
    /// A child killed by a signal reports `128 + signal`, as shells do.
    ///
    /// # Errors
    ///
    /// Returns an error if the process was never started or `waitpid(2)` fails.
    pub fn wait(&self) -> Result<i32> {
        use nix::errno::Errno;
        use nix::sys::wait::{WaitStatus, waitpid};

        let pid = self.child.ok_or_else(|| BurrowError::StateViolation {
            message: "container process was never started".into(),
        })?;
        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    tracing::info!(pid = pid.as_raw(), code, "container process exited");
                    return Ok(code);
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    tracing::info!(pid = pid.as_raw(), ?signal, "container process killed");
                    return Ok(128 + signal as i32);
                }
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => return Err(setup_error("wait for container process", e)),
            }
        }
    }
}

fn null_terminated(values: &[CString]) -> Vec<*const libc::c_char> {
    values
        .iter()
        .map(|value| value.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

/// Everything the cloned child needs, as raw pointers and descriptors.
struct ChildImage {
    program: *const libc::c_char,
    argv: Vec<*const libc::c_char>,
    envp: Vec<*const libc::c_char>,
    cwd: *const libc::c_char,
    pipe: RawFd,
    stdio: Option<(RawFd, RawFd)>,
}

impl ChildImage {
    /// Runs in the cloned child. Returns only on failure, with the exit code.
    fn exec_child(&self) -> isize {
        // SAFETY: every pointer refers to a NUL-terminated string or
        // NULL-terminated array owned by the parent's `ParentProcess`,
        // copied into this address space by the clone.
        unsafe {
            if let Some((log, null)) = self.stdio {
                if libc::dup2(null, libc::STDIN_FILENO) < 0
                    || libc::dup2(log, libc::STDOUT_FILENO) < 0
                    || libc::dup2(null, libc::STDERR_FILENO) < 0
                {
                    return 125;
                }
            }
            // dup2 clears close-on-exec on the copy; a pipe already sitting
            // at the slot needs the flag cleared by hand.
            let placed = if self.pipe == INIT_PIPE_FD {
                libc::fcntl(self.pipe, libc::F_SETFD, 0)
            } else {
                libc::dup2(self.pipe, INIT_PIPE_FD)
            };
            if placed < 0 || libc::chdir(self.cwd) < 0 {
                return 126;
            }
            let _ = libc::execve(self.program, self.argv.as_ptr(), self.envp.as_ptr());
        }
        127
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_env_entries_override_inherited_ones() {
        let inherited = vec![
            (OsString::from("PATH"), OsString::from("/bin")),
            (OsString::from("HOME"), OsString::from("/root")),
        ];
        let env = build_env(inherited, &["FOO=bar".into(), "PATH=/sbin".into()]).unwrap();
        let env: Vec<_> = env.iter().map(|e| e.to_str().unwrap()).collect();
        assert_eq!(env, ["HOME=/root", "FOO=bar", "PATH=/sbin"]);
    }

    #[test]
    fn env_with_nul_is_a_setup_error() {
        let err = build_env(Vec::new(), &["BAD=a\0b".into()]).unwrap_err();
        assert!(matches!(err, BurrowError::Setup { .. }));
    }

    #[test]
    fn pointer_arrays_are_null_terminated() {
        let values = [CString::new("a").unwrap(), CString::new("b").unwrap()];
        let ptrs = null_terminated(&values);
        assert_eq!(ptrs.len(), 3);
        assert!(ptrs[2].is_null());
    }
}
