//! The container-side half of a launch.
//!
//! Runs as `burrow init` inside the freshly cloned namespaces, with the
//! container mount point as its working directory. It waits for the
//! startup command on the init pipe, switches onto the container root, and
//! replaces itself with the command, which thereby becomes PID 1 of the
//! container.

use std::convert::Infallible;
use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::os::fd::{FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use burrow_common::constants::INIT_PIPE_FD;
use burrow_common::error::{BurrowError, Result};
use burrow_core::filesystem::pivot;

/// Bootstrap progress. Every transition is one way.
#[derive(Debug)]
pub enum Bootstrap {
    /// Blocked on the init pipe until the engine writes and closes it.
    AwaitingCommand {
        /// Read end of the init pipe.
        pipe: File,
    },
    /// Command received; the root filesystem is about to be switched.
    Mounting {
        /// Argument vector of the user command.
        argv: Vec<String>,
    },
    /// Root switched; the process image is about to be replaced.
    Execing {
        /// Resolved path of the command.
        program: PathBuf,
        /// Argument vector of the user command.
        argv: Vec<String>,
    },
}

/// Splits the startup command on single spaces, dropping empty tokens.
///
/// # Errors
///
/// Returns a setup error if no token remains.
pub fn parse_command(text: &str) -> Result<Vec<String>> {
    let argv: Vec<String> = text
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();
    if argv.is_empty() {
        return Err(BurrowError::Setup {
            message: "init received an empty command".into(),
        });
    }
    Ok(argv)
}

impl Bootstrap {
    /// Starts from the init pipe inherited at descriptor 3.
    #[must_use]
    pub fn from_init_pipe() -> Self {
        // SAFETY: the launcher places the read end of the init pipe at this
        // slot and nothing else in the init process opens or closes it.
        let fd = unsafe { OwnedFd::from_raw_fd(INIT_PIPE_FD) };
        Self::AwaitingCommand {
            pipe: File::from(fd),
        }
    }

    /// Performs one transition.
    ///
    /// # Errors
    ///
    /// Returns the error of the failed step; the process must then exit.
    pub fn step(self) -> Result<Self> {
        match self {
            Self::AwaitingCommand { mut pipe } => {
                let mut text = String::new();
                let _ = pipe
                    .read_to_string(&mut text)
                    .map_err(|e| BurrowError::io("init pipe", e))?;
                let argv = parse_command(&text)?;
                tracing::info!(command = ?argv, "init received command");
                Ok(Self::Mounting { argv })
            }
            Self::Mounting { argv } => {
                let root = std::env::current_dir().map_err(|e| BurrowError::io(".", e))?;
                pivot::enter_root(&root)?;
                let name = argv.first().ok_or_else(|| BurrowError::Setup {
                    message: "init received an empty command".into(),
                })?;
                let program = which::which(name).map_err(|e| BurrowError::Setup {
                    message: format!("command {name} not found: {e}"),
                })?;
                Ok(Self::Execing { program, argv })
            }
            Self::Execing { .. } => Ok(self),
        }
    }

    /// Replaces the process image. Only returns on failure.
    ///
    /// # Errors
    ///
    /// Returns an error unless in the [`Bootstrap::Execing`] state, or if
    /// `execve(2)` fails.
    pub fn exec(self) -> Result<Infallible> {
        let Self::Execing { program, argv } = self else {
            return Err(BurrowError::StateViolation {
                message: "exec attempted before the root was switched".into(),
            });
        };
        let to_c = |bytes: &[u8]| {
            CString::new(bytes).map_err(|e| BurrowError::Setup {
                message: format!("invalid exec argument: {e}"),
            })
        };
        let path = to_c(program.as_os_str().as_bytes())?;
        let args = argv
            .iter()
            .map(|arg| to_c(arg.as_bytes()))
            .collect::<Result<Vec<_>>>()?;
        let env = std::env::vars_os()
            .map(|(key, value)| {
                let mut entry = key.as_bytes().to_vec();
                entry.push(b'=');
                entry.extend_from_slice(value.as_bytes());
                to_c(&entry)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(program = %program.display(), "exec user command");
        nix::unistd::execve(&path, &args, &env).map_err(|e| BurrowError::Setup {
            message: format!("execve {} failed: {e}", program.display()),
        })
    }
}

/// Runs the whole bootstrap. Never returns on success.
///
/// # Errors
///
/// Returns the first failure; nothing is retried or rolled back.
pub fn run() -> Result<Infallible> {
    let mut state = Bootstrap::from_init_pipe();
    loop {
        state = match state.step()? {
            execing @ Bootstrap::Execing { .. } => return execing.exec(),
            next => next,
        };
    }
}
