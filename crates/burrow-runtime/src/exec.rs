//! Running commands inside a running container.
//!
//! `burrow exec` re-invokes the engine binary as the hidden `enter`
//! subcommand, handing over the target pid and the command through
//! environment variables. The helper joins the container's namespaces
//! before doing anything else, then forks the command, which lands in the
//! container's PID namespace.

use std::path::Path;
use std::process::Command;

use burrow_common::constants::{ENTER_ARG, ENV_EXEC_CMD, ENV_EXEC_PID};
use burrow_common::error::{BurrowError, Result};
use burrow_core::namespace::join;

/// Parses a `/proc/<pid>/environ` blob into `(key, value)` pairs.
#[must_use]
pub fn parse_environ(raw: &[u8]) -> Vec<(String, String)> {
    raw.split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            entry
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}

/// Reads the environment of process `pid`.
///
/// # Errors
///
/// Returns an error if the environ file cannot be read.
pub fn read_environ(proc_root: &Path, pid: i32) -> Result<Vec<(String, String)>> {
    let path = proc_root.join(pid.to_string()).join("environ");
    let raw = std::fs::read(&path).map_err(|e| BurrowError::io(path, e))?;
    Ok(parse_environ(&raw))
}

/// Runs `command` inside the namespaces of `pid` with that process's
/// environment, inheriting stdio. Returns the command's exit code.
///
/// # Errors
///
/// Returns an error if the command is empty, the environment cannot be
/// read, or the helper cannot be spawned.
pub fn exec_in_container(pid: i32, command: &[String]) -> Result<i32> {
    if command.is_empty() {
        return Err(BurrowError::Config {
            message: "exec command is empty".into(),
        });
    }
    let env = read_environ(Path::new("/proc"), pid)?;
    let joined = command.join(" ");
    tracing::info!(pid, command = %joined, "exec into container");

    let status = Command::new("/proc/self/exe")
        .arg(ENTER_ARG)
        .envs(env)
        .env(ENV_EXEC_PID, pid.to_string())
        .env(ENV_EXEC_CMD, &joined)
        .status()
        .map_err(|e| BurrowError::io("/proc/self/exe", e))?;
    Ok(exit_code(status))
}

/// The `enter` helper: joins the namespaces named by the environment and
/// runs the command there. Returns the command's exit code.
///
/// # Errors
///
/// Returns an error if the variables are missing, a namespace cannot be
/// joined, or the command cannot be spawned.
pub fn enter() -> Result<i32> {
    let var = |name: &str| {
        std::env::var(name).map_err(|_| BurrowError::Config {
            message: format!("{name} is not set; `enter` is only run by `exec`"),
        })
    };
    let pid: i32 = var(ENV_EXEC_PID)?.parse().map_err(|_| BurrowError::Config {
        message: format!("{ENV_EXEC_PID} is not a pid"),
    })?;
    let command = var(ENV_EXEC_CMD)?;

    join::join_namespaces(pid)?;

    let argv = crate::bootstrap::parse_command(&command)?;
    let (program, args) = argv.split_first().ok_or_else(|| BurrowError::Config {
        message: "exec command is empty".into(),
    })?;
    let status = Command::new(program)
        .args(args)
        .env_remove(ENV_EXEC_PID)
        .env_remove(ENV_EXEC_CMD)
        .status()
        .map_err(|e| BurrowError::io(program, e))?;
    Ok(exit_code(status))
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environ_is_split_on_nul() {
        let env = parse_environ(b"PATH=/bin:/usr/bin\0HOME=/root\0\0EMPTY=\0junk\0");
        assert_eq!(
            env,
            [
                ("PATH".to_string(), "/bin:/usr/bin".to_string()),
                ("HOME".to_string(), "/root".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn own_environ_is_readable() {
        let pid = i32::try_from(std::process::id()).unwrap();
        let _ = read_environ(Path::new("/proc"), pid).unwrap();
        assert!(read_environ(Path::new("/proc"), -1).is_err());
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(exec_in_container(1, &[]), Err(BurrowError::Config { .. })));
    }
}
