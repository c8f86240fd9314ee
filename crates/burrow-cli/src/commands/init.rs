//! Hidden entry points the engine runs itself through.

use std::process::ExitCode;

/// `burrow init`: becomes the container's first process. Only returns on
/// failure.
///
/// # Errors
///
/// Returns the bootstrap failure; the process then exits with status 1.
pub fn init() -> anyhow::Result<ExitCode> {
    match burrow_runtime::bootstrap::run() {
        Ok(never) => match never {},
        Err(e) => {
            tracing::error!(error = %e, "container init failed");
            Err(e.into())
        }
    }
}

/// `burrow enter`: joins a container's namespaces for `exec`.
///
/// # Errors
///
/// Returns an error if the namespaces cannot be joined or the command
/// cannot be started.
pub fn enter() -> anyhow::Result<ExitCode> {
    let code = burrow_runtime::exec::enter()?;
    Ok(super::exit_code(code))
}
