//! `burrow exec`: run a command inside a running container.

use std::process::ExitCode;

use clap::Args;

use super::GlobalArgs;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name.
    pub container: String,

    /// Command to execute.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command, exiting with the command's exit code.
///
/// # Errors
///
/// Returns an error if the container is not running or the command
/// cannot be started.
pub fn execute(args: &ExecArgs, global: &GlobalArgs) -> anyhow::Result<ExitCode> {
    let code = global.engine().exec(&args.container, &args.command)?;
    Ok(super::exit_code(code))
}
