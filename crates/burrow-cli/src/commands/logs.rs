//! `burrow logs`: print a detached container's output.

use clap::Args;

use super::GlobalArgs;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error naming the log file if it cannot be read.
pub fn execute(args: &LogsArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let logs = global.engine().logs(&args.container)?;
    print!("{logs}");
    Ok(())
}
