//! `burrow stop`: signal a running container.

use clap::Args;

use super::GlobalArgs;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or not running.
pub fn execute(args: &StopArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let _ = global.engine().stop(&args.container)?;
    Ok(())
}
