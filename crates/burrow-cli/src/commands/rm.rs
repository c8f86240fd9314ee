//! `burrow rm`: delete a stopped container.

use clap::Args;

use super::GlobalArgs;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or still running.
pub fn execute(args: &RmArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    global.engine().remove(&args.container)?;
    Ok(())
}
