//! `burrow ps`: list containers.

use clap::Args;

use super::GlobalArgs;
use crate::output;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the records cannot be listed.
pub fn execute(_args: &PsArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let records = global.engine().list()?;
    print!("{}", output::container_table(&records));
    Ok(())
}
