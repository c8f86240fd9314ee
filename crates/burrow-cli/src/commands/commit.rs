//! `burrow commit`: save a container's filesystem as an image.

use anyhow::Context;
use clap::Args;

use super::GlobalArgs;
use crate::output::format_bytes;

/// Arguments for the `commit` command.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Container name.
    pub container: String,

    /// Name of the image to create.
    pub image: String,
}

/// Executes the `commit` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or the archive cannot be written.
pub fn execute(args: &CommitArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let size = global
        .engine()
        .commit(&args.container, &args.image)
        .with_context(|| format!("commit {} as {}", args.container, args.image))?;
    println!("{} ({})", args.image, format_bytes(size));
    Ok(())
}
