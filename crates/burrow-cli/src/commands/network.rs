//! `burrow network`: manage container networks.

use burrow_network::NetworkRegistry;
use clap::{Args, Subcommand};

use super::GlobalArgs;
use crate::output;

/// Network subcommands.
#[derive(Subcommand, Debug)]
pub enum NetworkCommand {
    /// Create a network.
    Create(CreateArgs),
    /// List networks.
    List,
    /// Remove a network.
    Remove(RemoveArgs),
}

/// Arguments for `network create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Network driver.
    #[arg(long, default_value = "bridge")]
    pub driver: String,

    /// Address range, e.g. `192.168.10.0/24`.
    #[arg(long)]
    pub subnet: String,

    /// Network name.
    pub name: String,
}

/// Arguments for `network remove`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Network name.
    pub name: String,
}

/// Executes a `network` subcommand.
///
/// # Errors
///
/// Returns an error if the registry cannot be loaded or the operation fails.
pub fn execute(command: NetworkCommand, global: &GlobalArgs) -> anyhow::Result<()> {
    let mut registry = NetworkRegistry::init(&global.config().network_root)?;
    match command {
        NetworkCommand::Create(args) => {
            let network = registry.create(&args.driver, &args.subnet, &args.name)?;
            println!("{}", network.name);
        }
        NetworkCommand::List => {
            let networks: Vec<_> = registry.list().collect();
            print!("{}", output::network_table(&networks));
        }
        NetworkCommand::Remove(args) => registry.remove(&args.name)?,
    }
    Ok(())
}
