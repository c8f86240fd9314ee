//! `burrow run`: create and start a container.

use std::process::ExitCode;

use burrow_common::types::ResourceLimits;
use burrow_network::{NetworkConnector, NetworkRegistry};
use burrow_runtime::engine::RunOptions;
use clap::Args;

use super::GlobalArgs;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Attach the container to this terminal and wait for it to exit.
    #[arg(long = "ti", short = 't', conflicts_with = "detach")]
    pub tty: bool,

    /// Run in the background, capturing stdout in the container log.
    #[arg(short, long)]
    pub detach: bool,

    /// Memory limit, e.g. `100m`.
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Relative CPU weight.
    #[arg(long)]
    pub cpushare: Option<String>,

    /// CPUs the container may use, e.g. `0-1`.
    #[arg(long)]
    pub cpuset: Option<String>,

    /// Container name; defaults to the generated id.
    #[arg(long)]
    pub name: Option<String>,

    /// Bind a host directory, as `HOST:CONTAINER`.
    #[arg(short, long)]
    pub volume: Option<String>,

    /// Extra environment entry, as `KEY=VALUE`.
    #[arg(short, long = "env")]
    pub env: Vec<String>,

    /// Network to attach the container to.
    #[arg(long)]
    pub net: Option<String>,

    /// Forward a host port, as `HOST:CONTAINER`.
    #[arg(short, long = "port")]
    pub port: Vec<String>,

    /// Image to run.
    pub image: String,

    /// Command and its arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    fn options(self) -> RunOptions {
        RunOptions {
            interactive: self.tty,
            name: self.name,
            image: self.image,
            command: self.command,
            limits: ResourceLimits {
                memory: self.memory,
                cpu_share: self.cpushare,
                cpuset: self.cpuset,
            },
            volume: self.volume,
            env: self.env,
            network: self.net,
            port_mappings: self.port,
        }
    }
}

/// Executes the `run` command.
///
/// Detached runs print the container id; interactive runs exit with the
/// container's exit code.
///
/// # Errors
///
/// Returns an error if the container cannot be launched.
pub fn execute(args: RunArgs, global: &GlobalArgs) -> anyhow::Result<ExitCode> {
    let engine = global.engine();
    let mut registry = match &args.net {
        Some(_) => Some(NetworkRegistry::init(&engine.config().network_root)?),
        None => None,
    };
    let connector = registry
        .as_mut()
        .map(|registry| registry as &mut dyn NetworkConnector);

    let outcome = engine.run(&args.options(), connector)?;
    match outcome.exit_code {
        Some(code) => Ok(super::exit_code(code)),
        None => {
            println!("{}", outcome.record.id);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::super::{Cli, Command};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("burrow").chain(args.iter().copied()))
    }

    #[test]
    fn full_run_line_parses() {
        let cli = parse(&[
            "run", "-d", "-m", "100m", "--cpushare", "512", "--cpuset", "0-1", "--name", "c1",
            "-v", "/data:/mnt", "-e", "A=1", "-e", "B=2", "--net", "br0", "-p", "8080:80",
            "busybox", "/bin/sh", "-c", "top",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            unreachable!("parsed as run");
        };
        let opts = args.options();
        assert!(!opts.interactive);
        assert_eq!(opts.name.as_deref(), Some("c1"));
        assert_eq!(opts.image, "busybox");
        assert_eq!(opts.command, ["/bin/sh", "-c", "top"]);
        assert_eq!(opts.limits.memory.as_deref(), Some("100m"));
        assert_eq!(opts.limits.cpu_share.as_deref(), Some("512"));
        assert_eq!(opts.limits.cpuset.as_deref(), Some("0-1"));
        assert_eq!(opts.env, ["A=1", "B=2"]);
        assert_eq!(opts.port_mappings, ["8080:80"]);
        assert_eq!(opts.network.as_deref(), Some("br0"));
    }

    #[test]
    fn tty_and_detach_are_exclusive() {
        assert!(parse(&["run", "--ti", "-d", "busybox", "sh"]).is_err());
        assert!(parse(&["run", "--ti", "busybox", "sh"]).is_ok());
    }

    #[test]
    fn command_is_required() {
        assert!(parse(&["run", "busybox"]).is_err());
    }
}
