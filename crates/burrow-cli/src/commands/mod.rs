//! CLI command definitions and dispatch.

pub mod commit;
pub mod exec;
pub mod init;
pub mod logs;
pub mod network;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use std::path::PathBuf;
use std::process::ExitCode;

use burrow_common::config::EngineConfig;
use burrow_common::constants::APP_NAME;
use burrow_runtime::engine::Engine;
use clap::{Args, Parser, Subcommand};

/// burrow: a minimal container engine.
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding container records and network state.
    #[arg(long, global = true, env = "BURROW_ROOT")]
    pub root: Option<PathBuf>,

    /// Directory holding images, mount points, and writable layers.
    #[arg(long, global = true, env = "BURROW_IMAGE_ROOT")]
    pub image_root: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl GlobalArgs {
    /// Builds the engine layout, relocated by `--root` and `--image-root`.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(root) = &self.root {
            config = config.with_state_root(root);
        }
        if let Some(root) = &self.image_root {
            config = config.with_image_root(root);
        }
        config
    }

    /// Engine over [`Self::config`].
    #[must_use]
    pub fn engine(&self) -> Engine {
        Engine::new(self.config())
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a container.
    Run(run::RunArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a stopped container.
    Rm(rm::RmArgs),
    /// List containers.
    Ps(ps::PsArgs),
    /// Print the output of a detached container.
    Logs(logs::LogsArgs),
    /// Run a command inside a running container.
    Exec(exec::ExecArgs),
    /// Save a container's filesystem as an image.
    Commit(commit::CommitArgs),
    /// Manage container networks.
    #[command(subcommand)]
    Network(network::NetworkCommand),
    /// Container init process; started by `run`, not by users.
    #[command(hide = true)]
    Init,
    /// Namespace-joining helper; started by `exec`, not by users.
    #[command(hide = true)]
    Enter,
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let global = cli.global;
    match cli.command {
        Command::Run(args) => run::execute(args, &global),
        Command::Stop(args) => stop::execute(&args, &global).map(|()| ExitCode::SUCCESS),
        Command::Rm(args) => rm::execute(&args, &global).map(|()| ExitCode::SUCCESS),
        Command::Ps(args) => ps::execute(&args, &global).map(|()| ExitCode::SUCCESS),
        Command::Logs(args) => logs::execute(&args, &global).map(|()| ExitCode::SUCCESS),
        Command::Exec(args) => exec::execute(&args, &global),
        Command::Commit(args) => commit::execute(&args, &global).map(|()| ExitCode::SUCCESS),
        Command::Network(cmd) => network::execute(cmd, &global).map(|()| ExitCode::SUCCESS),
        Command::Init => init::init(),
        Command::Enter => init::enter(),
    }
}

/// Maps a container exit status onto the engine's own exit code.
#[must_use]
pub fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn roots_relocate_the_layout() {
        let cli = Cli::try_parse_from([
            "burrow",
            "--root",
            "/tmp/state",
            "--image-root",
            "/tmp/img",
            "ps",
        ])
        .unwrap();
        let config = cli.global.config();
        assert_eq!(config.container_dir("c1"), PathBuf::from("/tmp/state/c1"));
        assert_eq!(config.mount_path("c1"), PathBuf::from("/tmp/img/mnt/c1"));
        assert_eq!(config.network_root, PathBuf::from("/tmp/state/network"));
    }

    #[test]
    fn exit_codes_saturate_to_failure() {
        assert_eq!(exit_code(0), ExitCode::SUCCESS);
        assert_eq!(exit_code(300), ExitCode::FAILURE);
        assert_eq!(exit_code(-1), ExitCode::FAILURE);
    }
}
