//! Clap derive structures for the `tunnelctl` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tunnelctl -- drive a VPN tunnel lifecycle from the command line
#[derive(Debug, Parser)]
#[command(
    name = "tunnelctl",
    version,
    about = "Drive a VPN tunnel lifecycle against a simulated platform",
    long_about = "Starts, stops and restarts a VPN network extension and prints the\n\
        composite connection status as it changes.\n\n\
        The platform is simulated in-process; tune it in the [platform]\n\
        section of the config file or with TUNNELCTL_PLATFORM__* variables.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TUNNELCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (overrides defaults.output)
    #[arg(long, short = 'o', env = "TUNNELCTL_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Plain,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive session: read commands from stdin, print status changes
    #[command(alias = "s")]
    Session,

    /// Start the tunnel and VPN, hold, then stop
    Up(UpArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct UpArgs {
    /// Seconds to stay up before stopping (default: until Ctrl-C)
    #[arg(long)]
    pub hold: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the resolved configuration
    Show,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
