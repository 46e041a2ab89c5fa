mod cli;
mod commands;
mod config;
mod error;
mod output;
mod platform;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tunnelctl_core::Controller;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::Printer;
use crate::platform::SimulatedPlatform;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a controller
        Command::Config(ref args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(ref args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "tunnelctl", &mut std::io::stdout());
            Ok(())
        }

        // Everything else drives a controller against the simulated platform
        cmd => {
            let cfg = config::load(&cli.global)?;
            let controller_config = cfg.to_controller_config()?;
            let printer = Printer::new(config::output_format(&cli.global, &cfg)?);

            let (platform, feed) = SimulatedPlatform::new(cfg.platform);
            let controller = Controller::new(controller_config, platform);
            controller.attach_status_feed(feed);

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &controller, printer).await;
            controller.shutdown().await;
            result
        }
    }
}
