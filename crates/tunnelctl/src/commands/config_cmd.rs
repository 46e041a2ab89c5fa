//! Config subcommand handlers.

use tunnelctl_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::resolve_path(global);

    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            // Validate before showing so a broken file is reported as such.
            cfg.to_controller_config()?;
            let rendered = match config::output_format(global, &cfg)? {
                OutputFormat::Plain => toml::to_string_pretty(&cfg).map_err(|e| {
                    CliError::Validation {
                        field: "config".into(),
                        reason: format!("failed to serialize config: {e}"),
                    }
                })?,
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
            };
            println!("{}", rendered.trim_end());
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            tunnelctl_config::save_config_to(&Config::default(), &path)?;
            eprintln!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}
