//! CLI-side config resolution: `--config` overrides the canonical path,
//! `--output` overrides `defaults.output`.

use std::path::PathBuf;

use tunnelctl_config::Config;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// The config file this invocation reads and writes.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(tunnelctl_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(tunnelctl_config::load_config_from(&resolve_path(global))?)
}

/// Flag first, then the config file's default.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> Result<OutputFormat, CliError> {
    if let Some(format) = global.output {
        return Ok(format);
    }
    match cfg.defaults.output.as_str() {
        "plain" => Ok(OutputFormat::Plain),
        "json" => Ok(OutputFormat::Json),
        other => Err(CliError::Validation {
            field: "defaults.output".into(),
            reason: format!("expected 'plain' or 'json', got '{other}'"),
        }),
    }
}
