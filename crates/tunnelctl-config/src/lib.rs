//! Shared configuration for tunnelctl.
//!
//! One TOML file plus `TUNNELCTL_`-prefixed environment overrides, and
//! translation to `tunnelctl_core::ControllerConfig`. The CLI adds flag
//! handling on top; core never sees these types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tunnelctl_core::ControllerConfig;
use tunnelctl_core::config::{
    DEFAULT_MAX_MISSED_DELIVERIES, DEFAULT_RESTART_TIMEOUT, DEFAULT_SUBSCRIBER_BUFFER,
};

/// Prefix for environment overrides. Nested keys use `__`, e.g.
/// `TUNNELCTL_PLATFORM__STEP_DELAY_MS=10`.
pub const ENV_PREFIX: &str = "TUNNELCTL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Controller timing and notification back-pressure.
    #[serde(default)]
    pub controller: ControllerSection,

    /// Behaviour of the simulated platform the CLI drives.
    #[serde(default)]
    pub platform: PlatformSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// "plain" or "json".
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "plain".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ControllerSection {
    #[serde(default = "default_restart_timeout_secs")]
    pub restart_timeout_secs: u64,

    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    #[serde(default = "default_max_missed")]
    pub max_missed_deliveries: u32,

    /// Name for a configuration installed on first start.
    #[serde(default = "default_configuration_name")]
    pub configuration_name: String,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            restart_timeout_secs: default_restart_timeout_secs(),
            subscriber_buffer: default_subscriber_buffer(),
            max_missed_deliveries: default_max_missed(),
            configuration_name: default_configuration_name(),
        }
    }
}

fn default_restart_timeout_secs() -> u64 {
    DEFAULT_RESTART_TIMEOUT.as_secs()
}
fn default_subscriber_buffer() -> usize {
    DEFAULT_SUBSCRIBER_BUFFER
}
fn default_max_missed() -> u32 {
    DEFAULT_MAX_MISSED_DELIVERIES
}
fn default_configuration_name() -> String {
    ControllerConfig::default().configuration_name
}

/// Knobs for the in-process platform simulation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct PlatformSection {
    /// Configurations already present in the simulated store.
    #[serde(default)]
    pub existing_configurations: usize,

    /// Whether those configurations are already installed.
    #[serde(default)]
    pub installed: bool,

    #[serde(default)]
    pub on_demand: bool,

    /// When false the extension starts without a tunnel.
    #[serde(default = "default_true")]
    pub entitled: bool,

    /// Simulate the user refusing the install prompt.
    #[serde(default)]
    pub deny_install: bool,

    /// Delay between simulated status transitions.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            existing_configurations: 0,
            installed: false,
            on_demand: false,
            entitled: true,
            deny_install: false,
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_step_delay_ms() -> u64 {
    250
}

impl PlatformSection {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "tunnelctl", "tunnelctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tunnelctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from `path` (missing file is fine) plus environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate the `[controller]` section and build the core config.
    pub fn to_controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        let section = &self.controller;

        if section.restart_timeout_secs == 0 {
            return Err(validation("controller.restart_timeout_secs", "must be at least 1"));
        }
        if section.subscriber_buffer == 0 {
            return Err(validation("controller.subscriber_buffer", "must be at least 1"));
        }
        if section.max_missed_deliveries == 0 {
            return Err(validation(
                "controller.max_missed_deliveries",
                "must be at least 1",
            ));
        }
        if section.configuration_name.trim().is_empty() {
            return Err(validation("controller.configuration_name", "must not be empty"));
        }
        if !matches!(self.defaults.output.as_str(), "plain" | "json") {
            return Err(validation(
                "defaults.output",
                &format!("expected 'plain' or 'json', got '{}'", self.defaults.output),
            ));
        }

        Ok(ControllerConfig {
            restart_timeout: Duration::from_secs(section.restart_timeout_secs),
            subscriber_buffer: section.subscriber_buffer,
            max_missed_deliveries: section.max_missed_deliveries,
            configuration_name: section.configuration_name.clone(),
        })
    }
}

fn validation(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}
