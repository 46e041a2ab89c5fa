//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use tunnelctl_config::ConfigError;
use tunnelctl_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const PLATFORM: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Tunnel lifecycle ─────────────────────────────────────────────

    #[error("Found {count} VPN configurations")]
    #[diagnostic(
        code(tunnelctl::too_many_configs),
        help(
            "Only one configuration can be managed at a time.\n\
             Set platform.existing_configurations to 0 or 1."
        )
    )]
    TooManyConfigs { count: usize },

    #[error("VPN configuration install was declined")]
    #[diagnostic(
        code(tunnelctl::install_denied),
        help("Allow the configuration when prompted (platform.deny_install = false).")
    )]
    InstallDenied,

    #[error("No VPN configuration to operate on")]
    #[diagnostic(
        code(tunnelctl::no_configuration),
        help("Start the tunnel once to install a configuration.")
    )]
    NoConfiguration,

    #[error("The tunnel has not been started")]
    #[diagnostic(code(tunnelctl::not_started), help("Run `start` before `vpn`."))]
    NotStarted,

    #[error("The start was superseded by a stop")]
    #[diagnostic(
        code(tunnelctl::superseded),
        help("A stop arrived while the extension was starting. Start again if intended.")
    )]
    Superseded,

    #[error("{operation} failed: {reason}")]
    #[diagnostic(code(tunnelctl::platform))]
    Platform { operation: String, reason: String },

    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(tunnelctl::timeout),
        help("Raise controller.restart_timeout_secs or lower platform.step_delay_ms.")
    )]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tunnelctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(tunnelctl::config_exists),
        help("Use --force to overwrite: {path}")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(tunnelctl::config),
        help("Check the config file, or run: tunnelctl config show")
    )]
    Config(ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(tunnelctl::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::NotStarted => exit_code::USAGE,
            Self::Config(_) | Self::ConfigExists { .. } => exit_code::CONFIG,
            Self::NoConfiguration => exit_code::NOT_FOUND,
            Self::InstallDenied => exit_code::PERMISSION,
            Self::TooManyConfigs { .. } | Self::Superseded => exit_code::CONFLICT,
            Self::Platform { .. } => exit_code::PLATFORM,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TooManyConfigs { count } => Self::TooManyConfigs { count },
            CoreError::UserDeniedInstall => Self::InstallDenied,
            CoreError::NoTargetManager => Self::NoConfiguration,
            CoreError::TunnelNotStarted => Self::NotStarted,
            CoreError::StartSuperseded => Self::Superseded,
            CoreError::RestartTimedOut { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::ConfigLoadFailed { reason } => platform("loading configurations", reason),
            CoreError::ConfigSaveFailed { reason } => platform("saving the configuration", reason),
            CoreError::ExternalStartFailed { reason } => {
                platform("starting the network extension", reason)
            }
            CoreError::StopFailed { reason } => platform("stopping the network extension", reason),
            CoreError::QueryFailed { reason } => platform("querying the tunnel", reason),
        }
    }
}

fn platform(operation: &str, reason: String) -> CliError {
    CliError::Platform {
        operation: operation.into(),
        reason,
    }
}
