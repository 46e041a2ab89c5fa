// ── Core error types ──
//
// Errors returned by controller operations. Platform failures arrive as
// `GatewayError` and are translated at the call site, since the same
// platform failure means different things during load, install or start.
//
// `CoreError` is `Clone`: a joined in-flight start hands the same result
// to every caller.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Failed to load VPN configurations: {reason}")]
    ConfigLoadFailed { reason: String },

    #[error("Found {count} VPN configurations, refusing to pick one")]
    TooManyConfigs { count: usize },

    #[error("User declined to install the VPN configuration")]
    UserDeniedInstall,

    #[error("Failed to save VPN configuration: {reason}")]
    ConfigSaveFailed { reason: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Network extension failed to start: {reason}")]
    ExternalStartFailed { reason: String },

    #[error("Network extension failed to stop: {reason}")]
    StopFailed { reason: String },

    #[error("No VPN configuration to operate on")]
    NoTargetManager,

    #[error("Tunnel has not been started")]
    TunnelNotStarted,

    #[error("Tunnel start was superseded by a stop")]
    StartSuperseded,

    #[error("Restart timed out after {timeout_secs}s waiting on the network extension")]
    RestartTimedOut { timeout_secs: u64 },

    // ── Query errors ─────────────────────────────────────────────────
    #[error("Platform query failed: {reason}")]
    QueryFailed { reason: String },
}

impl CoreError {
    /// Stable numeric code. Codes 1 through 5 keep the values of the
    /// platform VPN manager's error domain.
    pub fn code(&self) -> i32 {
        match self {
            Self::ConfigLoadFailed { .. } => 1,
            Self::TooManyConfigs { .. } => 2,
            Self::UserDeniedInstall => 3,
            Self::ExternalStartFailed { .. } => 4,
            Self::NoTargetManager => 5,
            Self::ConfigSaveFailed { .. } => 6,
            Self::StopFailed { .. } => 7,
            Self::TunnelNotStarted => 8,
            Self::RestartTimedOut { .. } => 9,
            Self::QueryFailed { .. } => 10,
            Self::StartSuperseded => 11,
        }
    }
}
