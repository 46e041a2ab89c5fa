// ── Status domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Raw connection status of the network extension, as reported by the
/// platform. Read-only to the controller.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConnectionStatus {
    /// No VPN configuration, or the platform has not reported yet.
    #[default]
    Invalid,
    Disconnected,
    Connecting,
    Connected,
    Reasserting,
    Disconnecting,
}

impl ConnectionStatus {
    /// `true` once the extension process is gone (or was never there).
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Invalid | Self::Disconnected)
    }
}

/// Composite status published by the controller.
///
/// Mirrors [`ConnectionStatus`] with two additions that only the
/// controller can know: [`Restarting`](Self::Restarting) and
/// [`NoTunnel`](Self::NoTunnel).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ManagerStatus {
    Invalid,
    /// No network extension process is running.
    #[default]
    Disconnected,
    /// Extension is running and the tunnel has started (connecting or connected).
    Connecting,
    /// Extension is running and the tunnel is connected.
    Connected,
    /// Extension is running and the tunnel is reconnecting.
    Reasserting,
    /// Tunnel and extension are being stopped.
    Disconnecting,
    /// Previous extension is being stopped so a new one can start.
    Restarting,
    /// Extension is running but the tunnel was intentionally not started
    /// (e.g. no valid subscription).
    NoTunnel,
}

impl ManagerStatus {
    /// Stable numeric code, matching the platform-facing status values.
    pub fn code(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Disconnected => 1,
            Self::Connecting => 2,
            Self::Connected => 3,
            Self::Reasserting => 4,
            Self::Disconnecting => 5,
            Self::Restarting => 6,
            Self::NoTunnel => 7,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reasserting)
    }

    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Reasserting => "Reconnecting...",
            Self::Disconnecting => "Disconnecting...",
            Self::Restarting => "Restarting...",
            Self::NoTunnel => "Running without tunnel",
        }
    }
}
