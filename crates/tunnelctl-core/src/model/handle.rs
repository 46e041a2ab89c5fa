// ── Configuration identity and platform answers ──

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The VPN configuration the controller operates on.
///
/// Opaque to the controller beyond its identity; the gateway owns the
/// platform-side object it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelHandle {
    pub id: Uuid,
    pub name: String,
    /// Saved to (and enabled in) the platform's configuration store.
    pub installed: bool,
    pub on_demand: bool,
}

impl TunnelHandle {
    /// A fresh, not yet installed configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            installed: false,
            on_demand: false,
        }
    }
}

impl fmt::Display for TunnelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Outcome of starting the network extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelLaunch {
    /// Extension and tunnel are starting.
    Started,
    /// Extension is running but chose not to start the tunnel.
    NoTunnel,
}

/// Answer to a tunnel query sent to the running extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelProbe {
    pub started: bool,
    pub connected: bool,
}
