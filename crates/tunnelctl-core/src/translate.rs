// ── Raw → composite status translation ──
//
// Pure mapping from what the platform reports plus local intent into the
// status the controller publishes. No side effects; the controller may
// call it with or without holding its state lock.

use crate::model::{ConnectionStatus, Intent, ManagerStatus};

impl From<ConnectionStatus> for ManagerStatus {
    fn from(raw: ConnectionStatus) -> Self {
        match raw {
            ConnectionStatus::Invalid => Self::Invalid,
            ConnectionStatus::Disconnected => Self::Disconnected,
            ConnectionStatus::Connecting => Self::Connecting,
            ConnectionStatus::Connected => Self::Connected,
            ConnectionStatus::Reasserting => Self::Reasserting,
            ConnectionStatus::Disconnecting => Self::Disconnecting,
        }
    }
}

/// Compose the published status from a raw platform status and intent.
///
/// Rules, first match wins:
/// 1. restart in progress and the old extension is stopping or gone → `Restarting`
/// 2. `Invalid` → `Disconnected`
/// 3. `Connecting` with the tunnel intentionally skipped → `NoTunnel`
/// 4. otherwise 1:1
pub fn compose(raw: ConnectionStatus, intent: &Intent) -> ManagerStatus {
    match raw {
        ConnectionStatus::Disconnecting | ConnectionStatus::Disconnected | ConnectionStatus::Invalid
            if intent.restart_in_progress =>
        {
            ManagerStatus::Restarting
        }
        ConnectionStatus::Invalid => ManagerStatus::Disconnected,
        ConnectionStatus::Connecting if intent.tunnel_intentionally_skipped => {
            ManagerStatus::NoTunnel
        }
        other => other.into(),
    }
}
