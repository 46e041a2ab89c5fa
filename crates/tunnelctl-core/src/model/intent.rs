// ── Intent snapshot ──

use serde::{Deserialize, Serialize};

/// What the user (or the embedding app) has asked the controller to do.
///
/// Only the controller mutates intent, through [`IntentTracker`]; callers
/// see immutable snapshots.
///
/// [`IntentTracker`]: crate::intent::IntentTracker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Intent {
    pub start_requested: bool,
    pub stop_requested: bool,
    pub restart_in_progress: bool,
    /// The extension started but deliberately did not start a tunnel.
    pub tunnel_intentionally_skipped: bool,
    pub on_demand_enabled: bool,
    pub start_stop_button_pressed: bool,
}
