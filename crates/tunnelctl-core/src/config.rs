// ── Runtime controller configuration ──
//
// These types describe how the controller behaves: timeouts and
// notification back-pressure. They never touch disk; the CLI (or any
// embedding app) builds a `ControllerConfig` and hands it in.

use std::time::Duration;

/// Default bound on each platform wait during a restart.
pub const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(20);
/// Default per-subscriber channel capacity.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;
/// Default number of consecutive missed deliveries before a subscriber is dropped.
pub const DEFAULT_MAX_MISSED_DELIVERIES: u32 = 4;

/// Configuration for a single [`Controller`](crate::Controller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// How long a restart waits for the old extension to stop, and again
    /// for the new one to report.
    pub restart_timeout: Duration,
    /// Capacity of each subscriber's delivery channel.
    pub subscriber_buffer: usize,
    /// Consecutive full-buffer misses tolerated before a subscriber is dropped.
    pub max_missed_deliveries: u32,
    /// Name given to a configuration the controller installs itself.
    pub configuration_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            restart_timeout: DEFAULT_RESTART_TIMEOUT,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            max_missed_deliveries: DEFAULT_MAX_MISSED_DELIVERIES,
            configuration_name: "tunnelctl".into(),
        }
    }
}
