// ── Intent tracking ──
//
// Plain state, no I/O. Owned by the controller, which is its only writer.

use crate::model::Intent;

/// Holds the current [`Intent`] and applies the controller's mutations.
#[derive(Debug, Default)]
pub struct IntentTracker {
    intent: Intent,
}

impl IntentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_start_requested(&mut self) {
        self.intent.start_requested = true;
        self.intent.stop_requested = false;
    }

    pub fn mark_stop_requested(&mut self) {
        self.intent.stop_requested = true;
        self.intent.start_requested = false;
    }

    pub fn mark_restart_begin(&mut self) {
        self.intent.restart_in_progress = true;
    }

    pub fn mark_restart_end(&mut self) {
        self.intent.restart_in_progress = false;
    }

    pub fn mark_tunnel_skipped(&mut self, skipped: bool) {
        self.intent.tunnel_intentionally_skipped = skipped;
    }

    pub fn set_on_demand(&mut self, enabled: bool) {
        self.intent.on_demand_enabled = enabled;
    }

    pub fn set_start_stop_button_pressed(&mut self, pressed: bool) {
        self.intent.start_stop_button_pressed = pressed;
    }

    pub fn snapshot(&self) -> Intent {
        self.intent
    }
}
