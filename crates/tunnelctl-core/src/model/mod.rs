// ── Tunnel domain model ──
//
// Status enums, the intent snapshot, and the identity types exchanged
// with the platform gateway. Consumers (CLI, embedding apps) depend on
// these and never on platform-specific representations.

pub mod handle;
pub mod intent;
pub mod status;

// ── Re-exports ──────────────────────────────────────────────────────
// Flat access: `use tunnelctl_core::model::*` gives you everything.

pub use handle::{TunnelHandle, TunnelLaunch, TunnelProbe};
pub use intent::Intent;
pub use status::{ConnectionStatus, ManagerStatus};
