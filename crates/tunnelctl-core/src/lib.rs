//! VPN tunnel lifecycle controller.
//!
//! This crate owns the state machine that sits between an application and
//! the operating system's VPN subsystem:
//!
//! - **[`Controller`]**: Central facade. Starts, stops and restarts the
//!   network extension through a [`ConfigGateway`], deduplicates overlapping
//!   starts, and reconciles the platform's asynchronously reported
//!   [`ConnectionStatus`] with local [`Intent`] into a composite
//!   [`ManagerStatus`].
//!
//! - **[`NotificationHub`]**: Typed publish/subscribe for composite status
//!   changes. Publishing never waits on a subscriber; stalled subscribers
//!   are dropped after a bounded number of missed deliveries.
//!
//! - **[`Subscription`]**: Receiving side of a hub registration, convertible
//!   into a `Stream`.
//!
//! - **[`compose`]**: The pure raw-to-composite status mapping.
//!
//! - **[`ConfigGateway`]**: Trait for the platform boundary: configuration
//!   store, extension process, connect-on-demand settings.

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod intent;
pub mod model;
pub mod stream;
pub mod translate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ControllerConfig;
pub use controller::{Controller, RestartOutcome};
pub use error::CoreError;
pub use gateway::{ConfigGateway, GatewayError};
pub use hub::{NotificationHub, PublishReport, SubscriberToken};
pub use intent::IntentTracker;
pub use stream::{StatusStream, Subscription};
pub use translate::compose;

pub use model::{
    ConnectionStatus, Intent, ManagerStatus, TunnelHandle, TunnelLaunch, TunnelProbe,
};
