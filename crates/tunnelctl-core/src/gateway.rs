// ── Platform gateway boundary ──
//
// Everything the controller needs from the operating system's VPN
// subsystem: the configuration store, the extension process, and the
// on-demand settings. Implementations live outside this crate (the CLI
// ships a simulated one); the controller owns exactly one.
//
// Raw status flows the other way: implementations push it into
// `Controller::on_raw_status_changed`, directly or through a channel
// handed to `Controller::attach_status_feed`.

use std::future::Future;

use thiserror::Error;

use crate::model::{TunnelHandle, TunnelLaunch, TunnelProbe};

/// Failure reported by a [`ConfigGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The user declined a platform prompt.
    #[error("denied by user")]
    Denied,

    /// The platform has no configuration to act on.
    #[error("no target manager")]
    NoTargetManager,

    #[error("{message}")]
    Platform { message: String },
}

impl GatewayError {
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }
}

/// The external collaborator driven by the controller.
///
/// Methods return `Send` futures so the controller can run them from
/// spawned tasks and shared in-flight starts.
pub trait ConfigGateway: Send + Sync + 'static {
    /// Load every VPN configuration this app owns.
    fn load_configurations(
        &self,
    ) -> impl Future<Output = Result<Vec<TunnelHandle>, GatewayError>> + Send;

    /// Save and enable `handle`, prompting the user if the platform requires it.
    fn install(
        &self,
        handle: TunnelHandle,
    ) -> impl Future<Output = Result<TunnelHandle, GatewayError>> + Send;

    /// Start the extension process for `handle`.
    fn start_external_process(
        &self,
        handle: &TunnelHandle,
    ) -> impl Future<Output = Result<TunnelLaunch, GatewayError>> + Send;

    /// Stop the extension process. Succeeds if it is not running.
    fn stop_external_process(
        &self,
        handle: &TunnelHandle,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Tell a running extension to begin tunneling.
    fn signal_start_vpn(
        &self,
        handle: &TunnelHandle,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Ask a running extension about its tunnel.
    fn probe_tunnel(
        &self,
        handle: &TunnelHandle,
    ) -> impl Future<Output = Result<TunnelProbe, GatewayError>> + Send;

    fn is_configuration_installed(&self) -> impl Future<Output = bool> + Send;

    fn is_on_demand_enabled(&self) -> impl Future<Output = bool> + Send;

    /// Persist the connect-on-demand flag. Resolves to `true` if a change
    /// was saved, `false` if the setting already had that value.
    fn set_on_demand(&self, enabled: bool)
    -> impl Future<Output = Result<bool, GatewayError>> + Send;

    fn remove_on_demand_rules(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
