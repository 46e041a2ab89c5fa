// ── Controller abstraction ──
//
// Lifecycle management for one VPN configuration and its network
// extension. Serializes user commands against the platform's status
// feed, tracks intent, and publishes composite status changes.
//
// All intent and status bookkeeping sits behind one synchronous lock
// that is never held across an `.await`. Waiting for the platform
// (restart) happens on a `watch` channel of raw status instead.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::gateway::{ConfigGateway, GatewayError};
use crate::hub::{NotificationHub, SubscriberToken};
use crate::intent::IntentTracker;
use crate::model::{ConnectionStatus, Intent, ManagerStatus, TunnelHandle, TunnelLaunch};
use crate::stream::Subscription;
use crate::translate::compose;

type StartFlight = Shared<BoxFuture<'static, Result<TunnelHandle, CoreError>>>;

// ── RestartOutcome ───────────────────────────────────────────────

/// How a [`Controller::restart`] call ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Old extension stopped, new one started and reporting.
    Restarted(TunnelHandle),
    /// Nothing was running; nothing happened.
    NotRunning,
    /// Another restart is already underway.
    AlreadyInProgress,
    /// A `stop()` superseded the restart before the new extension was up.
    Cancelled,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Construct one per process
/// and hand clones to whoever needs it.
pub struct Controller<G: ConfigGateway> {
    inner: Arc<ControllerInner<G>>,
}

impl<G: ConfigGateway> Clone for Controller<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<G> {
    config: ControllerConfig,
    gateway: G,
    state: Mutex<ControlState>,
    raw_status: watch::Sender<ConnectionStatus>,
    status: watch::Sender<ManagerStatus>,
    hub: NotificationHub,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Everything guarded by the controller lock.
struct ControlState {
    intent: IntentTracker,
    last_raw: ConnectionStatus,
    published: ManagerStatus,
    target: Option<TunnelHandle>,
    /// Bumped by every `stop()`. A start launched under an older epoch
    /// has been superseded.
    start_epoch: u64,
    start_in_flight: Option<(u64, StartFlight)>,
    restart_cancel: Option<CancellationToken>,
}

impl<G: ConfigGateway> Controller<G> {
    /// Create a controller. Does not touch the platform until a command
    /// is issued or status is pushed in.
    pub fn new(config: ControllerConfig, gateway: G) -> Self {
        let (raw_status, _) = watch::channel(ConnectionStatus::Invalid);
        let (status, _) = watch::channel(ManagerStatus::Disconnected);
        let hub = NotificationHub::new(config.subscriber_buffer, config.max_missed_deliveries);

        Self {
            inner: Arc::new(ControllerInner {
                config,
                gateway,
                state: Mutex::new(ControlState {
                    intent: IntentTracker::new(),
                    last_raw: ConnectionStatus::Invalid,
                    published: ManagerStatus::Disconnected,
                    target: None,
                    start_epoch: 0,
                    start_in_flight: None,
                    restart_cancel: None,
                }),
                raw_status,
                status,
                hub,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ── Lifecycle commands ───────────────────────────────────────

    /// Load (or install) the VPN configuration and start the extension.
    ///
    /// At most one start runs at a time: a caller arriving while a start
    /// is in flight joins it and receives the same result. A `stop()`
    /// landing mid-start supersedes it; callers arriving after that stop
    /// wait for the superseded start to settle and then start afresh.
    pub async fn start_tunnel(&self) -> Result<TunnelHandle, CoreError> {
        self.start_since(None).await
    }

    /// Signal the running extension to start the VPN.
    ///
    /// [`start_tunnel`](Self::start_tunnel) must have completed first.
    pub async fn start_vpn(&self) -> Result<(), CoreError> {
        let handle = {
            let state = self.lock_state();
            match (&state.target, state.intent.snapshot().start_requested) {
                (Some(handle), true) => handle.clone(),
                _ => return Err(CoreError::TunnelNotStarted),
            }
        };

        self.inner
            .gateway
            .signal_start_vpn(&handle)
            .await
            .map_err(|e| CoreError::ExternalStartFailed {
                reason: e.to_string(),
            })?;

        debug!(config = %handle, "signalled extension to start the VPN");
        Ok(())
    }

    /// Stop the extension. Succeeds without doing anything when no
    /// configuration has been started. Cancels an in-progress restart.
    pub async fn stop(&self) -> Result<(), CoreError> {
        let target = {
            let mut state = self.lock_state();
            if let Some(cancel) = state.restart_cancel.take() {
                info!("stop supersedes in-progress restart");
                cancel.cancel();
            }
            state.intent.mark_stop_requested();
            state.start_epoch += 1;
            state.target.clone()
        };

        let Some(handle) = target else {
            debug!("stop requested with nothing running");
            return Ok(());
        };

        self.inner
            .gateway
            .stop_external_process(&handle)
            .await
            .map_err(|e| CoreError::StopFailed {
                reason: e.to_string(),
            })?;

        info!(config = %handle, "network extension stop requested");
        Ok(())
    }

    /// Stop the running extension and start a new one.
    ///
    /// Sequence: stop, wait for the platform to report the extension gone,
    /// start tunnel, start VPN, wait for the platform to report the new
    /// extension. Both waits are bounded by `restart_timeout`. While this
    /// runs the published status reads `Restarting` instead of
    /// `Disconnecting`/`Disconnected`.
    pub async fn restart(&self) -> Result<RestartOutcome, CoreError> {
        let (handle, epoch, cancel, mut raw_rx) = {
            let mut state = self.lock_state();
            if state.intent.snapshot().restart_in_progress {
                return Ok(RestartOutcome::AlreadyInProgress);
            }
            let Some(handle) = state.target.clone() else {
                return Ok(RestartOutcome::NotRunning);
            };
            if state.last_raw.is_stopped() {
                return Ok(RestartOutcome::NotRunning);
            }

            state.intent.mark_restart_begin();
            let cancel = CancellationToken::new();
            state.restart_cancel = Some(cancel.clone());
            (
                handle,
                state.start_epoch,
                cancel,
                self.inner.raw_status.subscribe(),
            )
        };

        // Clears the restart flag on every exit, including drop.
        let _guard = RestartGuard { controller: self };
        info!(config = %handle, "restarting network extension");

        self.inner
            .gateway
            .stop_external_process(&handle)
            .await
            .map_err(|e| CoreError::StopFailed {
                reason: e.to_string(),
            })?;

        if !self.await_raw(&mut raw_rx, &cancel, is_stopped).await? {
            info!("restart cancelled before the new start");
            return Ok(RestartOutcome::Cancelled);
        }

        let handle = match self.start_since(Some(epoch)).await {
            Ok(handle) => handle,
            Err(CoreError::StartSuperseded) => {
                info!("restart cancelled during the new start");
                return Ok(RestartOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        };

        if cancel.is_cancelled() {
            info!("restart cancelled before signalling the VPN");
            return Ok(RestartOutcome::Cancelled);
        }
        match self.start_vpn().await {
            Err(CoreError::TunnelNotStarted) if cancel.is_cancelled() => {
                return Ok(RestartOutcome::Cancelled);
            }
            other => other?,
        }

        if !self.await_raw(&mut raw_rx, &cancel, is_running).await? {
            info!("restart cancelled while the new extension was starting");
            return Ok(RestartOutcome::Cancelled);
        }

        info!(config = %handle, "restart complete");
        Ok(RestartOutcome::Restarted(handle))
    }

    // ── Status ───────────────────────────────────────────────────

    /// The composite status for the last observed raw status and the
    /// current intent.
    pub fn current_status(&self) -> ManagerStatus {
        let (raw, intent) = {
            let state = self.lock_state();
            (state.last_raw, state.intent.snapshot())
        };
        compose(raw, &intent)
    }

    /// `true` while connecting, connected or reasserting.
    pub fn is_active(&self) -> bool {
        self.current_status().is_active()
    }

    pub fn is_connected(&self) -> bool {
        self.current_status().is_connected()
    }

    /// The single reconciliation point: record a raw status reported by
    /// the platform and publish the composite status if it changed.
    pub fn on_raw_status_changed(&self, raw: ConnectionStatus) {
        let mut state = self.lock_state();
        state.last_raw = raw;
        self.inner.raw_status.send_replace(raw);
        self.reconcile(&mut state);
    }

    /// Last observed raw platform status.
    pub fn raw_status(&self) -> ConnectionStatus {
        self.lock_state().last_raw
    }

    pub fn intent(&self) -> Intent {
        self.lock_state().intent.snapshot()
    }

    /// The configuration the controller last started.
    pub fn target(&self) -> Option<TunnelHandle> {
        self.lock_state().target.clone()
    }

    pub fn start_stop_button_pressed(&self) -> bool {
        self.lock_state().intent.snapshot().start_stop_button_pressed
    }

    pub fn set_start_stop_button_pressed(&self, pressed: bool) {
        self.lock_state()
            .intent
            .set_start_stop_button_pressed(pressed);
    }

    // ── Tunnel queries ───────────────────────────────────────────

    /// Ask the running extension whether its tunnel has started.
    pub async fn is_tunnel_started(&self) -> Result<bool, CoreError> {
        let handle = self.target().ok_or(CoreError::NoTargetManager)?;
        let probe = self
            .inner
            .gateway
            .probe_tunnel(&handle)
            .await
            .map_err(|e| CoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(probe.started)
    }

    /// Ask the running extension whether its tunnel is connected.
    /// `false` when there is nothing to ask or the query fails.
    pub async fn is_tunnel_connected(&self) -> bool {
        let Some(handle) = self.target() else {
            return false;
        };
        match self.inner.gateway.probe_tunnel(&handle).await {
            Ok(probe) => probe.connected,
            Err(e) => {
                warn!(error = %e, "tunnel probe failed");
                false
            }
        }
    }

    // ── Configuration & on-demand ────────────────────────────────

    pub async fn is_configuration_installed(&self) -> bool {
        self.inner.gateway.is_configuration_installed().await
    }

    pub async fn is_on_demand_enabled(&self) -> bool {
        let enabled = self.inner.gateway.is_on_demand_enabled().await;
        self.lock_state().intent.set_on_demand(enabled);
        enabled
    }

    /// Save the connect-on-demand setting. Resolves to `true` if a change
    /// was saved, `false` if it already had that value.
    pub async fn update_on_demand(&self, enabled: bool) -> Result<bool, CoreError> {
        let changed = self
            .inner
            .gateway
            .set_on_demand(enabled)
            .await
            .map_err(save_error)?;

        self.lock_state().intent.set_on_demand(enabled);
        if changed {
            info!(enabled, "connect-on-demand setting saved");
        } else {
            debug!(enabled, "connect-on-demand already in requested state");
        }
        Ok(changed)
    }

    pub async fn remove_on_demand_rules(&self) -> Result<(), CoreError> {
        self.inner
            .gateway
            .remove_on_demand_rules()
            .await
            .map_err(save_error)?;

        self.lock_state().intent.set_on_demand(false);
        info!("connect-on-demand rules removed");
        Ok(())
    }

    // ── State observation ────────────────────────────────────────

    /// Register for composite status changes.
    pub fn subscribe(&self) -> Subscription {
        self.inner.hub.subscribe()
    }

    pub fn unsubscribe(&self, token: SubscriberToken) -> bool {
        self.inner.hub.unsubscribe(token)
    }

    /// Watch the last published composite status.
    pub fn status_watch(&self) -> watch::Receiver<ManagerStatus> {
        self.inner.status.subscribe()
    }

    // ── Background tasks ─────────────────────────────────────────

    /// Forward raw statuses from `feed` into
    /// [`on_raw_status_changed`](Self::on_raw_status_changed) until the
    /// feed closes or the controller shuts down.
    pub fn attach_status_feed(&self, feed: mpsc::Receiver<ConnectionStatus>) {
        let ctrl = self.clone();
        let cancel = self.inner.cancel.clone();
        let handle = tokio::spawn(status_feed_task(ctrl, feed, cancel));
        self.inner
            .task_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Cancel and join background tasks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = self
            .inner
            .task_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
        debug!("controller shut down");
    }

    // ── Internals ────────────────────────────────────────────────

    fn lock_state(&self) -> MutexGuard<'_, ControlState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Recompute the composite status and publish it if it changed.
    fn reconcile(&self, state: &mut ControlState) {
        let composite = compose(state.last_raw, &state.intent.snapshot());
        if composite == state.published {
            return;
        }

        debug!(
            from = %state.published,
            to = %composite,
            raw = %state.last_raw,
            "status changed"
        );
        state.published = composite;
        self.inner.status.send_replace(composite);

        let report = self.inner.hub.publish(composite);
        if report.dropped > 0 {
            debug!(dropped = report.dropped, "pruned subscribers during publish");
        }
    }

    /// Re-run reconciliation against the last observed raw status after
    /// an intent-only change.
    fn replay_observed_status(&self) {
        let mut state = self.lock_state();
        self.reconcile(&mut state);
    }

    /// Start, or join the start in flight. With `since` set, fail with
    /// `StartSuperseded` once a `stop()` has moved past that epoch.
    async fn start_since(&self, since: Option<u64>) -> Result<TunnelHandle, CoreError> {
        loop {
            let (flight, current) = {
                let mut state = self.lock_state();
                if since.is_some_and(|epoch| epoch != state.start_epoch) {
                    return Err(CoreError::StartSuperseded);
                }
                let epoch = state.start_epoch;
                match state.start_in_flight.clone() {
                    Some((flight_epoch, flight)) => (flight, flight_epoch == epoch),
                    None => {
                        let ctrl = self.clone();
                        let flight = async move { ctrl.run_start(epoch).await }
                            .boxed()
                            .shared();
                        state.start_in_flight = Some((epoch, flight.clone()));
                        (flight, true)
                    }
                }
            };

            if current {
                return flight.await;
            }
            debug!("waiting for a superseded start to settle");
            let _ = flight.await;
        }
    }

    /// Body of a shared start. Clears the in-flight marker however it ends.
    /// A start superseded by a `stop()` leaves intent alone and stops the
    /// extension it launched.
    async fn run_start(&self, epoch: u64) -> Result<TunnelHandle, CoreError> {
        let result = self.launch().await;

        let superseded = {
            let mut state = self.lock_state();
            state.start_in_flight = None;
            match result {
                Ok((handle, launch)) if state.start_epoch == epoch => {
                    state.intent.mark_start_requested();
                    state
                        .intent
                        .mark_tunnel_skipped(launch == TunnelLaunch::NoTunnel);
                    state.target = Some(handle.clone());
                    self.reconcile(&mut state);
                    return Ok(handle);
                }
                Ok((handle, _)) => handle,
                Err(e) => {
                    warn!(error = %e, code = e.code(), "tunnel start failed");
                    return Err(e);
                }
            }
        };

        info!(config = %superseded, "stop arrived mid-start, stopping the new extension");
        if let Err(e) = self
            .inner
            .gateway
            .stop_external_process(&superseded)
            .await
        {
            warn!(error = %e, "failed to stop superseded extension");
        }
        Err(CoreError::StartSuperseded)
    }

    async fn launch(&self) -> Result<(TunnelHandle, TunnelLaunch), CoreError> {
        let gateway = &self.inner.gateway;

        let mut configs = gateway
            .load_configurations()
            .await
            .map_err(|e| CoreError::ConfigLoadFailed {
                reason: e.to_string(),
            })?;

        if configs.len() > 1 {
            return Err(CoreError::TooManyConfigs {
                count: configs.len(),
            });
        }

        let handle = match configs.pop() {
            Some(handle) if handle.installed => handle,
            Some(handle) => self.install(handle).await?,
            None => {
                info!("no VPN configuration found, installing a new one");
                let fresh = TunnelHandle::new(self.inner.config.configuration_name.clone());
                self.install(fresh).await?
            }
        };

        let launch = gateway
            .start_external_process(&handle)
            .await
            .map_err(|e| CoreError::ExternalStartFailed {
                reason: e.to_string(),
            })?;

        info!(config = %handle, ?launch, "network extension started");
        Ok((handle, launch))
    }

    async fn install(&self, handle: TunnelHandle) -> Result<TunnelHandle, CoreError> {
        let installed = self
            .inner
            .gateway
            .install(handle)
            .await
            .map_err(|e| match e {
                GatewayError::Denied => CoreError::UserDeniedInstall,
                other => CoreError::ConfigSaveFailed {
                    reason: other.to_string(),
                },
            })?;

        info!(config = %installed, "VPN configuration installed");
        Ok(installed)
    }

    /// Wait until the raw status satisfies `reached`, bounded by the
    /// restart timeout. `Ok(false)` means the restart was cancelled.
    async fn await_raw(
        &self,
        rx: &mut watch::Receiver<ConnectionStatus>,
        cancel: &CancellationToken,
        reached: fn(&ConnectionStatus) -> bool,
    ) -> Result<bool, CoreError> {
        let timeout = self.inner.config.restart_timeout;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(false),
            res = tokio::time::timeout(timeout, wait_for_raw(rx, reached)) => match res {
                Ok(()) => Ok(!cancel.is_cancelled()),
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "restart timed out");
                    Err(CoreError::RestartTimedOut {
                        timeout_secs: timeout.as_secs(),
                    })
                }
            },
        }
    }
}

// ── Restart cleanup ──────────────────────────────────────────────

struct RestartGuard<'a, G: ConfigGateway> {
    controller: &'a Controller<G>,
}

impl<G: ConfigGateway> Drop for RestartGuard<'_, G> {
    fn drop(&mut self) {
        {
            let mut state = self.controller.lock_state();
            state.intent.mark_restart_end();
            state.restart_cancel = None;
        }
        self.controller.replay_observed_status();
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn is_stopped(raw: &ConnectionStatus) -> bool {
    raw.is_stopped()
}

fn is_running(raw: &ConnectionStatus) -> bool {
    !raw.is_stopped()
}

fn save_error(err: GatewayError) -> CoreError {
    match err {
        GatewayError::NoTargetManager => CoreError::NoTargetManager,
        other => CoreError::ConfigSaveFailed {
            reason: other.to_string(),
        },
    }
}

async fn wait_for_raw(
    rx: &mut watch::Receiver<ConnectionStatus>,
    reached: fn(&ConnectionStatus) -> bool,
) {
    if rx.wait_for(reached).await.is_err() {
        debug!("raw status channel closed");
    }
}

/// Pump raw statuses from the gateway's channel into the controller.
async fn status_feed_task<G: ConfigGateway>(
    controller: Controller<G>,
    mut feed: mpsc::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            raw = feed.recv() => {
                let Some(raw) = raw else { break };
                controller.on_raw_status_changed(raw);
            }
        }
    }
    debug!("status feed task exiting");
}
