//! In-process stand-in for the operating system's VPN subsystem.
//!
//! Holds a configuration store and an extension "process", and reports
//! raw connection statuses the way a real platform would: asynchronously,
//! one step at a time, `step_delay` apart.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use tunnelctl_config::PlatformSection;
use tunnelctl_core::{
    ConfigGateway, ConnectionStatus, GatewayError, TunnelHandle, TunnelLaunch, TunnelProbe,
};

const STEP_QUEUE: usize = 32;
const FEED_BUFFER: usize = 32;

// ── SimulatedPlatform ────────────────────────────────────────────────

#[derive(Clone)]
pub struct SimulatedPlatform {
    inner: Arc<PlatformInner>,
}

struct PlatformInner {
    settings: PlatformSection,
    store: Mutex<Store>,
    steps: mpsc::Sender<ConnectionStatus>,
}

#[derive(Debug, Default)]
struct Store {
    configs: Vec<TunnelHandle>,
    on_demand: bool,
    extension_running: bool,
    tunnel_connected: bool,
}

impl SimulatedPlatform {
    /// Build the platform and the raw status feed to hand to
    /// `Controller::attach_status_feed`. Must run inside a tokio runtime.
    pub fn new(settings: PlatformSection) -> (Self, mpsc::Receiver<ConnectionStatus>) {
        let configs = (0..settings.existing_configurations)
            .map(|i| {
                let mut handle = TunnelHandle::new(format!("existing-{}", i + 1));
                handle.installed = settings.installed;
                handle.on_demand = settings.on_demand;
                handle
            })
            .collect();

        let (steps_tx, steps_rx) = mpsc::channel(STEP_QUEUE);
        let (feed_tx, feed_rx) = mpsc::channel(FEED_BUFFER);
        tokio::spawn(step_task(steps_rx, feed_tx, settings.step_delay()));

        let store = Store {
            configs,
            on_demand: settings.on_demand,
            ..Store::default()
        };

        let platform = Self {
            inner: Arc::new(PlatformInner {
                settings,
                store: Mutex::new(store),
                steps: steps_tx,
            }),
        };
        (platform, feed_rx)
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue raw statuses for delivery, in order.
    async fn report(&self, statuses: &[ConnectionStatus]) {
        for status in statuses {
            if self.inner.steps.send(*status).await.is_err() {
                debug!("status feed closed, dropping simulated status");
                return;
            }
        }
    }
}

impl ConfigGateway for SimulatedPlatform {
    async fn load_configurations(&self) -> Result<Vec<TunnelHandle>, GatewayError> {
        Ok(self.store().configs.clone())
    }

    async fn install(&self, mut handle: TunnelHandle) -> Result<TunnelHandle, GatewayError> {
        if self.inner.settings.deny_install {
            info!(config = %handle, "simulated user declined the install prompt");
            return Err(GatewayError::Denied);
        }

        handle.installed = true;
        let mut store = self.store();
        handle.on_demand = store.on_demand;
        match store.configs.iter_mut().find(|c| c.id == handle.id) {
            Some(existing) => existing.clone_from(&handle),
            None => store.configs.push(handle.clone()),
        }
        Ok(handle)
    }

    async fn start_external_process(
        &self,
        handle: &TunnelHandle,
    ) -> Result<TunnelLaunch, GatewayError> {
        {
            let mut store = self.store();
            if !store.configs.iter().any(|c| c.id == handle.id && c.installed) {
                return Err(GatewayError::platform(format!(
                    "configuration {} is not installed",
                    handle.name
                )));
            }
            store.extension_running = true;
            store.tunnel_connected = false;
        }

        self.report(&[ConnectionStatus::Connecting]).await;
        if self.inner.settings.entitled {
            Ok(TunnelLaunch::Started)
        } else {
            Ok(TunnelLaunch::NoTunnel)
        }
    }

    async fn stop_external_process(&self, _handle: &TunnelHandle) -> Result<(), GatewayError> {
        let was_running = {
            let mut store = self.store();
            store.tunnel_connected = false;
            std::mem::replace(&mut store.extension_running, false)
        };

        if was_running {
            self.report(&[ConnectionStatus::Disconnecting, ConnectionStatus::Disconnected])
                .await;
        }
        Ok(())
    }

    async fn signal_start_vpn(&self, _handle: &TunnelHandle) -> Result<(), GatewayError> {
        {
            let mut store = self.store();
            if !store.extension_running {
                return Err(GatewayError::platform("network extension is not running"));
            }
            if !self.inner.settings.entitled {
                debug!("not entitled, extension keeps the tunnel down");
                return Ok(());
            }
            store.tunnel_connected = true;
        }

        self.report(&[ConnectionStatus::Connected]).await;
        Ok(())
    }

    async fn probe_tunnel(&self, _handle: &TunnelHandle) -> Result<TunnelProbe, GatewayError> {
        let store = self.store();
        if !store.extension_running {
            return Err(GatewayError::platform("network extension is not running"));
        }
        Ok(TunnelProbe {
            started: self.inner.settings.entitled,
            connected: store.tunnel_connected,
        })
    }

    async fn is_configuration_installed(&self) -> bool {
        self.store().configs.iter().any(|c| c.installed)
    }

    async fn is_on_demand_enabled(&self) -> bool {
        self.store().on_demand
    }

    async fn set_on_demand(&self, enabled: bool) -> Result<bool, GatewayError> {
        let mut store = self.store();
        if !store.configs.iter().any(|c| c.installed) {
            return Err(GatewayError::NoTargetManager);
        }
        let changed = store.on_demand != enabled;
        store.on_demand = enabled;
        for config in &mut store.configs {
            config.on_demand = enabled;
        }
        Ok(changed)
    }

    async fn remove_on_demand_rules(&self) -> Result<(), GatewayError> {
        let mut store = self.store();
        if !store.configs.iter().any(|c| c.installed) {
            return Err(GatewayError::NoTargetManager);
        }
        store.on_demand = false;
        for config in &mut store.configs {
            config.on_demand = false;
        }
        Ok(())
    }
}

/// Deliver queued statuses to the controller feed, one step apart.
async fn step_task(
    mut steps: mpsc::Receiver<ConnectionStatus>,
    feed: mpsc::Sender<ConnectionStatus>,
    delay: Duration,
) {
    while let Some(status) = steps.recv().await {
        tokio::time::sleep(delay).await;
        debug!(%status, "platform reports");
        if feed.send(status).await.is_err() {
            break;
        }
    }
    debug!("platform step task exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings() -> PlatformSection {
        PlatformSection {
            step_delay_ms: 1,
            ..PlatformSection::default()
        }
    }

    #[tokio::test]
    async fn start_then_vpn_reports_connecting_then_connected() {
        let (platform, mut feed) = SimulatedPlatform::new(settings());
        let handle = platform.install(TunnelHandle::new("sim")).await.unwrap();

        let launch = platform.start_external_process(&handle).await.unwrap();
        platform.signal_start_vpn(&handle).await.unwrap();

        assert_eq!(launch, TunnelLaunch::Started);
        assert_eq!(feed.recv().await, Some(ConnectionStatus::Connecting));
        assert_eq!(feed.recv().await, Some(ConnectionStatus::Connected));
        assert!(platform.probe_tunnel(&handle).await.unwrap().connected);
    }

    #[tokio::test]
    async fn unentitled_extension_starts_without_tunnel() {
        let (platform, mut feed) = SimulatedPlatform::new(PlatformSection {
            entitled: false,
            ..settings()
        });
        let handle = platform.install(TunnelHandle::new("sim")).await.unwrap();

        let launch = platform.start_external_process(&handle).await.unwrap();
        platform.signal_start_vpn(&handle).await.unwrap();

        assert_eq!(launch, TunnelLaunch::NoTunnel);
        assert_eq!(feed.recv().await, Some(ConnectionStatus::Connecting));
        let probe = platform.probe_tunnel(&handle).await.unwrap();
        assert!(!probe.started);
        assert!(!probe.connected);
    }

    #[tokio::test]
    async fn stop_reports_teardown_only_when_running() {
        let (platform, mut feed) = SimulatedPlatform::new(settings());
        let handle = platform.install(TunnelHandle::new("sim")).await.unwrap();

        platform.stop_external_process(&handle).await.unwrap();
        platform.start_external_process(&handle).await.unwrap();
        platform.stop_external_process(&handle).await.unwrap();

        assert_eq!(feed.recv().await, Some(ConnectionStatus::Connecting));
        assert_eq!(feed.recv().await, Some(ConnectionStatus::Disconnecting));
        assert_eq!(feed.recv().await, Some(ConnectionStatus::Disconnected));
        assert!(platform.probe_tunnel(&handle).await.is_err());
    }

    #[tokio::test]
    async fn denied_install_leaves_store_empty() {
        let (platform, _feed) = SimulatedPlatform::new(PlatformSection {
            deny_install: true,
            ..settings()
        });

        let err = platform.install(TunnelHandle::new("sim")).await.unwrap_err();

        assert_eq!(err, GatewayError::Denied);
        assert!(!platform.is_configuration_installed().await);
        assert_eq!(
            platform.set_on_demand(true).await,
            Err(GatewayError::NoTargetManager)
        );
    }

    #[tokio::test]
    async fn existing_configurations_are_preloaded() {
        let (platform, _feed) = SimulatedPlatform::new(PlatformSection {
            existing_configurations: 2,
            installed: true,
            ..settings()
        });

        let configs = platform.load_configurations().await.unwrap();
        assert_eq!(configs.len(), 2);
        assert!(configs.iter().all(|c| c.installed));
    }
}
