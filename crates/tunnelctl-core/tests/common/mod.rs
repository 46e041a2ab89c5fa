// Shared fixtures for controller integration tests: a scriptable
// in-memory gateway that counts every platform call.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tunnelctl_core::{
    ConfigGateway, ConnectionStatus, Controller, ControllerConfig, GatewayError, TunnelHandle,
    TunnelLaunch, TunnelProbe,
};

// ── FakeGateway ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct Script {
    pub configs: Vec<TunnelHandle>,
    pub load_error: Option<String>,
    pub deny_install: bool,
    pub start_error: Option<String>,
    pub stop_error: Option<String>,
    pub launch: Option<TunnelLaunch>,
    pub start_delay: Option<Duration>,
    pub probe: Option<TunnelProbe>,
    pub on_demand: bool,
    pub has_target: bool,
}

#[derive(Default)]
struct Calls {
    load: AtomicUsize,
    install: AtomicUsize,
    start: AtomicUsize,
    stop: AtomicUsize,
    vpn: AtomicUsize,
}

/// Cloneable handle: the controller owns one clone, the test keeps another.
#[derive(Clone, Default)]
pub struct FakeGateway {
    script: Arc<Mutex<Script>>,
    calls: Arc<Calls>,
}

impl FakeGateway {
    /// One installed configuration, everything succeeds.
    pub fn installed() -> Self {
        let gw = Self::default();
        gw.script(|s| {
            let mut handle = TunnelHandle::new("test-vpn");
            handle.installed = true;
            s.configs = vec![handle];
            s.has_target = true;
        });
        gw
    }

    pub fn script(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn load_calls(&self) -> usize {
        self.calls.load.load(Ordering::SeqCst)
    }

    pub fn install_calls(&self) -> usize {
        self.calls.install.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.calls.start.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.calls.stop.load(Ordering::SeqCst)
    }

    pub fn vpn_signals(&self) -> usize {
        self.calls.vpn.load(Ordering::SeqCst)
    }
}

impl ConfigGateway for FakeGateway {
    async fn load_configurations(&self) -> Result<Vec<TunnelHandle>, GatewayError> {
        self.calls.load.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        match &script.load_error {
            Some(msg) => Err(GatewayError::platform(msg.clone())),
            None => Ok(script.configs.clone()),
        }
    }

    async fn install(&self, mut handle: TunnelHandle) -> Result<TunnelHandle, GatewayError> {
        self.calls.install.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.deny_install {
            return Err(GatewayError::Denied);
        }
        handle.installed = true;
        script.configs = vec![handle.clone()];
        script.has_target = true;
        Ok(handle)
    }

    async fn start_external_process(
        &self,
        _handle: &TunnelHandle,
    ) -> Result<TunnelLaunch, GatewayError> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        let delay = self.script.lock().unwrap().start_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let script = self.script.lock().unwrap();
        match &script.start_error {
            Some(msg) => Err(GatewayError::platform(msg.clone())),
            None => Ok(script.launch.unwrap_or(TunnelLaunch::Started)),
        }
    }

    async fn stop_external_process(&self, _handle: &TunnelHandle) -> Result<(), GatewayError> {
        self.calls.stop.fetch_add(1, Ordering::SeqCst);
        match &self.script.lock().unwrap().stop_error {
            Some(msg) => Err(GatewayError::platform(msg.clone())),
            None => Ok(()),
        }
    }

    async fn signal_start_vpn(&self, _handle: &TunnelHandle) -> Result<(), GatewayError> {
        self.calls.vpn.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn probe_tunnel(&self, _handle: &TunnelHandle) -> Result<TunnelProbe, GatewayError> {
        self.script
            .lock()
            .unwrap()
            .probe
            .ok_or_else(|| GatewayError::platform("extension not responding"))
    }

    async fn is_configuration_installed(&self) -> bool {
        self.script.lock().unwrap().configs.iter().any(|h| h.installed)
    }

    async fn is_on_demand_enabled(&self) -> bool {
        self.script.lock().unwrap().on_demand
    }

    async fn set_on_demand(&self, enabled: bool) -> Result<bool, GatewayError> {
        let mut script = self.script.lock().unwrap();
        if !script.has_target {
            return Err(GatewayError::NoTargetManager);
        }
        let changed = script.on_demand != enabled;
        script.on_demand = enabled;
        Ok(changed)
    }

    async fn remove_on_demand_rules(&self) -> Result<(), GatewayError> {
        let mut script = self.script.lock().unwrap();
        if !script.has_target {
            return Err(GatewayError::NoTargetManager);
        }
        script.on_demand = false;
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        restart_timeout: Duration::from_secs(5),
        ..ControllerConfig::default()
    }
}

pub fn controller(gw: &FakeGateway) -> Controller<FakeGateway> {
    Controller::new(test_config(), gw.clone())
}

/// A controller whose extension is started, signalled and reporting `Connected`.
pub async fn connected(gw: &FakeGateway) -> Controller<FakeGateway> {
    let ctrl = controller(gw);
    ctrl.start_tunnel().await.unwrap();
    ctrl.start_vpn().await.unwrap();
    ctrl.on_raw_status_changed(ConnectionStatus::Connecting);
    ctrl.on_raw_status_changed(ConnectionStatus::Connected);
    ctrl
}

/// Yield to other tasks until `cond` holds. Panics after a generous bound.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
