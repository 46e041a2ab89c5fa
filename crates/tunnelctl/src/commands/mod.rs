//! Command handlers that drive a live controller.

pub mod config_cmd;
pub mod session;
pub mod up;

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use tunnelctl_core::{Controller, ManagerStatus, SubscriberToken};

use crate::cli::Command;
use crate::error::CliError;
use crate::output::Printer;
use crate::platform::SimulatedPlatform;

pub type SimController = Controller<SimulatedPlatform>;

/// Route a controller-backed command to its handler.
pub async fn dispatch(
    cmd: Command,
    controller: &SimController,
    printer: Printer,
) -> Result<(), CliError> {
    match cmd {
        Command::Session => session::handle(controller, printer).await,
        Command::Up(args) => up::handle(args, controller, printer).await,
        Command::Config(_) | Command::Completions(_) => unreachable!("handled before dispatch"),
    }
}

// ── Transition printer ───────────────────────────────────────────────

/// Prints every published status change until stopped.
pub struct TransitionPrinter {
    token: SubscriberToken,
    task: JoinHandle<()>,
}

impl TransitionPrinter {
    pub fn spawn(controller: &SimController, printer: Printer) -> Self {
        let mut sub = controller.subscribe();
        let token = sub.token();
        let task = tokio::spawn(async move {
            while let Some(status) = sub.recv().await {
                printer.transition(status);
            }
        });
        Self { token, task }
    }

    /// Unsubscribe, then wait for already-published changes to print.
    pub async fn finish(self, controller: &SimController) {
        controller.unsubscribe(self.token);
        let _ = self.task.await;
    }
}

/// Wait until the status on `watch` satisfies `reached`, bounded by
/// `timeout`. Returns the status that satisfied it.
pub async fn wait_for_status(
    mut watch: watch::Receiver<ManagerStatus>,
    timeout: Duration,
    reached: impl FnMut(&ManagerStatus) -> bool,
) -> Result<ManagerStatus, CliError> {
    match tokio::time::timeout(timeout, watch.wait_for(reached)).await {
        Ok(Ok(status)) => Ok(*status),
        Ok(Err(_)) => Err(CliError::Platform {
            operation: "waiting for status".into(),
            reason: "controller shut down".into(),
        }),
        Err(_) => Err(CliError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::exit_code;

    #[tokio::test]
    async fn wait_returns_the_status_that_satisfied_it() {
        let (tx, rx) = watch::channel(ManagerStatus::Disconnected);
        tx.send_replace(ManagerStatus::Connected);

        let reached = wait_for_status(rx, Duration::from_secs(1), |s| s.is_active())
            .await
            .unwrap();
        assert_eq!(reached, ManagerStatus::Connected);
    }

    #[tokio::test]
    async fn closed_status_channel_is_a_platform_error() {
        let (tx, rx) = watch::channel(ManagerStatus::Disconnected);
        drop(tx);

        let err = wait_for_status(rx, Duration::from_secs(1), |s| *s == ManagerStatus::Connected)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Platform { .. }));
        assert_eq!(err.exit_code(), exit_code::PLATFORM);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_gives_up_after_the_timeout() {
        let (_tx, rx) = watch::channel(ManagerStatus::Disconnected);

        let err = wait_for_status(rx, Duration::from_secs(3), |s| *s == ManagerStatus::Connected)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Timeout { seconds: 3 }));
    }
}
