//! `tunnelctl up`: bring the VPN up, hold, bring it down.

use std::time::Duration;

use tracing::info;

use tunnelctl_core::ManagerStatus;

use super::{SimController, TransitionPrinter, wait_for_status};
use crate::cli::UpArgs;
use crate::error::CliError;
use crate::output::Printer;

pub async fn handle(
    args: UpArgs,
    controller: &SimController,
    printer: Printer,
) -> Result<(), CliError> {
    let transitions = TransitionPrinter::spawn(controller, printer);
    let result = run(args, controller, printer).await;
    transitions.finish(controller).await;
    result
}

async fn run(args: UpArgs, controller: &SimController, printer: Printer) -> Result<(), CliError> {
    let timeout = controller.config().restart_timeout;

    let handle = controller.start_tunnel().await?;
    printer.started(&handle);
    controller.start_vpn().await?;

    let reached = wait_for_status(controller.status_watch(), timeout, |s| {
        matches!(s, ManagerStatus::Connected | ManagerStatus::NoTunnel)
    })
    .await?;
    printer.message("up", &reached.to_string());

    match args.hold {
        Some(secs) => {
            info!(secs, "holding the tunnel up");
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => printer.message("signal", "interrupted"),
            }
        }
        None => {
            printer.message("hold", "press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    controller.stop().await?;
    wait_for_status(controller.status_watch(), timeout, |s| {
        *s == ManagerStatus::Disconnected
    }).await?;
    printer.message("down", &handle.name);
    Ok(())
}
