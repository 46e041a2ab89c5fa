//! Line-oriented session: one command per stdin line, status changes
//! printed as they are published.

use std::str::FromStr;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::debug;

use tunnelctl_core::{ConnectionStatus, Intent, ManagerStatus, RestartOutcome};

use super::{SimController, TransitionPrinter, wait_for_status};
use crate::error::CliError;
use crate::output::Printer;

const HELP: &str = "\
commands:
  start              load or install the configuration and start the extension
  vpn                signal the running extension to start the VPN
  up                 start, then vpn
  stop               stop the extension (cancels a running restart)
  restart            stop and start the extension, in the background
  status             print the composite and raw status and intent
  wait <status>      block until the composite status is <status>
  probe              ask the extension whether its tunnel is started/connected
  installed          is a configuration installed?
  on-demand <on|off> save the connect-on-demand setting
  remove-on-demand   remove connect-on-demand rules
  help               this text
  quit               leave the session";

// ── Session commands ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionCommand {
    Start,
    Vpn,
    Up,
    Stop,
    Restart,
    Status,
    Wait(ManagerStatus),
    Probe,
    Installed,
    OnDemand(bool),
    RemoveOnDemand,
    Help,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let cmd = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg = words.next();
        if words.next().is_some() {
            return Err(format!("too many arguments: '{line}'"));
        }

        let parsed = match (cmd.as_str(), arg) {
            ("start", None) => Self::Start,
            ("vpn", None) => Self::Vpn,
            ("up", None) => Self::Up,
            ("stop", None) => Self::Stop,
            ("restart", None) => Self::Restart,
            ("status", None) => Self::Status,
            ("wait", Some(status)) => Self::Wait(
                status
                    .parse()
                    .map_err(|_| format!("unknown status '{status}'"))?,
            ),
            ("probe", None) => Self::Probe,
            ("installed", None) => Self::Installed,
            ("on-demand", Some("on")) => Self::OnDemand(true),
            ("on-demand", Some("off")) => Self::OnDemand(false),
            ("remove-on-demand", None) => Self::RemoveOnDemand,
            ("help" | "?", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            _ => return Err(format!("unrecognized command '{line}' (try 'help')")),
        };
        Ok(parsed)
    }
}

#[derive(Serialize)]
struct StatusReport {
    status: ManagerStatus,
    raw: ConnectionStatus,
    configuration: Option<String>,
    #[serde(flatten)]
    intent: Intent,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(controller: &SimController, printer: Printer) -> Result<(), CliError> {
    let transitions = TransitionPrinter::spawn(controller, printer);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut background = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let cmd = match line.parse::<SessionCommand>() {
            Ok(cmd) => cmd,
            Err(reason) => {
                printer.error(&CliError::Validation {
                    field: "command".into(),
                    reason,
                });
                continue;
            }
        };
        debug!(?cmd, "session command");

        if cmd == SessionCommand::Quit {
            break;
        }
        if let Err(err) = run(cmd, controller, printer, &mut background).await {
            printer.error(&err);
        }
    }

    while background.join_next().await.is_some() {}
    transitions.finish(controller).await;
    Ok(())
}

async fn run(
    cmd: SessionCommand,
    controller: &SimController,
    printer: Printer,
    background: &mut JoinSet<()>,
) -> Result<(), CliError> {
    match cmd {
        SessionCommand::Start => {
            let handle = controller.start_tunnel().await?;
            printer.started(&handle);
        }
        SessionCommand::Vpn => {
            controller.start_vpn().await?;
            printer.message("vpn", "start signalled");
        }
        SessionCommand::Up => {
            let handle = controller.start_tunnel().await?;
            printer.started(&handle);
            controller.start_vpn().await?;
            printer.message("vpn", "start signalled");
        }
        SessionCommand::Stop => {
            controller.stop().await?;
            printer.message("stop", "stop requested");
        }
        SessionCommand::Restart => {
            // Runs alongside later lines so a `stop` can cancel it.
            let controller = controller.clone();
            background.spawn(async move {
                if let Err(err) = restart(&controller, printer).await {
                    printer.error(&err);
                }
            });
        }
        SessionCommand::Status => {
            let report = StatusReport {
                status: controller.current_status(),
                raw: controller.raw_status(),
                configuration: controller.target().map(|h| h.name),
                intent: controller.intent(),
            };
            printer.record("current", &report);
        }
        SessionCommand::Wait(target) => {
            let timeout = controller.config().restart_timeout;
            wait_for_status(controller.status_watch(), timeout, |s| *s == target).await?;
            printer.message("reached", &target.to_string());
        }
        SessionCommand::Probe => {
            let started = controller.is_tunnel_started().await?;
            let connected = controller.is_tunnel_connected().await;
            printer.record(
                "probe",
                &serde_json::json!({ "started": started, "connected": connected }),
            );
        }
        SessionCommand::Installed => {
            let installed = controller.is_configuration_installed().await;
            let on_demand = controller.is_on_demand_enabled().await;
            printer.record(
                "config",
                &serde_json::json!({ "installed": installed, "on_demand": on_demand }),
            );
        }
        SessionCommand::OnDemand(enabled) => {
            let changed = controller.update_on_demand(enabled).await?;
            printer.record(
                "ondemand",
                &serde_json::json!({ "enabled": enabled, "changed": changed }),
            );
        }
        SessionCommand::RemoveOnDemand => {
            controller.remove_on_demand_rules().await?;
            printer.message("ondemand", "rules removed");
        }
        SessionCommand::Help => println!("{HELP}"),
        SessionCommand::Quit => {}
    }
    Ok(())
}

async fn restart(controller: &SimController, printer: Printer) -> Result<(), CliError> {
    let text = match controller.restart().await? {
        RestartOutcome::Restarted(handle) => format!("restarted {handle}"),
        RestartOutcome::NotRunning => "nothing running".to_owned(),
        RestartOutcome::AlreadyInProgress => "already in progress".to_owned(),
        RestartOutcome::Cancelled => "cancelled by stop".to_owned(),
    };
    printer.message("restart", &text);
    Ok(())
}
