//! Output formatting: plain lines or one JSON object per line.
//!
//! Every line printed by a command is an *event*. Plain output is meant
//! for people (timestamped, colored on a terminal); JSON output carries
//! the same fields for scripts.

use std::io::{self, IsTerminal, Write};

use chrono::{Local, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::{Value, json};

use tunnelctl_core::{ManagerStatus, TunnelHandle};

use crate::cli::OutputFormat;

// ── Printer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    format: OutputFormat,
    color: bool,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            color: should_color(),
        }
    }

    /// A published composite status change.
    pub fn transition(&self, status: ManagerStatus) {
        let line = match self.format {
            OutputFormat::Plain => {
                let name = status.to_string();
                let name = if self.color {
                    paint_status(status, &name)
                } else {
                    name
                };
                format!(
                    "{} status  {name:<14} {}",
                    self.timestamp(),
                    status.description()
                )
            }
            OutputFormat::Json => render_event(
                "status",
                &json!({
                    "status": status,
                    "code": status.code(),
                    "description": status.description(),
                }),
            ),
        };
        print_line(&line);
    }

    /// The tunnel was started against `handle`.
    pub fn started(&self, handle: &TunnelHandle) {
        match self.format {
            OutputFormat::Plain => self.message("started", &handle.to_string()),
            OutputFormat::Json => {
                print_line(&render_event("started", &json!({ "configuration": handle })));
            }
        }
    }

    /// A structured result. Plain output prints `key=value` pairs.
    pub fn record<T: Serialize>(&self, event: &str, data: &T) {
        let value = serde_json::to_value(data).unwrap_or(Value::Null);
        let line = match self.format {
            OutputFormat::Plain => {
                format!("{} {event:<7} {}", self.timestamp(), plain_fields(&value))
            }
            OutputFormat::Json => render_event(event, &value),
        };
        print_line(&line);
    }

    /// A free-form informational line.
    pub fn message(&self, event: &str, text: &str) {
        let line = match self.format {
            OutputFormat::Plain => format!("{} {event:<7} {text}", self.timestamp()),
            OutputFormat::Json => render_event(event, &json!({ "message": text })),
        };
        print_line(&line);
    }

    /// A command failed but the session goes on.
    pub fn error(&self, err: &dyn std::error::Error) {
        let line = match self.format {
            OutputFormat::Plain => {
                let label = if self.color {
                    "error".red().bold().to_string()
                } else {
                    "error".to_owned()
                };
                format!("{} {label}   {err}", self.timestamp())
            }
            OutputFormat::Json => render_event("error", &json!({ "message": err.to_string() })),
        };
        print_line(&line);
    }

    fn timestamp(&self) -> String {
        let ts = Local::now().format("%H:%M:%S%.3f").to_string();
        if self.color {
            ts.dimmed().to_string()
        } else {
            ts
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn should_color() -> bool {
    io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err()
}

fn paint_status(status: ManagerStatus, text: &str) -> String {
    match status {
        ManagerStatus::Connected => text.green().bold().to_string(),
        ManagerStatus::Connecting | ManagerStatus::Reasserting => text.yellow().to_string(),
        ManagerStatus::Restarting => text.magenta().to_string(),
        ManagerStatus::NoTunnel => text.cyan().to_string(),
        ManagerStatus::Disconnecting => text.red().to_string(),
        ManagerStatus::Disconnected | ManagerStatus::Invalid => text.dimmed().to_string(),
    }
}

/// `{"event": .., "at": .., ...fields}` on one line.
fn render_event(event: &str, fields: &Value) -> String {
    let mut obj = serde_json::Map::new();
    obj.insert("event".into(), Value::from(event));
    obj.insert("at".into(), Value::from(Utc::now().to_rfc3339()));
    match fields {
        Value::Object(map) => obj.extend(map.clone()),
        Value::Null => {}
        other => {
            obj.insert("value".into(), other.clone());
        }
    }
    Value::Object(obj).to_string()
}

fn plain_fields(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_line(line: &str) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{line}");
    let _ = stdout.flush();
}
