//! Line-oriented operator surface
//!
//! Parses operator commands typed on stdin into [`OperatorEvent`]s and turns
//! [`ConsoleMessage`]s into printable lines. High-rate messages (clock, cycle
//! time) and unchanged poll results are folded into a status line instead of
//! being printed every time.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use hmi_core::{
    ActiveAlarm, ConnectionState, ConsoleMessage, Credentials, DisplayChange, FaultKind,
    InputSignal, Insights, Modality, OperatorEvent,
};

/// Help text printed by the `help` command
pub const HELP: &str = "\
commands:
  login <user> <password>      sign in
  logout                       sign out and forget the token
  press <up|down> [touch]      press a hall button
  release <up|down> [touch]    release over the button
  leave <up|down> [touch]      pointer left / touch cancelled
  release-all                  pointer released anywhere
  fault <jam|reset>            inject a simulator fault (admin)
  logs                         show alarm history
  status                       show link, clock and cycle time
  quit                         exit (token is kept)";

/// One parsed input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Forward to the console
    Event(OperatorEvent),
    /// Print the help text
    Help,
    /// Print the status line
    Status,
    /// Blank line
    Empty,
}

/// Parse one line of operator input
pub fn parse_command(line: &str) -> Result<Input> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Empty);
    };
    let args: Vec<&str> = words.collect();

    let event = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("help" | "?", _) => return Ok(Input::Help),
        ("status", []) => return Ok(Input::Status),
        ("login", [user, password]) => OperatorEvent::Login(Credentials::new(*user, *password)),
        ("logout", []) => OperatorEvent::Logout,
        ("press", [control, rest @ ..]) => input(control, InputSignal::Press(modality(rest)?)),
        ("release", [control, rest @ ..]) => {
            input(control, InputSignal::Release(modality(rest)?))
        }
        ("leave" | "cancel", [control, rest @ ..]) => {
            input(control, InputSignal::Leave(modality(rest)?))
        }
        ("release-all", []) => OperatorEvent::GlobalRelease,
        ("fault", [kind]) => OperatorEvent::InjectFault(
            kind.parse::<FaultKind>()
                .map_err(anyhow::Error::msg)
                .context("usage: fault <jam|reset>")?,
        ),
        ("logs", []) => OperatorEvent::OpenAlarmLog,
        ("quit" | "exit", []) => OperatorEvent::Quit,
        _ => bail!("unrecognised command {line:?} (try `help`)"),
    };
    Ok(Input::Event(event))
}

fn input(control: &str, signal: InputSignal) -> OperatorEvent {
    OperatorEvent::Input {
        control: control.to_ascii_lowercase(),
        signal,
    }
}

fn modality(rest: &[&str]) -> Result<Modality> {
    match rest {
        [] | ["pointer" | "mouse"] => Ok(Modality::Pointer),
        ["touch"] => Ok(Modality::Touch),
        _ => bail!("modality must be `pointer` or `touch`"),
    }
}

/// Render state for folded messages
#[derive(Debug, Default)]
pub struct Surface {
    link: ConnectionState,
    clock: Option<String>,
    cycle: Option<Duration>,
    alarms: Option<Vec<ActiveAlarm>>,
    insights: Option<Insights>,
}

impl Surface {
    /// Fresh surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Status line for the `status` command
    pub fn status(&self) -> String {
        let clock = self.clock.as_deref().unwrap_or("--:--:--");
        let cycle = self
            .cycle
            .map_or_else(|| "-".to_string(), |d| format!("{:.3} ms", d.as_secs_f64() * 1e3));
        format!("[{}] {clock}  cycle {cycle}", self.link)
    }

    /// Lines to print for one message (possibly none)
    pub fn render(&mut self, message: ConsoleMessage) -> Vec<String> {
        match message {
            ConsoleMessage::LoginRequired => {
                vec!["login required: login <user> <password>".to_string()]
            }
            ConsoleMessage::LoginFailed { reason } => vec![format!("login failed: {reason}")],
            ConsoleMessage::SessionStarted {
                profile,
                fault_panel_visible,
            } => {
                let mut lines = vec![format!(
                    "session started: {} ({})",
                    profile.username, profile.role
                )];
                if fault_panel_visible {
                    lines.push("fault panel available: fault <jam|reset>".to_string());
                }
                lines
            }
            ConsoleMessage::LoggedOut => {
                *self = Self::default();
                vec!["logged out".to_string()]
            }
            ConsoleMessage::Connection(state) => {
                self.link = state;
                vec![format!("[{state}]")]
            }
            ConsoleMessage::Display(change) => vec![render_change(change)],
            ConsoleMessage::CycleTime(elapsed) => {
                self.cycle = Some(elapsed);
                Vec::new()
            }
            ConsoleMessage::ButtonFeedback { control, pressed } => {
                let state = if pressed { "pressed" } else { "released" };
                vec![format!("button {control} {state}")]
            }
            ConsoleMessage::Clock(now) => {
                self.clock = Some(now);
                Vec::new()
            }
            ConsoleMessage::Alarms(alarms) => {
                if self.alarms.as_ref() == Some(&alarms) {
                    return Vec::new();
                }
                let lines = if alarms.is_empty() {
                    vec!["alarms: system OK".to_string()]
                } else {
                    alarms
                        .iter()
                        .map(|a| match &a.severity {
                            Some(severity) => {
                                format!("alarm [{}] {} ({severity})", a.code, a.message)
                            }
                            None => format!("alarm [{}] {}", a.code, a.message),
                        })
                        .collect()
                };
                self.alarms = Some(alarms);
                lines
            }
            ConsoleMessage::Insights(insights) => {
                if self.insights.as_ref() == Some(&insights) {
                    return Vec::new();
                }
                let line = format!(
                    "health {}  avg travel {:.1}s  {}",
                    insights.health_score, insights.avg_travel_time, insights.insights
                );
                self.insights = Some(insights);
                vec![line]
            }
            ConsoleMessage::AlarmHistory(Ok(records)) if records.is_empty() => {
                vec!["alarm history: no records".to_string()]
            }
            ConsoleMessage::AlarmHistory(Ok(records)) => records
                .iter()
                .map(|r| format!("{}  {:<16} {}", r.timestamp, r.code, r.message))
                .collect(),
            ConsoleMessage::AlarmHistory(Err(reason)) => {
                vec![format!("alarm history unavailable: {reason}")]
            }
        }
    }
}

fn render_change(change: DisplayChange) -> String {
    match change {
        DisplayChange::Position {
            offset_px,
            temperature_c,
        } => format!("car {offset_px:.0}px  motor {temperature_c:.1}°C"),
        DisplayChange::DoorOpen(open) => {
            format!("doors {}", if open { "OPEN" } else { "CLOSED" })
        }
        DisplayChange::Motor(label) => format!("motor {label}"),
        DisplayChange::Lamp { lamp, lit } => {
            format!("lamp {} {}", lamp.name(), if lit { "ON" } else { "OFF" })
        }
        DisplayChange::Tag { tag, active } => format!(
            "tag {} {}",
            tag.name(),
            if active { "ACTIVE" } else { "INACTIVE" }
        ),
    }
}
