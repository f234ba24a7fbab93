//! Command Channel
//!
//! Momentary-contact push buttons mapped to controller input lines. Each
//! [`ButtonLine`] is an independent edge-triggered flag: the first press
//! drives the line high, the first release drives it low, and repeats in
//! either direction are ignored.
//!
//! Pointer and touch signals coalesce onto the same edges. Leaving the
//! control's bounds (pointer-leave, touch-cancel) counts as a release, so a
//! control cannot be left high because the finger slid off it.
//!
//! Delivery goes through [`dispatch_best_effort`]: spawned, never retried,
//! failures logged. The next telemetry snapshot is the state of record.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::{AuthError, ConsoleError};
use crate::gateway::{FaultKind, Gateway};
use crate::session::BearerToken;

/// Control id of the hall "up" button
pub const UP_CONTROL: &str = "up";

/// Control id of the hall "down" button
pub const DOWN_CONTROL: &str = "down";

/// Input device that raised a signal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modality {
    /// Mouse or pen
    Pointer,
    /// Touchscreen
    Touch,
}

/// Raw input signal on one control
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSignal {
    /// pointer-down / touch-start
    Press(Modality),
    /// pointer-up / touch-end over the control
    Release(Modality),
    /// pointer-leave / touch-cancel
    Leave(Modality),
}

impl InputSignal {
    /// Whether this signal is a press edge
    pub fn is_press(self) -> bool {
        matches!(self, Self::Press(_))
    }

    /// Device that raised the signal
    pub fn modality(self) -> Modality {
        match self {
            Self::Press(m) | Self::Release(m) | Self::Leave(m) => m,
        }
    }
}

/// One physical momentary control
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonLine {
    /// Control id, e.g. "up"
    pub id: String,
    /// Controller tag the control drives, e.g. "bp1"
    pub tag_name: String,
    /// Whether the control is logically held
    pub pressed: bool,
}

impl ButtonLine {
    /// Released control bound to `tag_name`
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            pressed: false,
        }
    }
}

/// A single "set line" command produced by an edge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineCommand {
    /// Originating control id
    pub control: String,
    /// Controller tag to drive
    pub tag: String,
    /// Target level
    pub value: bool,
}

/// Edge-triggered state for all controls
#[derive(Clone, Debug)]
pub struct CommandChannel {
    lines: Vec<ButtonLine>,
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new([
            ButtonLine::new(UP_CONTROL, "bp1"),
            ButtonLine::new(DOWN_CONTROL, "bp2"),
        ])
    }
}

impl CommandChannel {
    /// Channel over the given controls
    pub fn new(lines: impl IntoIterator<Item = ButtonLine>) -> Self {
        Self {
            lines: lines.into_iter().collect(),
        }
    }

    /// Look up a control
    pub fn line(&self, id: &str) -> Option<&ButtonLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    /// All controls
    pub fn lines(&self) -> &[ButtonLine] {
        &self.lines
    }

    /// Route a raw signal to the matching edge
    pub fn on_signal(&mut self, id: &str, signal: InputSignal) -> Option<LineCommand> {
        if signal.is_press() {
            self.on_press(id)
        } else {
            self.on_release(id)
        }
    }

    /// Press edge; `None` if unknown or already held
    pub fn on_press(&mut self, id: &str) -> Option<LineCommand> {
        self.transition(id, true)
    }

    /// Release edge; `None` if unknown or not held
    pub fn on_release(&mut self, id: &str) -> Option<LineCommand> {
        self.transition(id, false)
    }

    /// Global release: every held control goes low
    pub fn release_all(&mut self) -> Vec<LineCommand> {
        self.lines
            .iter_mut()
            .filter(|l| l.pressed)
            .map(|line| {
                line.pressed = false;
                LineCommand {
                    control: line.id.clone(),
                    tag: line.tag_name.clone(),
                    value: false,
                }
            })
            .collect()
    }

    fn transition(&mut self, id: &str, pressed: bool) -> Option<LineCommand> {
        let Some(line) = self.lines.iter_mut().find(|l| l.id == id) else {
            tracing::debug!(control = id, "Signal for unknown control ignored");
            return None;
        };
        if line.pressed == pressed {
            return None;
        }
        line.pressed = pressed;
        Some(LineCommand {
            control: line.id.clone(),
            tag: line.tag_name.clone(),
            value: pressed,
        })
    }
}

// =============================================================================
// Best-Effort Dispatch
// =============================================================================

/// A fire-and-forget gateway action
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Drive an input line
    Line(LineCommand),
    /// Inject a simulator fault
    Fault(FaultKind),
}

/// Send `action` without waiting for the outcome
///
/// Failures are logged at `warn` and dropped. If the gateway refuses the
/// token, `on_rejected` is called so the owner can end the session.
pub fn dispatch_best_effort<F>(
    gateway: Arc<dyn Gateway>,
    token: BearerToken,
    action: Dispatch,
    on_rejected: F,
) -> JoinHandle<()>
where
    F: FnOnce(AuthError) + Send + 'static,
{
    tokio::spawn(async move {
        let result = match &action {
            Dispatch::Line(cmd) => gateway.set_line(&token, &cmd.tag, cmd.value).await,
            Dispatch::Fault(kind) => gateway.inject_fault(&token, *kind).await,
        };

        match result {
            Ok(()) => {
                tracing::debug!(target: "hmi_core::dispatch", ?action, "Dispatched");
            }
            Err(ConsoleError::Auth(reason)) => {
                tracing::warn!(target: "hmi_core::dispatch", ?action, %reason, "Dispatch refused");
                on_rejected(reason);
            }
            Err(e) => {
                tracing::warn!(target: "hmi_core::dispatch", ?action, error = %e, "Dispatch failed");
            }
        }
    })
}
