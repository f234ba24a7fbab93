//! Operator Events
//!
//! Events sent from an operator surface to the [`Console`](crate::console::Console).
//! Surfaces report what the operator did; the console decides what it means.
//! A surface never talks to the gateway or the telemetry stream itself.

use std::fmt;

use crate::command::InputSignal;
use crate::gateway::FaultKind;

/// Login credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Password, sent once to the token endpoint and not retained
    pub password: String,
}

impl Credentials {
    /// Bundle a username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Events from an operator surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperatorEvent {
    // ============================================
    // Session
    // ============================================
    /// Submit the login form
    Login(Credentials),

    /// Leave the session and forget the token
    Logout,

    // ============================================
    // Controls
    // ============================================
    /// Raw input signal on one push-button
    Input {
        /// Control id ("up", "down")
        control: String,
        /// What the input device did
        signal: InputSignal,
    },

    /// Pointer released anywhere on the surface
    GlobalRelease,

    /// Admin fault-injection panel
    InjectFault(FaultKind),

    /// Open the alarm history view
    OpenAlarmLog,

    /// Close the console (token is kept for the next start)
    Quit,
}
