//! Console Messages
//!
//! Messages sent from the [`Console`](crate::console::Console) to an operator
//! surface. A surface renders them and holds no machine logic of its own:
//! everything it shows is the last telemetry snapshot, the poll results and
//! the transient press feedback reported here.

use std::time::Duration;

use crate::gateway::{ActiveAlarm, AlarmRecord, Insights, UserProfile};
use crate::reconciler::DisplayChange;
use crate::transport::ConnectionState;

/// Messages from the console to a surface
#[derive(Clone, Debug, PartialEq)]
pub enum ConsoleMessage {
    // ============================================
    // Session
    // ============================================
    /// Show the login form
    LoginRequired,

    /// Login was refused; show the reason inline
    LoginFailed {
        /// Operator-facing reason
        reason: String,
    },

    /// Session active; hide the login form
    SessionStarted {
        /// Validated profile
        profile: UserProfile,
        /// Whether to show the fault-injection panel
        fault_panel_visible: bool,
    },

    /// Session ended; every display update has stopped
    LoggedOut,

    // ============================================
    // Telemetry
    // ============================================
    /// Connection pill
    Connection(ConnectionState),

    /// One display element changed
    Display(DisplayChange),

    /// Duration of the last reconciliation pass
    CycleTime(Duration),

    /// Transient press feedback on a control
    ButtonFeedback {
        /// Control id
        control: String,
        /// Whether to draw the control pressed
        pressed: bool,
    },

    // ============================================
    // Periodic refresh
    // ============================================
    /// Active alarm list (empty means all clear)
    Alarms(Vec<ActiveAlarm>),

    /// Predictive-maintenance panel
    Insights(Insights),

    /// Live clock text
    Clock(String),

    /// Alarm history view contents, or why it could not be loaded
    AlarmHistory(Result<Vec<AlarmRecord>, String>),
}
