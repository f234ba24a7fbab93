//! Gateway Access
//!
//! Every HTTP call the console makes goes through the [`Gateway`] trait. The
//! production implementation is [`HttpGateway`]; tests substitute a scripted
//! implementation so the session logic can be exercised without a network.
//!
//! | Operation | Endpoint | Auth |
//! |---|---|---|
//! | [`Gateway::request_token`] | `POST /auth/token` (form) | no |
//! | [`Gateway::current_user`] | `GET /auth/users/me` | yes |
//! | [`Gateway::set_line`] | `POST /plc/command/{tag}?value={bool}` | yes |
//! | [`Gateway::inject_fault`] | `POST /plc/simulate/inject-fault/{kind}` | yes |
//! | [`Gateway::active_alarms`] | `GET /alarms/alarms/active` | yes |
//! | [`Gateway::alarm_history`] | `GET /alarms/alarms/history` | yes |
//! | [`Gateway::insights`] | `GET /ai/insights` | no |

mod http;
mod types;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::BearerToken;

pub use http::HttpGateway;
pub use types::{
    extract_detail, ActiveAlarm, AlarmRecord, Insights, TokenResponse, UserProfile,
    ACCESS_DENIED, ADMIN_ROLE,
};

/// Simulator fault that an admin may inject
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    /// Freeze car motion
    Jam,
    /// Clear faults and home the car
    Reset,
}

impl FaultKind {
    /// Path segment used by the gateway
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jam => "jam",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jam" => Ok(Self::Jam),
            "reset" => Ok(Self::Reset),
            other => Err(format!("unknown fault kind: {other}")),
        }
    }
}

/// HTTP operations against the API gateway
///
/// Authenticated operations take the token explicitly; the gateway holds no
/// session state of its own. Implementations must map a 401/403 on an
/// authenticated call to [`AuthError::SessionInvalid`](crate::error::AuthError).
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Exchange credentials for a bearer token
    async fn request_token(&self, username: &str, password: &str) -> Result<BearerToken>;

    /// Confirm the token and fetch the operator profile
    async fn current_user(&self, token: &BearerToken) -> Result<UserProfile>;

    /// Drive one controller input line high or low
    async fn set_line(&self, token: &BearerToken, tag: &str, value: bool) -> Result<()>;

    /// Trigger a simulator fault
    async fn inject_fault(&self, token: &BearerToken, fault: FaultKind) -> Result<()>;

    /// Currently active alarms
    async fn active_alarms(&self, token: &BearerToken) -> Result<Vec<ActiveAlarm>>;

    /// Alarm history, newest first
    async fn alarm_history(&self, token: &BearerToken) -> Result<Vec<AlarmRecord>>;

    /// Predictive-maintenance summary (unauthenticated)
    async fn insights(&self) -> Result<Insights>;
}
