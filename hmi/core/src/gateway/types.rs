//! Gateway Wire Types
//!
//! Request and response bodies for the HTTP gateway.

use serde::{Deserialize, Serialize};

/// Fallback login error when the gateway body carries no usable detail
pub const ACCESS_DENIED: &str = "access denied";

/// Role name that unlocks the fault-injection panel
pub const ADMIN_ROLE: &str = "admin";

/// Successful `POST /auth/token` body
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Opaque bearer token
    pub access_token: String,
}

/// Profile returned by `GET /auth/users/me`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Account name
    #[serde(default)]
    pub username: String,
    /// Role used for UI gating
    #[serde(default)]
    pub role: String,
}

impl UserProfile {
    /// Whether this profile may use admin-only controls
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// One entry of `GET /alarms/alarms/active`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveAlarm {
    /// Alarm code, e.g. `ERR_INTERLOCK`
    pub code: String,
    /// Operator-facing message
    pub message: String,
    /// Severity as reported by the alarm service
    #[serde(default)]
    pub severity: Option<String>,
    /// When the alarm was raised (ISO-8601, server local time)
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One entry of `GET /alarms/alarms/history`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRecord {
    /// When the alarm was raised
    pub timestamp: String,
    /// Alarm code
    pub code: String,
    /// Operator-facing message
    pub message: String,
    /// Severity as reported by the alarm service
    #[serde(default)]
    pub severity: Option<String>,
}

/// Body of `GET /ai/insights`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    /// 0-100 machine health estimate
    pub health_score: i64,
    /// Free-text analysis
    pub insights: String,
    /// Mean travel time in seconds
    pub avg_travel_time: f64,
}

/// Extract the operator-facing message from an error body
///
/// The gateway re-wraps upstream failures, so the detail may be a string or an
/// object that itself carries a `detail` string. Anything else yields `None`.
pub fn extract_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Object(inner) => inner
            .get("detail")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string),
        _ => None,
    }
}
