//! reqwest-backed gateway client

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::types::{
    extract_detail, ActiveAlarm, AlarmRecord, Insights, TokenResponse, UserProfile, ACCESS_DENIED,
};
use super::{FaultKind, Gateway};
use crate::config::ConsoleConfig;
use crate::error::{AuthError, ProtocolError, Result, TransportError};
use crate::session::{attach, BearerToken};

const TOKEN_PATH: &str = "/auth/token";
const PROFILE_PATH: &str = "/auth/users/me";
const ACTIVE_ALARMS_PATH: &str = "/alarms/alarms/active";
const ALARM_HISTORY_PATH: &str = "/alarms/alarms/history";
const INSIGHTS_PATH: &str = "/ai/insights";

/// Gateway client over HTTP
#[derive(Clone, Debug)]
pub struct HttpGateway {
    base_url: String,
    http_client: Client,
}

impl HttpGateway {
    /// Create a client for the configured gateway
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &ConsoleConfig) -> std::result::Result<Self, TransportError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self {
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Gateway base address
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder, token: &BearerToken) -> RequestBuilder {
        request.header(AUTHORIZATION, attach(token))
    }

    async fn send(request: RequestBuilder, endpoint: &str, access: Access) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::debug!(endpoint, error = %e, "Gateway request failed");
            TransportError::Unreachable(e.to_string())
        })?;
        check_status(response, endpoint, access)
    }

    async fn json<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            ProtocolError::UnexpectedBody {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// How a request was sent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    /// Carried the session token
    Bearer,
    /// Sent without credentials
    Public,
}

/// Map a non-success status to the error taxonomy
///
/// 401 and 403 mean the token is no longer good only when a token was sent.
/// On a public endpoint they are plain status failures.
fn check_status(response: Response, endpoint: &str, access: Access) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if access == Access::Bearer
        && (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN)
    {
        return Err(AuthError::SessionInvalid {
            status: status.as_u16(),
        }
        .into());
    }
    Err(TransportError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
    }
    .into())
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn request_token(&self, username: &str, password: &str) -> Result<BearerToken> {
        let response = self
            .http_client
            .post(self.url(TOKEN_PATH))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .bytes()
                .await
                .ok()
                .and_then(|body| extract_detail(&body))
                .unwrap_or_else(|| ACCESS_DENIED.to_string());
            tracing::info!(status = status.as_u16(), %detail, "Login rejected");
            return Err(AuthError::Rejected { detail }.into());
        }

        let body: TokenResponse = Self::json(response, TOKEN_PATH).await?;
        Ok(BearerToken::new(body.access_token))
    }

    async fn current_user(&self, token: &BearerToken) -> Result<UserProfile> {
        let request = self.authorized(self.http_client.get(self.url(PROFILE_PATH)), token);
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        // Any non-success here is a failed validation, not only 401/403.
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::SessionInvalid {
                status: status.as_u16(),
            }
            .into());
        }
        Self::json(response, PROFILE_PATH).await
    }

    async fn set_line(&self, token: &BearerToken, tag: &str, value: bool) -> Result<()> {
        let endpoint = format!("/plc/command/{tag}");
        let request = self
            .authorized(self.http_client.post(self.url(&endpoint)), token)
            .query(&[("value", value)]);
        Self::send(request, &endpoint, Access::Bearer).await.map(|_| ())
    }

    async fn inject_fault(&self, token: &BearerToken, fault: FaultKind) -> Result<()> {
        let endpoint = format!("/plc/simulate/inject-fault/{}", fault.as_str());
        let request = self.authorized(self.http_client.post(self.url(&endpoint)), token);
        Self::send(request, &endpoint, Access::Bearer).await.map(|_| ())
    }

    async fn active_alarms(&self, token: &BearerToken) -> Result<Vec<ActiveAlarm>> {
        let request = self.authorized(self.http_client.get(self.url(ACTIVE_ALARMS_PATH)), token);
        let response = Self::send(request, ACTIVE_ALARMS_PATH, Access::Bearer).await?;
        Self::json(response, ACTIVE_ALARMS_PATH).await
    }

    async fn alarm_history(&self, token: &BearerToken) -> Result<Vec<AlarmRecord>> {
        let request = self.authorized(self.http_client.get(self.url(ALARM_HISTORY_PATH)), token);
        let response = Self::send(request, ALARM_HISTORY_PATH, Access::Bearer).await?;
        Self::json(response, ALARM_HISTORY_PATH).await
    }

    async fn insights(&self) -> Result<Insights> {
        let request = self.http_client.get(self.url(INSIGHTS_PATH));
        let response = Self::send(request, INSIGHTS_PATH, Access::Public).await?;
        Self::json(response, INSIGHTS_PATH).await
    }
}
