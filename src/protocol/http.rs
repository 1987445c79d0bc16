// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! REST client for the vendor cloud API.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::TokenStore;
use crate::error::{ApiError, ProtocolError};
use crate::protocol::endpoints;
use crate::protocol::shadow::ShadowConfig;
use crate::types::{
    AppShadowBody, AppShadowRequest, AuthResponse, Device, DevicesResponse, ManualRunRequest,
    ManualRunZone, RefreshRequest, SchedulesResponse, User, ZoneEnableRequest,
};

const CONTENT_TYPE: &str = "application/json;charset=UTF-8";

// ============================================================================
// ApiConfig - endpoints and timings of the cloud API
// ============================================================================

/// Configuration of the cloud API client.
///
/// The defaults target the production cloud. Tests and proxies can point
/// every REST endpoint at another origin with [`ApiConfig::rebased`].
///
/// # Examples
///
/// ```
/// use smartwater_lib::protocol::ApiConfig;
/// use std::time::Duration;
///
/// let config = ApiConfig::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_poll_interval(Duration::from_secs(30))
///     .without_shadow();
///
/// assert_eq!(config.timeout(), Duration::from_secs(5));
/// assert!(config.shadow().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    base_url: String,
    user_url: String,
    lambda_url: String,
    oauth_url: String,
    client_id: String,
    user_agent: String,
    timeout: Duration,
    poll_interval: Duration,
    shadow: Option<ShadowConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default interval between two polls of a device.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

    /// Creates a configuration for the production cloud with real-time
    /// updates enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: endpoints::API_BASE_URL.to_string(),
            user_url: endpoints::USER_URL.to_string(),
            lambda_url: endpoints::LAMBDA_URL.to_string(),
            oauth_url: endpoints::OAUTH_URL.to_string(),
            client_id: endpoints::OAUTH_CLIENT_ID.to_string(),
            user_agent: endpoints::USER_AGENT.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            shadow: Some(ShadowConfig::new()),
        }
    }

    /// Points every REST endpoint (and the Cognito endpoint, if real-time is
    /// enabled) at `origin`.
    ///
    /// The paths become `/v3`, `/users/me`, `/invoker`, `/oauth2/token` and `/`.
    #[must_use]
    pub fn rebased(mut self, origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        self.base_url = format!("{origin}/v3");
        self.user_url = format!("{origin}/users/me");
        self.lambda_url = format!("{origin}/invoker");
        self.oauth_url = format!("{origin}/oauth2/token");
        self.shadow = self
            .shadow
            .map(|shadow| shadow.with_cognito_url(format!("{origin}/")));
        self
    }

    /// Sets the base URL of the device API.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the user profile URL.
    #[must_use]
    pub fn with_user_url(mut self, url: impl Into<String>) -> Self {
        self.user_url = url.into();
        self
    }

    /// Sets the lambda invoker URL.
    #[must_use]
    pub fn with_lambda_url(mut self, url: impl Into<String>) -> Self {
        self.lambda_url = url.into();
        self
    }

    /// Sets the OAuth token URL.
    #[must_use]
    pub fn with_oauth_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_url = url.into();
        self
    }

    /// Sets the OAuth client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets the user agent of unauthenticated calls.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the polling interval of the device coordinators.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enables real-time updates with the given configuration.
    #[must_use]
    pub fn with_shadow(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = Some(shadow);
        self
    }

    /// Disables real-time updates; devices are only polled.
    #[must_use]
    pub fn without_shadow(mut self) -> Self {
        self.shadow = None;
        self
    }

    /// Returns the base URL of the device API.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the user profile URL.
    #[must_use]
    pub fn user_url(&self) -> &str {
        &self.user_url
    }

    /// Returns the lambda invoker URL.
    #[must_use]
    pub fn lambda_url(&self) -> &str {
        &self.lambda_url
    }

    /// Returns the OAuth token URL.
    #[must_use]
    pub fn oauth_url(&self) -> &str {
        &self.oauth_url
    }

    /// Returns the OAuth client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the user agent.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the real-time configuration, `None` if disabled.
    #[must_use]
    pub fn shadow(&self) -> Option<&ShadowConfig> {
        self.shadow.as_ref()
    }

    /// Creates an [`ApiClient`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(
        self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<ApiClient, ProtocolError> {
        ApiClient::new(self, TokenStore::new(access_token, refresh_token))
    }
}

// ============================================================================
// ApiClient - authenticated calls with one refresh-and-retry
// ============================================================================

/// Client of the vendor cloud API.
///
/// Every authenticated call goes through the same wrapper: on an
/// authentication failure (401/403) the tokens are refreshed once and the call
/// is repeated; a second authentication failure is returned unchanged. Other
/// failures are never retried.
///
/// `ApiClient` is cheaply cloneable; clones share the token store.
///
/// # Examples
///
/// ```no_run
/// use smartwater_lib::protocol::ApiConfig;
///
/// # async fn example() -> smartwater_lib::Result<()> {
/// let client = ApiConfig::new().into_client("access-token", "refresh-token")?;
/// for device in client.get_devices().await?.devices {
///     println!("{} ({})", device.duid, device.nickname.unwrap_or_default());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: Client,
    config: ApiConfig,
    tokens: TokenStore,
    // One token exchange at a time; a rotated refresh token is single use.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl ApiClient {
    /// Creates a client using the given configuration and tokens.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: ApiConfig, tokens: TokenStore) -> Result<Self, ProtocolError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                config,
                tokens,
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Returns the configuration of this client.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Returns the token store of this client.
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.inner.http
    }

    /// Exchanges the refresh token for a new token set.
    ///
    /// Concurrent refreshes of one client run one after the other.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authentication`] if the refresh token is rejected,
    /// or a communication error if the call fails.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let _exclusive = self.inner.refresh_lock.lock().await;
        self.exchange_refresh_token().await
    }

    /// Refreshes unless another task already refreshed since `seen`.
    ///
    /// Callers that were rejected concurrently share a single token exchange.
    async fn refresh_since(&self, seen: u64) -> Result<(), ApiError> {
        let _exclusive = self.inner.refresh_lock.lock().await;
        if self.inner.tokens.generation() != seen {
            tracing::debug!("Token already refreshed by a concurrent request");
            return Ok(());
        }
        self.exchange_refresh_token().await
    }

    async fn exchange_refresh_token(&self) -> Result<(), ApiError> {
        let url = self.inner.config.oauth_url.as_str();
        let refresh_token = self.inner.tokens.refresh_token();
        let body = RefreshRequest {
            client_id: &self.inner.config.client_id,
            refresh_token: refresh_token.expose_secret(),
            grant_type: "refresh_token",
        };

        tracing::debug!(url = %url, "Refreshing access token");
        let value = self
            .send(Method::POST, url, &[], Some(&body), false)
            .await?;
        let response: AuthResponse = decode(url, value)?;
        self.inner.tokens.apply(&response.token, Utc::now());
        tracing::debug!(
            expires_in = response.token.expires_in,
            rotated = response.token.refresh_token.is_some(),
            "Access token refreshed"
        );
        Ok(())
    }

    /// Returns the identity token, refreshing once if none was obtained yet.
    ///
    /// # Errors
    ///
    /// Returns the refresh error, or [`ApiError::InvalidResponse`] if the
    /// refresh did not provide an identity token.
    pub async fn ensure_identity_token(&self) -> Result<SecretString, ApiError> {
        let seen = self.inner.tokens.generation();
        if let Some(token) = self.inner.tokens.identity_token() {
            return Ok(token);
        }
        self.refresh_since(seen).await?;
        self.inner
            .tokens
            .identity_token()
            .ok_or_else(|| ApiError::InvalidResponse {
                url: self.inner.config.oauth_url.clone(),
                message: "token response carried no id_token".to_string(),
            })
    }

    /// Lists the devices registered to the account.
    ///
    /// # Errors
    ///
    /// Returns error if the call fails after the refresh-and-retry.
    pub async fn get_devices(&self) -> Result<DevicesResponse, ApiError> {
        let url = format!("{}/devices", self.inner.config.base_url);
        let value = self.get(&url, &[]).await?;
        decode(&url, value)
    }

    /// Fetches one device, including its add-ons.
    ///
    /// # Errors
    ///
    /// Returns error if the call fails after the refresh-and-retry.
    pub async fn get_device(&self, duid: &str) -> Result<Device, ApiError> {
        let url = self.device_url(duid);
        let value = self.get(&url, &[("expand", "addons")]).await?;
        decode(&url, value)
    }

    /// Fetches the schedules of one device.
    ///
    /// # Errors
    ///
    /// Returns error if the call fails after the refresh-and-retry.
    pub async fn get_schedules(&self, duid: &str) -> Result<SchedulesResponse, ApiError> {
        let url = format!("{}/irrigation/schedules", self.inner.config.base_url);
        let value = self
            .get(&url, &[("duid", duid), ("type", "scheduled")])
            .await?;
        decode(&url, value)
    }

    /// Starts a manual watering run.
    ///
    /// # Errors
    ///
    /// Returns error if the call fails after the refresh-and-retry.
    pub async fn manual_run(
        &self,
        duid: &str,
        name: &str,
        zones: &[ManualRunZone],
    ) -> Result<Value, ApiError> {
        let url = format!("{}/irrigation/manual", self.inner.config.base_url);
        let body = ManualRunRequest {
            duid,
            ttl: 0,
            zones,
            name,
        };
        self.request_with_refresh(Method::POST, &url, &[], Some(&body))
            .await
    }

    /// Enables or disables a zone.
    ///
    /// # Errors
    ///
    /// Returns error if the call fails after the refresh-and-retry.
    pub async fn set_zone_enabled(
        &self,
        duid: &str,
        zone_id: &str,
        enabled: bool,
    ) -> Result<Value, ApiError> {
        let url = self.zone_url(duid, zone_id);
        let body = ZoneEnableRequest { enabled };
        self.request_with_refresh(Method::POST, &url, &[], Some(&body))
            .await
    }

    /// Fetches the account's alerts.
    ///
    /// # Errors
    ///
    /// Returns error if the call fails after the refresh-and-retry.
    pub async fn get_alerts(&self) -> Result<Value, ApiError> {
        let url = format!("{}/events/alerts", self.inner.config.base_url);
        self.get(&url, &[]).await
    }

    /// Fetches the app shadow of a device through the lambda invoker.
    ///
    /// # Errors
    ///
    /// Returns error if the call fails after the refresh-and-retry.
    pub async fn get_app_shadow(&self, client_id: &str) -> Result<Value, ApiError> {
        let body = AppShadowRequest {
            escape: false,
            parse: false,
            function: endpoints::APP_SHADOW_FUNCTION,
            body: AppShadowBody {
                shadow: false,
                locale: endpoints::LOCALE,
                client_id,
            },
        };
        self.request_with_refresh(Method::POST, &self.inner.config.lambda_url, &[], Some(&body))
            .await
    }

    /// Fetches the authenticated user's profile.
    ///
    /// # Errors
    ///
    /// Returns error if the call fails after the refresh-and-retry.
    pub async fn get_user(&self) -> Result<User, ApiError> {
        let url = self.inner.config.user_url.as_str();
        let value = self.get(url, &[]).await?;
        decode(url, value)
    }

    fn device_url(&self, duid: &str) -> String {
        format!(
            "{}/device/{}",
            self.inner.config.base_url,
            urlencoding::encode(duid)
        )
    }

    fn zone_url(&self, duid: &str, zone_id: &str) -> String {
        format!(
            "{}/zone/{}",
            self.device_url(duid),
            urlencoding::encode(&format!("{duid}_{zone_id}"))
        )
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.request_with_refresh::<()>(Method::GET, url, query, None)
            .await
    }

    /// Performs an authenticated call, refreshing the tokens and retrying once
    /// on an authentication failure.
    async fn request_with_refresh<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        let seen = self.inner.tokens.generation();
        match self.send(method.clone(), url, query, body, true).await {
            Err(err) if err.is_authentication() => {
                tracing::debug!(url = %url, error = %err, "Request rejected, refreshing token");
                self.refresh_since(seen).await?;
                self.send(method, url, query, body, true).await
            }
            result => result,
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        authenticated: bool,
    ) -> Result<Value, ApiError> {
        tracing::debug!(method = %method, url = %url, "Sending API request");

        let mut request = self
            .inner
            .http
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE);
        if !query.is_empty() {
            request = request.query(query);
        }
        if authenticated {
            request = request.bearer_auth(self.inner.tokens.access_token().expose_secret());
        } else {
            request = request.header(reqwest::header::USER_AGENT, &self.inner.config.user_agent);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Authentication(format!(
                "HTTP {} from {url}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(ApiError::Communication {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, &e))?;

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            len = bytes.len(),
            "Received API response"
        );

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::InvalidResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("shadow", &self.inner.config.shadow.is_some())
            .finish_non_exhaustive()
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout {
            url: url.to_string(),
        }
    } else {
        ApiError::Communication {
            url: url.to_string(),
            status: None,
            message: err.to_string(),
        }
    }
}

fn decode<T: DeserializeOwned>(url: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let config = ApiConfig::new();
        assert_eq!(config.base_url(), "https://api.prod.iot.moen.com/v3");
        assert_eq!(config.client_id(), "6qn9pep31dglq6ed4fvlq6rp5t");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert!(config.shadow().is_some());
    }

    #[test]
    fn config_builder_chain() {
        let config = ApiConfig::new()
            .with_base_url("http://localhost/v3")
            .with_user_url("http://localhost/me")
            .with_lambda_url("http://localhost/lambda")
            .with_oauth_url("http://localhost/token")
            .with_client_id("client")
            .with_user_agent("agent")
            .with_timeout(Duration::from_secs(2))
            .with_poll_interval(Duration::from_secs(60))
            .without_shadow();

        assert_eq!(config.base_url(), "http://localhost/v3");
        assert_eq!(config.user_url(), "http://localhost/me");
        assert_eq!(config.lambda_url(), "http://localhost/lambda");
        assert_eq!(config.oauth_url(), "http://localhost/token");
        assert_eq!(config.client_id(), "client");
        assert_eq!(config.user_agent(), "agent");
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert!(config.shadow().is_none());
    }

    #[test]
    fn config_rebased() {
        let config = ApiConfig::new().rebased("http://127.0.0.1:9000/");
        assert_eq!(config.base_url(), "http://127.0.0.1:9000/v3");
        assert_eq!(config.user_url(), "http://127.0.0.1:9000/users/me");
        assert_eq!(config.lambda_url(), "http://127.0.0.1:9000/invoker");
        assert_eq!(config.oauth_url(), "http://127.0.0.1:9000/oauth2/token");
        assert_eq!(
            config.shadow().unwrap().cognito_url(),
            "http://127.0.0.1:9000/"
        );
    }

    #[test]
    fn zone_url_joins_device_and_zone() {
        let client = ApiConfig::new()
            .with_base_url("http://localhost/v3")
            .into_client("a", "r")
            .unwrap();
        assert_eq!(client.device_url("D1"), "http://localhost/v3/device/D1");
        assert_eq!(
            client.zone_url("D1", "3"),
            "http://localhost/v3/device/D1/zone/D1_3"
        );
    }

    #[test]
    fn debug_output_hides_tokens() {
        let client = ApiConfig::new().into_client("secret-access", "secret-refresh").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
    }
}
