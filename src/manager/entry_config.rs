// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration of an account entry.

use secrecy::SecretString;
use serde::Deserialize;

use crate::protocol::ApiConfig;

/// Configuration of one account: its token pair and the API settings.
///
/// The tokens deserialize from the stored entry data; the API settings
/// default to the production endpoints.
///
/// # Examples
///
/// ```
/// use smartwater_lib::manager::EntryConfig;
/// use smartwater_lib::protocol::ApiConfig;
/// use std::time::Duration;
///
/// let config: EntryConfig = serde_json::from_str(
///     r#"{"access_token": "eyJ...", "refresh_token": "r-123"}"#,
/// )
/// .unwrap();
///
/// let config = config.with_api(ApiConfig::new().with_poll_interval(Duration::from_secs(30)));
/// assert_eq!(config.api().poll_interval(), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct EntryConfig {
    access_token: SecretString,
    refresh_token: SecretString,
    #[serde(skip)]
    api: ApiConfig,
}

impl EntryConfig {
    /// Creates a configuration with the production API settings.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            api: ApiConfig::new(),
        }
    }

    /// Sets the API settings.
    #[must_use]
    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    /// Returns the API settings.
    #[must_use]
    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Replaces the token pair, keeping the API settings.
    pub(crate) fn set_tokens(&mut self, access_token: SecretString, refresh_token: SecretString) {
        self.access_token = access_token;
        self.refresh_token = refresh_token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    #[test]
    fn deserialize_tokens_with_default_api() {
        let config: EntryConfig = serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
            "unrelated": true
        }))
        .unwrap();

        assert_eq!(config.access_token().expose_secret(), "a");
        assert_eq!(config.refresh_token().expose_secret(), "r");
        assert_eq!(config.api().poll_interval(), ApiConfig::DEFAULT_POLL_INTERVAL);
        assert!(config.api().shadow().is_some());
    }

    #[test]
    fn missing_token_is_rejected() {
        let result: Result<EntryConfig, _> =
            serde_json::from_value(serde_json::json!({ "access_token": "a" }));
        assert!(result.is_err());
    }

    #[test]
    fn clone_keeps_everything() {
        let config = EntryConfig::new("a", "r")
            .with_api(ApiConfig::new().with_timeout(Duration::from_secs(3)));
        let copy = config.clone();
        assert_eq!(copy.access_token().expose_secret(), "a");
        assert_eq!(copy.refresh_token().expose_secret(), "r");
        assert_eq!(copy.api().timeout(), Duration::from_secs(3));
    }

    #[test]
    fn debug_hides_tokens() {
        let rendered = format!("{:?}", EntryConfig::new("top-secret", "also-secret"));
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("also-secret"));
    }
}
