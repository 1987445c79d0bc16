// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Short-lived AWS credentials from the Cognito identity pool.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::protocol::ApiClient;

const TARGET: &str = "AWSCognitoIdentityService.GetCredentialsForIdentity";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Seconds before expiry at which cached credentials are renewed.
const RENEW_BEFORE_SECS: i64 = 300;

/// Temporary AWS credentials used to sign the real-time connection.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_key: SecretString,
    /// Session token, appended to the presigned URL.
    pub session_token: Option<SecretString>,
    /// When the credentials stop being valid.
    pub expiration: Option<DateTime<Utc>>,
}

impl AwsCredentials {
    /// Returns `true` if the credentials are known to stay valid past `now`
    /// plus the renewal margin.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration
            .is_some_and(|expiration| expiration - TimeDelta::seconds(RENEW_BEFORE_SECS) > now)
    }
}

/// Source of AWS credentials for the real-time connection.
///
/// The transport asks for credentials on every (re)connect, so an
/// implementation must not cache them beyond their expiration.
pub trait CredentialsProvider: Send + Sync + 'static {
    /// Returns credentials valid for at least the next connection attempt.
    fn credentials(&self) -> impl Future<Output = Result<AwsCredentials, ProtocolError>> + Send;
}

/// Exchanges the account's identity token for AWS credentials.
///
/// The identity token is read from the client's token store at call time, so
/// a token refreshed by the REST layer is picked up on the next reconnect.
/// Credentials are reused until five minutes before their expiration;
/// credentials without an expiration are never reused. Clones share the cache.
#[derive(Debug, Clone)]
pub struct CognitoCredentialsProvider {
    api: ApiClient,
    endpoint: String,
    identity_id: String,
    issuer: String,
    cached: Arc<Mutex<Option<AwsCredentials>>>,
}

impl CognitoCredentialsProvider {
    /// Creates a provider for the given identity.
    ///
    /// # Arguments
    ///
    /// * `api` - client holding the identity token
    /// * `endpoint` - Cognito identity service URL
    /// * `identity_id` - the user's legacy id
    /// * `issuer` - identity-pool issuer (the access token's `iss` claim without scheme)
    #[must_use]
    pub fn new(
        api: ApiClient,
        endpoint: impl Into<String>,
        identity_id: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            api,
            endpoint: endpoint.into(),
            identity_id: identity_id.into(),
            issuer: issuer.into(),
            cached: Arc::new(Mutex::new(None)),
        }
    }

    async fn cached_or_fetch(&self) -> Result<AwsCredentials, ProtocolError> {
        let cached = self.cached.lock().clone();
        if let Some(credentials) = cached.filter(|c| c.is_fresh_at(Utc::now())) {
            tracing::trace!("Reusing cached AWS credentials");
            return Ok(credentials);
        }

        let credentials = self.fetch().await?;
        *self.cached.lock() = Some(credentials.clone());
        Ok(credentials)
    }

    async fn fetch(&self) -> Result<AwsCredentials, ProtocolError> {
        let identity_token = self
            .api
            .ensure_identity_token()
            .await
            .map_err(|e| ProtocolError::Credentials(e.to_string()))?;

        let body = GetCredentialsRequest {
            identity_id: &self.identity_id,
            logins: HashMap::from([(self.issuer.as_str(), identity_token.expose_secret())]),
        };

        tracing::debug!(endpoint = %self.endpoint, "Requesting AWS credentials");
        let response = self
            .api
            .http_client()
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", TARGET)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProtocolError::Credentials(format!(
                "identity pool returned HTTP {}: {message}",
                status.as_u16()
            )));
        }

        let response: GetCredentialsResponse = response.json().await?;
        Ok(response.credentials.into())
    }
}

impl CredentialsProvider for CognitoCredentialsProvider {
    fn credentials(&self) -> impl Future<Output = Result<AwsCredentials, ProtocolError>> + Send {
        self.cached_or_fetch()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsRequest<'a> {
    identity_id: &'a str,
    logins: HashMap<&'a str, &'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    credentials: CognitoCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CognitoCredentials {
    access_key_id: String,
    secret_key: String,
    #[serde(default)]
    session_token: Option<String>,
    /// Seconds since the epoch.
    #[serde(default)]
    expiration: Option<f64>,
}

impl From<CognitoCredentials> for AwsCredentials {
    fn from(creds: CognitoCredentials) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let expiration = creds
            .expiration
            .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0) as i64));
        Self {
            access_key_id: creds.access_key_id,
            secret_key: SecretString::from(creds.secret_key),
            session_token: creds.session_token.map(SecretString::from),
            expiration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_shape() {
        let body = GetCredentialsRequest {
            identity_id: "us-east-2:legacy",
            logins: HashMap::from([("cognito-idp.us-east-2.amazonaws.com/pool", "id-token")]),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "IdentityId": "us-east-2:legacy",
                "Logins": { "cognito-idp.us-east-2.amazonaws.com/pool": "id-token" }
            })
        );
    }

    fn credentials(expiration: Option<DateTime<Utc>>) -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKID".to_string(),
            secret_key: SecretString::from("secret"),
            session_token: None,
            expiration,
        }
    }

    #[test]
    fn freshness_keeps_a_margin() {
        let now = Utc::now();
        assert!(credentials(Some(now + TimeDelta::hours(1))).is_fresh_at(now));
        assert!(!credentials(Some(now + TimeDelta::minutes(4))).is_fresh_at(now));
        assert!(!credentials(Some(now - TimeDelta::minutes(1))).is_fresh_at(now));
        assert!(!credentials(None).is_fresh_at(now));
    }

    #[test]
    fn parse_credentials_response() {
        let response: GetCredentialsResponse = serde_json::from_value(json!({
            "IdentityId": "us-east-2:legacy",
            "Credentials": {
                "AccessKeyId": "AKIDEXAMPLE",
                "SecretKey": "secret",
                "SessionToken": "session",
                "Expiration": 1_700_000_000.5
            }
        }))
        .unwrap();

        let creds: AwsCredentials = response.credentials.into();
        assert_eq!(creds.access_key_id, "AKIDEXAMPLE");
        assert_eq!(creds.secret_key.expose_secret(), "secret");
        assert_eq!(creds.session_token.unwrap().expose_secret(), "session");
        assert_eq!(
            creds.expiration.unwrap().timestamp_millis(),
            1_700_000_000_500
        );
    }
}
