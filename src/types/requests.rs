// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request bodies and small response documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One zone entry of a manual run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualRunZone {
    /// Cloud zone identifier, `{duid}_{clientId}`.
    pub id: String,
    /// Run duration.
    pub duration: u32,
}

impl ManualRunZone {
    /// Builds the entry for zone `zone_id` of device `duid`.
    #[must_use]
    pub fn new(duid: &str, zone_id: &str, duration: u32) -> Self {
        Self {
            id: format!("{duid}_{zone_id}"),
            duration,
        }
    }
}

/// Body of `POST /irrigation/manual`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualRunRequest<'a> {
    pub duid: &'a str,
    pub ttl: u32,
    pub zones: &'a [ManualRunZone],
    pub name: &'a str,
}

/// Body of the zone enable endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneEnableRequest {
    pub enabled: bool,
}

/// Envelope of the app-shadow lambda invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppShadowRequest<'a> {
    pub escape: bool,
    pub parse: bool,
    #[serde(rename = "fn")]
    pub function: &'a str,
    pub body: AppShadowBody<'a>,
}

/// Inner body of [`AppShadowRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppShadowBody<'a> {
    pub shadow: bool,
    pub locale: &'a str,
    pub client_id: &'a str,
}

/// Body of the OAuth refresh call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshRequest<'a> {
    pub client_id: &'a str,
    pub refresh_token: &'a str,
    pub grant_type: &'a str,
}

/// Response of the OAuth refresh call.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: TokenGrant,
}

/// Tokens granted by a refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    /// New bearer token.
    pub access_token: String,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: i64,
    /// Identity token used to sign the real-time channel.
    #[serde(default)]
    pub id_token: Option<String>,
    /// Rotated refresh token, when the server issues one.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The authenticated user's profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Legacy account identifier, used as the Cognito identity id.
    #[serde(default)]
    pub legacy_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn manual_run_body_shape() {
        let zones = [ManualRunZone::new("D1", "2", 7)];
        let body = ManualRunRequest {
            duid: "D1",
            ttl: 0,
            zones: &zones,
            name: "Manual Run",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "duid": "D1",
                "ttl": 0,
                "zones": [{ "id": "D1_2", "duration": 7 }],
                "name": "Manual Run"
            })
        );
    }

    #[test]
    fn app_shadow_envelope_shape() {
        let request = AppShadowRequest {
            escape: false,
            parse: false,
            function: "smartwater-app-shadow-api-prod-get",
            body: AppShadowBody {
                shadow: false,
                locale: "en_US",
                client_id: "C1",
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "escape": false,
                "parse": false,
                "fn": "smartwater-app-shadow-api-prod-get",
                "body": { "shadow": false, "locale": "en_US", "clientId": "C1" }
            })
        );
    }

    #[test]
    fn token_grant_without_rotation() {
        let response: AuthResponse = serde_json::from_value(json!({
            "token": { "access_token": "a", "expires_in": 3600, "id_token": "i" }
        }))
        .unwrap();
        assert_eq!(response.token.access_token, "a");
        assert_eq!(response.token.id_token.as_deref(), Some("i"));
        assert!(response.token.refresh_token.is_none());
    }
}
