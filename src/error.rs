// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `SmartWater` library.
//!
//! The hierarchy separates the two failure classes of the vendor REST API
//! (authentication vs. communication), the real-time transport, response
//! parsing, and the outcome of a coordinator update cycle.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A REST call to the vendor API failed.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The real-time transport failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A coordinator update cycle failed.
    #[error("update error: {0}")]
    Update(#[from] UpdateError),

    /// The entry could not be set up yet; the host should retry later.
    #[error("entry not ready: {0}")]
    NotReady(String),

    /// No coordinator is registered for the given device.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A host-facing service call failed.
    #[error("service call failed: {0}")]
    Service(String),
}

/// Errors returned by the vendor REST API layer.
///
/// Only [`ApiError::Authentication`] triggers the refresh-and-retry path;
/// every other variant belongs to the communication class.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server rejected the credentials (HTTP 401/403) or the token refresh.
    #[error("invalid credentials: {0}")]
    Authentication(String),

    /// The request did not complete within the configured timeout.
    #[error("timeout error fetching information from {url}")]
    Timeout {
        /// The requested URL.
        url: String,
    },

    /// Network failure or non-success HTTP status.
    #[error("error fetching information from {url}: {message}")]
    Communication {
        /// The requested URL.
        url: String,
        /// HTTP status code, if a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// The response body was not the expected JSON document.
    #[error("unexpected response from {url}: {message}")]
    InvalidResponse {
        /// The requested URL.
        url: String,
        /// Description of the decoding failure.
        message: String,
    },
}

impl ApiError {
    /// Returns `true` for authentication failures.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Returns `true` for every failure that is not an authentication failure.
    #[must_use]
    pub fn is_communication(&self) -> bool {
        !self.is_authentication()
    }

    /// Returns the HTTP status attached to the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Communication { status, .. } => *status,
            _ => None,
        }
    }
}

/// Errors related to the real-time MQTT transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP client construction or a credentials request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT request could not be queued.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Transport credentials could not be obtained.
    #[error("credentials error: {0}")]
    Credentials(String),
}

/// Errors related to parsing payloads and tokens.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing.
    #[error("missing field: {0}")]
    MissingField(String),

    /// Unexpected payload format.
    #[error("unexpected format: {0}")]
    UnexpectedFormat(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// Outcome of a failed coordinator update cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Credentials were rejected even after a token refresh; the host must
    /// ask the user to authenticate again.
    #[error("re-authentication required: {0}")]
    ReauthRequired(#[source] ApiError),

    /// The update failed transiently; the next scheduled poll retries.
    #[error("update failed: {0}")]
    UpdateFailed(#[source] ApiError),
}

impl UpdateError {
    /// Classifies a client error into the coordinator's failure signals.
    #[must_use]
    pub fn from_api(err: ApiError) -> Self {
        if err.is_authentication() {
            Self::ReauthRequired(err)
        } else {
            Self::UpdateFailed(err)
        }
    }

    /// Returns `true` if the host has to re-authenticate.
    #[must_use]
    pub fn is_reauth_required(&self) -> bool {
        matches!(self, Self::ReauthRequired(_))
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_classification() {
        let auth = ApiError::Authentication("Invalid credentials".to_string());
        assert!(auth.is_authentication());
        assert!(!auth.is_communication());

        let timeout = ApiError::Timeout {
            url: "https://example.test".to_string(),
        };
        assert!(timeout.is_communication());
        assert_eq!(timeout.status(), None);
    }

    #[test]
    fn communication_error_display() {
        let err = ApiError::Communication {
            url: "https://example.test/devices".to_string(),
            status: Some(500),
            message: "HTTP 500 Internal Server Error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "error fetching information from https://example.test/devices: HTTP 500 Internal Server Error"
        );
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn update_error_from_api() {
        let reauth = UpdateError::from_api(ApiError::Authentication("nope".to_string()));
        assert!(reauth.is_reauth_required());

        let failed = UpdateError::from_api(ApiError::Timeout {
            url: "u".to_string(),
        });
        assert!(matches!(failed, UpdateError::UpdateFailed(_)));
    }

    #[test]
    fn error_from_api_error() {
        let err: Error = ApiError::Authentication("x".to_string()).into();
        assert!(matches!(err, Error::Api(ApiError::Authentication(_))));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::MissingField("iss".to_string());
        assert_eq!(err.to_string(), "missing field: iss");
    }
}
