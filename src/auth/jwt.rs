// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unverified JWT claim decoding.
//!
//! The access token was validated by the server when it was issued; the
//! library only needs to read its issuer claim, so the signature is not
//! checked.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

use crate::error::ParseError;

/// Decodes the claims (payload segment) of a JWT.
///
/// # Errors
///
/// Returns [`ParseError`] if the token does not have three segments or the
/// payload is not a base64url-encoded JSON object.
pub fn claims(token: &str) -> Result<Map<String, Value>, ParseError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(ParseError::UnexpectedFormat(
                "token is not a JWT".to_string(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ParseError::InvalidValue {
            field: "jwt payload".to_string(),
            message: e.to_string(),
        })?;

    match serde_json::from_slice(&bytes)? {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::UnexpectedFormat(
            "JWT payload is not an object".to_string(),
        )),
    }
}

/// Returns the `iss` claim of a JWT.
///
/// # Errors
///
/// Returns [`ParseError::MissingField`] if the claim is absent.
pub fn issuer(token: &str) -> Result<String, ParseError> {
    claims(token)?
        .get("iss")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ParseError::MissingField("iss".to_string()))
}

/// Returns the issuer with its `https://` scheme stripped, the form the
/// identity pool expects as a login provider name.
///
/// # Errors
///
/// See [`issuer`].
///
/// # Examples
///
/// ```
/// use smartwater_lib::auth::jwt;
///
/// // {"iss":"https://cognito-idp.us-east-2.amazonaws.com/pool"}
/// let token = "e30.eyJpc3MiOiJodHRwczovL2NvZ25pdG8taWRwLnVzLWVhc3QtMi5hbWF6b25hd3MuY29tL3Bvb2wifQ.sig";
/// assert_eq!(
///     jwt::identity_pool_issuer(token).unwrap(),
///     "cognito-idp.us-east-2.amazonaws.com/pool"
/// );
/// ```
pub fn identity_pool_issuer(token: &str) -> Result<String, ParseError> {
    let iss = issuer(token)?;
    Ok(iss.strip_prefix("https://").unwrap_or(&iss).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn decode_issuer() {
        let token = token_with(&json!({ "iss": "https://issuer.example/pool", "sub": "u" }));
        assert_eq!(issuer(&token).unwrap(), "https://issuer.example/pool");
        assert_eq!(identity_pool_issuer(&token).unwrap(), "issuer.example/pool");
    }

    #[test]
    fn issuer_without_scheme_is_kept() {
        let token = token_with(&json!({ "iss": "issuer.example/pool" }));
        assert_eq!(identity_pool_issuer(&token).unwrap(), "issuer.example/pool");
    }

    #[test]
    fn missing_issuer() {
        let token = token_with(&json!({ "sub": "u" }));
        assert!(matches!(issuer(&token), Err(ParseError::MissingField(_))));
    }

    #[test]
    fn padded_payload_is_accepted() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let body = format!("{}==", URL_SAFE_NO_PAD.encode(br#"{"iss":"x"}"#));
        let token = format!("{header}.{body}.sig");
        assert_eq!(issuer(&token).unwrap(), "x");
    }

    #[test]
    fn reject_malformed_tokens() {
        assert!(claims("not-a-token").is_err());
        assert!(claims("a.b").is_err());
        assert!(claims("a.!!!.c").is_err());
        assert!(claims(&format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1]"))).is_err());
    }
}
