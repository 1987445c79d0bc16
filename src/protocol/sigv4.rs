// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AWS Signature Version 4 presigning of the IoT WebSocket URL.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

use crate::error::ProtocolError;
use crate::protocol::cognito::AwsCredentials;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "iotdevicegateway";
const PATH: &str = "/mqtt";
/// Lifetime of a presigned URL, in seconds.
const EXPIRES: u32 = 86_400;

/// Builds a presigned `wss://{host}/mqtt?...` URL for the IoT data endpoint.
///
/// The session token is appended after the signature, as the IoT gateway
/// expects it outside the signed query string.
///
/// # Errors
///
/// Returns [`ProtocolError::Credentials`] if the signing key cannot be built.
pub fn presign_url(
    host: &str,
    region: &str,
    credentials: &AwsCredentials,
    now: DateTime<Utc>,
) -> Result<String, ProtocolError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();
    let scope = format!("{date_stamp}/{region}/{SERVICE}/aws4_request");

    // Keys in byte order
    let query = format!(
        "X-Amz-Algorithm={ALGORITHM}&X-Amz-Credential={}&X-Amz-Date={amz_date}&X-Amz-Expires={EXPIRES}&X-Amz-SignedHeaders=host",
        urlencoding::encode(&format!("{}/{scope}", credentials.access_key_id)),
    );

    let canonical_request = format!(
        "GET\n{PATH}\n{query}\nhost:{host}\n\nhost\n{}",
        hex_sha256(b"")
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex_sha256(canonical_request.as_bytes())
    );

    let key = signing_key(
        credentials.secret_key.expose_secret(),
        &date_stamp,
        region,
        SERVICE,
    )?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    let mut url = format!("wss://{host}{PATH}?{query}&X-Amz-Signature={signature}");
    if let Some(token) = &credentials.session_token {
        url.push_str("&X-Amz-Security-Token=");
        url.push_str(&urlencoding::encode(token.expose_secret()));
    }
    Ok(url)
}

/// Derives the SigV4 signing key for a date, region and service.
///
/// # Errors
///
/// Returns [`ProtocolError::Credentials`] if the HMAC cannot be keyed.
pub fn signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, ProtocolError> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| ProtocolError::Credentials(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
