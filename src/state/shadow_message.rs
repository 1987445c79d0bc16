// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device shadow messages.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ParseError;

/// A message received on one of the device shadow topics.
///
/// `get/accepted` and `update/accepted` carry a top-level `state`;
/// `update/documents` carries `previous` and `current` documents. Either form
/// may hold a `desired` and a `reported` section.
///
/// # Examples
///
/// ```
/// use smartwater_lib::state::ShadowMessage;
///
/// let message = ShadowMessage::from_slice(
///     br#"{"state":{"reported":{"hydraOverview":{"status":"idle"}}},"version":7}"#,
/// )
/// .unwrap();
///
/// assert_eq!(message.version, Some(7));
/// assert_eq!(message.reported().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShadowMessage {
    /// Shadow state of `get/accepted` and `update/accepted` messages.
    #[serde(default)]
    pub state: Option<ShadowState>,
    /// Document before the update (`update/documents` only).
    #[serde(default)]
    pub previous: Option<ShadowDocument>,
    /// Document after the update (`update/documents` only).
    #[serde(default)]
    pub current: Option<ShadowDocument>,
    /// Shadow version.
    #[serde(default)]
    pub version: Option<u64>,
    /// Epoch seconds of the message.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A full shadow document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShadowDocument {
    #[serde(default)]
    pub state: ShadowState,
    #[serde(default)]
    pub version: Option<u64>,
}

/// The `desired` and `reported` sections of a shadow.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShadowState {
    /// State requested by the cloud.
    #[serde(default)]
    pub desired: Option<Map<String, Value>>,
    /// State reported by the controller.
    #[serde(default)]
    pub reported: Option<Map<String, Value>>,
}

impl ShadowMessage {
    /// Decodes a message payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if the payload is not a shadow message.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ParseError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Returns the `reported` sections, `current` first.
    pub fn reported(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.sections().filter_map(|state| state.reported.as_ref())
    }

    /// Returns the `desired` sections, `current` first.
    pub fn desired(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.sections().filter_map(|state| state.desired.as_ref())
    }

    fn sections(&self) -> impl Iterator<Item = &ShadowState> {
        self.current
            .as_ref()
            .map(|doc| &doc.state)
            .into_iter()
            .chain(self.state.as_ref())
    }
}
