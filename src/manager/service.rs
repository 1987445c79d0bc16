// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-facing service calls.

use serde::Deserialize;

use crate::types::lenient;

/// Name of the "start watering" service.
pub const SERVICE_NAME: &str = "start_watering";

/// Name given to manual runs started by the service.
pub const MANUAL_RUN_NAME: &str = "Manual Run";

/// Default run duration, in minutes.
pub const DEFAULT_DURATION: u32 = 5;

/// Data of a "start watering" call.
///
/// `zone_id` is the zone's client id and may be given as a number.
///
/// # Examples
///
/// ```
/// use smartwater_lib::manager::StartWatering;
///
/// let call: StartWatering =
///     serde_json::from_str(r#"{"device_id": "D1", "zone_id": 2}"#).unwrap();
///
/// assert_eq!(call.zone_id, "2");
/// assert_eq!(call.duration, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartWatering {
    /// Device unique identifier.
    pub device_id: String,
    /// Zone client id.
    #[serde(deserialize_with = "lenient::string")]
    pub zone_id: String,
    /// Run duration in minutes.
    #[serde(default = "default_duration")]
    pub duration: u32,
}

impl StartWatering {
    /// Creates a call with the default duration.
    #[must_use]
    pub fn new(device_id: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            zone_id: zone_id.into(),
            duration: DEFAULT_DURATION,
        }
    }

    /// Sets the run duration in minutes.
    #[must_use]
    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration = minutes;
        self
    }
}

fn default_duration() -> u32 {
    DEFAULT_DURATION
}
