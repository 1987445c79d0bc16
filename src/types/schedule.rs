// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Irrigation schedule documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

/// Response of the schedules endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulesResponse {
    /// Schedules of the requested device.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub items: Vec<Schedule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Whether a schedule is currently active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    /// The schedule runs.
    Active,
    /// The schedule is paused.
    #[default]
    Inactive,
    /// A status this library does not know about.
    #[serde(other)]
    Unknown,
}

/// An irrigation schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Schedule identifier, the key of the coordinator's schedule map.
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    /// Display name.
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    /// Active or inactive.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: ScheduleStatus,
    /// Frequency (`daily`, `weekly`, `even`, ...).
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub frequency: Option<String>,
    /// Zone durations of the schedule.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub zones: Vec<Value>,
    /// Timing and other fields (`startDate`, `preferredTime`, `daysOfWeek`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Schedule {
    /// Returns `true` if the schedule is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ScheduleStatus::Active
    }
}
