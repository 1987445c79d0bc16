// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coordinator event types.

use crate::error::UpdateError;

use super::ConnectionEvent;

/// Events published by the device coordinators of an entry.
///
/// All events carry the `duid` of the device they concern.
///
/// # Examples
///
/// ```
/// use smartwater_lib::event::CoordinatorEvent;
///
/// let event = CoordinatorEvent::Updated { duid: "D1".to_string() };
/// assert_eq!(event.duid(), "D1");
/// assert!(event.is_update());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// A coordinator was created for a device.
    DeviceAdded {
        /// The device.
        duid: String,
    },

    /// A coordinator was shut down.
    DeviceRemoved {
        /// The device.
        duid: String,
    },

    /// A poll succeeded and replaced the device data.
    Updated {
        /// The device.
        duid: String,
    },

    /// A poll failed; the last good data is kept.
    UpdateFailed {
        /// The device.
        duid: String,
        /// The failure.
        error: UpdateError,
    },

    /// Credentials were rejected; polling stopped until the user
    /// re-authenticates.
    ReauthRequired {
        /// The device.
        duid: String,
    },

    /// A shadow message was merged into the device state.
    ShadowUpdated {
        /// The device.
        duid: String,
    },

    /// The real-time connection changed state.
    Connection {
        /// The device.
        duid: String,
        /// The connection event.
        event: ConnectionEvent,
    },
}

impl CoordinatorEvent {
    /// Returns the device this event concerns.
    #[must_use]
    pub fn duid(&self) -> &str {
        match self {
            Self::DeviceAdded { duid }
            | Self::DeviceRemoved { duid }
            | Self::Updated { duid }
            | Self::UpdateFailed { duid, .. }
            | Self::ReauthRequired { duid }
            | Self::ShadowUpdated { duid }
            | Self::Connection { duid, .. } => duid,
        }
    }

    /// Returns `true` if this event reports new device data.
    #[must_use]
    pub fn is_update(&self) -> bool {
        matches!(self, Self::Updated { .. } | Self::ShadowUpdated { .. })
    }

    /// Returns `true` if this event reports a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::UpdateFailed { .. } | Self::ReauthRequired { .. })
    }
}
