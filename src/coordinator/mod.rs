// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device update coordination.
//!
//! A [`DeviceCoordinator`] owns the [`DeviceSnapshot`](crate::state::DeviceSnapshot)
//! of one controller. It runs two independent sources into it:
//!
//! - a polling task that replaces the REST data every poll interval
//! - a shadow subscription whose `reported` sections are merged in
//!
//! Failures are classified into [`UpdateError`](crate::error::UpdateError)s.
//! Rejected credentials stop polling for good ([`UpdateStatus::ReauthRequired`]).

mod device_coordinator;
mod status;

pub use device_coordinator::DeviceCoordinator;
pub use status::UpdateStatus;
