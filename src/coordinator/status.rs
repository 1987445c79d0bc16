// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Update cycle state of a coordinator.

use std::fmt;

/// State of a coordinator's update cycle.
///
/// ```text
/// Idle ──poll──► Fetching ──ok──────► Idle
///                    │ ──failure──► Degraded ──poll──► Fetching
///                    └──auth────► ReauthRequired (terminal)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UpdateStatus {
    /// The last poll succeeded, or none ran yet.
    #[default]
    Idle,
    /// A poll is in flight.
    Fetching,
    /// The last poll failed; the previous data is kept.
    Degraded,
    /// Credentials were rejected. Polling has stopped.
    ReauthRequired,
}

impl UpdateStatus {
    /// Returns `true` once no further poll will run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::ReauthRequired
    }

    /// Returns the status after a poll outcome.
    ///
    /// The terminal status is never left.
    #[must_use]
    pub(crate) fn after(self, outcome: Self) -> Self {
        if self.is_terminal() { self } else { outcome }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Degraded => "degraded",
            Self::ReauthRequired => "reauth required",
        };
        f.write_str(name)
    }
}
