// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state types.
//!
//! [`DeviceSnapshot`] is the per-device state hosts read. Polls replace its
//! REST part; [`ShadowMessage`]s received over the real-time channel are
//! folded into its shadow part with [`merge`].
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use smartwater_lib::state::merge;
//!
//! let mut shadow = serde_json::Map::new();
//! let reported = json!({ "hydraOverview": { "status": "idle", "zoneID": "1" } });
//! merge(&mut shadow, reported.as_object().unwrap());
//!
//! assert_eq!(shadow["hydraOverview"]["status"], "idle");
//! ```

mod merge;
mod shadow_message;
mod snapshot;

pub use merge::{merge, merge_value};
pub use shadow_message::{ShadowDocument, ShadowMessage, ShadowState};
pub use snapshot::{DeviceSnapshot, MANUFACTURER};
