// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Account entries.
//!
//! An [`Entry`] is the unit a host sets up per configured account. It owns:
//!
//! - the [`ApiClient`](crate::protocol::ApiClient) and its tokens
//! - one [`DeviceCoordinator`](crate::coordinator::DeviceCoordinator) per device
//! - the cancellation token of every background task
//!
//! Unloading cancels the token and waits for the tasks; reloading unloads
//! and sets the entry up again.
//!
//! # Examples
//!
//! ```no_run
//! use smartwater_lib::manager::{Entry, EntryConfig};
//! use smartwater_lib::subscription::Subscribable;
//!
//! #[tokio::main]
//! async fn main() -> smartwater_lib::Result<()> {
//!     let entry = Entry::setup(EntryConfig::new("access-token", "refresh-token")).await?;
//!
//!     let coordinator = entry.require("D1")?;
//!     coordinator.on_update(|snapshot| {
//!         if let Some(zone) = snapshot.running_zone() {
//!             println!("watering {}", zone.name);
//!         }
//!     });
//!     Ok(())
//! }
//! ```

mod entry;
mod entry_config;
mod service;

pub use entry::Entry;
pub use entry_config::EntryConfig;
pub use service::{DEFAULT_DURATION, MANUAL_RUN_NAME, SERVICE_NAME, StartWatering};
