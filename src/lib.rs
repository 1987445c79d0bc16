// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `SmartWater` Lib - A Rust library to follow cloud-connected irrigation controllers.
//!
//! This library keeps an in-memory snapshot of every controller of an account
//! up to date from two sources:
//!
//! - the vendor REST API, polled every 15 seconds
//! - the AWS IoT device shadow, followed in real time over MQTT
//!
//! # Supported Features
//!
//! - **Authentication**: OAuth token refresh on rejected requests, with one retry
//! - **Polling**: Device, zone and schedule data per controller
//! - **Real-time updates**: Shadow `reported` state merged as it arrives
//! - **Control**: Manual zone runs and zone enable/disable
//! - **Events**: Snapshot callbacks per device and a broadcast bus per account
//!
//! # Quick Start
//!
//! ```no_run
//! use smartwater_lib::{Entry, EntryConfig, StartWatering};
//!
//! #[tokio::main]
//! async fn main() -> smartwater_lib::Result<()> {
//!     let mut entry = Entry::setup(EntryConfig::new("access-token", "refresh-token")).await?;
//!
//!     for coordinator in entry.coordinators() {
//!         let snapshot = coordinator.snapshot();
//!         println!(
//!             "{} ({}): {:?}",
//!             snapshot.device_name(),
//!             snapshot.id(),
//!             snapshot.watering_status()
//!         );
//!     }
//!
//!     // Water zone 2 of D1 for 7 minutes
//!     entry
//!         .start_watering(&StartWatering::new("D1", "2").with_duration(7))
//!         .await?;
//!
//!     entry.unload().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Snapshot Callbacks
//!
//! ```no_run
//! use smartwater_lib::{Entry, EntryConfig, subscription::Subscribable};
//!
//! # async fn example() -> smartwater_lib::Result<()> {
//! let entry = Entry::setup(EntryConfig::new("access-token", "refresh-token")).await?;
//!
//! if let Some(coordinator) = entry.coordinator("D1") {
//!     coordinator.on_update(|snapshot| {
//!         for zone in snapshot.zones() {
//!             println!("{}: running={}", zone.name, snapshot.is_zone_running(&zone.client_id));
//!         }
//!     });
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Local Endpoints
//!
//! Every endpoint comes from [`ApiConfig`]; [`ApiConfig::rebased`] points all
//! REST URLs at one origin, which is how the integration tests run against
//! local mock servers.

pub mod auth;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod subscription;
pub mod types;

pub use coordinator::{DeviceCoordinator, UpdateStatus};
pub use error::{ApiError, Error, ParseError, ProtocolError, Result, UpdateError};
pub use event::{ConnectionEvent, CoordinatorEvent, EventBus};
pub use manager::{Entry, EntryConfig, StartWatering};
pub use protocol::{ApiClient, ApiConfig, MqttEndpoint, ShadowConfig};
pub use state::{DeviceSnapshot, merge};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
pub use types::{Device, Schedule, ScheduleStatus, Zone};
