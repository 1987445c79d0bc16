// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events published by coordinators and the real-time transport.
//!
//! Hosts observe an entry through the [`EventBus`], a tokio broadcast channel
//! of [`CoordinatorEvent`]s. The shadow transport reports its lifecycle as
//! [`ConnectionEvent`]s to a [`ConnectionListener`]; the coordinators forward
//! them onto the bus.
//!
//! # Examples
//!
//! ```
//! use smartwater_lib::event::{CoordinatorEvent, EventBus};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(CoordinatorEvent::ReauthRequired { duid: "D1".to_string() });
//! assert!(rx.try_recv().unwrap().is_failure());
//! ```

mod connection_event;
mod coordinator_event;
mod event_bus;

pub use connection_event::{ConnectionEvent, ConnectionListener, LoggingListener};
pub(crate) use connection_event::log_event;
pub use coordinator_event::CoordinatorEvent;
pub use event_bus::EventBus;
