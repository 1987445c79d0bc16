// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback subscriptions.
//!
//! - [`SubscriptionId`] - A unique identifier for a subscription, used to unsubscribe
//! - [`CallbackRegistry`] - Registry that stores callbacks and dispatches updates
//! - [`Subscribable`] - Trait for types that support update subscriptions
//!
//! Device coordinators implement [`Subscribable`]: every successful poll,
//! every failed poll and every merged shadow message is delivered to the
//! registered callbacks as a fresh
//! [`DeviceSnapshot`](crate::state::DeviceSnapshot).

mod callback;
mod subscribable;

pub use callback::{CallbackRegistry, SubscriptionId};
pub use subscribable::Subscribable;
