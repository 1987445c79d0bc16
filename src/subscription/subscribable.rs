// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for types that publish snapshot updates.

use crate::subscription::SubscriptionId;

/// Trait for types whose state can be observed through callbacks.
///
/// # Examples
///
/// ```no_run
/// use smartwater_lib::Entry;
/// use smartwater_lib::subscription::Subscribable;
///
/// # fn example(entry: &Entry) {
/// if let Some(coordinator) = entry.coordinator("D1") {
///     let sub_id = coordinator.on_update(|snapshot| {
///         println!("{} watering: {}", snapshot.id(), snapshot.is_watering());
///     });
///
///     // Later, unsubscribe
///     coordinator.unsubscribe(sub_id);
/// }
/// # }
/// ```
pub trait Subscribable {
    /// The value delivered to callbacks.
    type Update;

    /// Registers a callback invoked after every update.
    fn on_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Self::Update) + Send + Sync + 'static;

    /// Removes a callback.
    ///
    /// Returns `true` if the subscription existed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
