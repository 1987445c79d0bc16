// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for snapshot subscriptions.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry storing and dispatching callbacks

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Unique identifier for a subscription.
///
/// Returned when registering a callback and used to unsubscribe later. IDs
/// are unique within a registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Registry of callbacks receiving values of type `T`.
///
/// Callbacks are invoked synchronously, in an arbitrary order, after the
/// registry lock has been released; a callback may therefore register or
/// unregister callbacks itself.
pub struct CallbackRegistry<T> {
    next_id: AtomicU64,
    callbacks: RwLock<HashMap<SubscriptionId, Callback<T>>>,
}

impl<T> CallbackRegistry<T> {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a callback.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Removes a callback.
    ///
    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.callbacks.write().clear();
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns `true` if no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Calls every registered callback with `value`.
    pub fn dispatch(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self.callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(value);
        }
    }
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for CallbackRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.len())
            .finish()
    }
}
