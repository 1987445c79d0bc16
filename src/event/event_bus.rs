// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast channel shared by the coordinators of an entry.

use tokio::sync::broadcast;

use super::CoordinatorEvent;

/// Buffered events per receiver before the oldest are dropped.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out of [`CoordinatorEvent`]s to any number of receivers.
///
/// Clones share one channel. A receiver that falls more than the capacity
/// behind gets `RecvError::Lagged` and skips the oldest events; publishing
/// never blocks a coordinator.
///
/// # Examples
///
/// ```
/// use smartwater_lib::event::{CoordinatorEvent, EventBus};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(CoordinatorEvent::Updated { duid: "D1".to_string() });
/// assert_eq!(rx.recv().await.unwrap().duid(), "D1");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoordinatorEvent>,
}

impl EventBus {
    /// Creates a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a bus buffering up to `capacity` events per receiver.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns a receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event, returning how many receivers got it.
    ///
    /// Without receivers the event is dropped.
    pub fn publish(&self, event: CoordinatorEvent) -> usize {
        tracing::trace!(duid = %event.duid(), ?event, "Publishing coordinator event");
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receivers_are_counted() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let rx1 = bus.subscribe();
        let _rx2 = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn every_receiver_gets_the_event() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let delivered = bus.publish(CoordinatorEvent::ShadowUpdated { duid: "D2".into() });
        assert_eq!(delivered, 2);

        let first = rx1.recv().await.unwrap();
        assert_eq!(first, rx2.recv().await.unwrap());
        assert_eq!(first.duid(), "D2");
    }

    #[test]
    fn publish_without_receivers_is_dropped() {
        let bus = EventBus::with_capacity(4);
        assert_eq!(
            bus.publish(CoordinatorEvent::DeviceRemoved { duid: "D1".into() }),
            0
        );
    }

    #[tokio::test]
    async fn slow_receiver_lags() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for _ in 0..3 {
            bus.publish(CoordinatorEvent::Updated { duid: "D1".into() });
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
    }
}
