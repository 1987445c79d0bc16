// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Account entry: the API client and the coordinators of every device.

use std::collections::BTreeMap;

use secrecy::ExposeSecret;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::coordinator::DeviceCoordinator;
use crate::error::Error;
use crate::event::{CoordinatorEvent, EventBus};
use crate::protocol::ApiClient;
use crate::types::ManualRunZone;

use super::entry_config::EntryConfig;
use super::service::{MANUAL_RUN_NAME, StartWatering};

/// One configured account and the devices it owns.
///
/// Setting an entry up lists the account's devices, creates one
/// [`DeviceCoordinator`] per device, polls every device once and then keeps
/// them up to date in the background until [`unload`](Self::unload).
///
/// # Examples
///
/// ```no_run
/// use smartwater_lib::manager::{Entry, EntryConfig, StartWatering};
///
/// #[tokio::main]
/// async fn main() -> smartwater_lib::Result<()> {
///     let mut entry = Entry::setup(EntryConfig::new("access-token", "refresh-token")).await?;
///
///     let mut events = entry.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("{event:?}");
///         }
///     });
///
///     for coordinator in entry.coordinators() {
///         let snapshot = coordinator.snapshot();
///         println!("{}: watering={}", snapshot.device_name(), snapshot.is_watering());
///     }
///
///     entry
///         .start_watering(&StartWatering::new("D1", "2").with_duration(7))
///         .await?;
///
///     entry.unload().await;
///     Ok(())
/// }
/// ```
pub struct Entry {
    config: EntryConfig,
    client: ApiClient,
    coordinators: BTreeMap<String, DeviceCoordinator>,
    events: EventBus,
    cancel: CancellationToken,
}

impl Entry {
    /// Sets up an entry.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the HTTP client cannot be built
    /// - [`Error::NotReady`] if the device listing fails; the host should
    ///   retry later
    /// - [`Error::Update`] if the first poll of a device fails
    pub async fn setup(config: EntryConfig) -> Result<Self, Error> {
        let client = config.api().clone().into_client(
            config.access_token().expose_secret(),
            config.refresh_token().expose_secret(),
        )?;

        let listing = client
            .get_devices()
            .await
            .map_err(|e| Error::NotReady(format!("unable to list devices: {e}")))?;

        let events = EventBus::new();
        let cancel = CancellationToken::new();
        let coordinators: BTreeMap<String, DeviceCoordinator> = listing
            .devices
            .into_iter()
            .map(|device| {
                let duid = device.duid.clone();
                let coordinator =
                    DeviceCoordinator::new(client.clone(), device, events.clone(), &cancel);
                (duid, coordinator)
            })
            .collect();

        let entry = Self {
            config,
            client,
            coordinators,
            events,
            cancel,
        };

        if let Err(e) = entry.first_refresh().await {
            entry.shutdown().await;
            return Err(e);
        }

        for coordinator in entry.coordinators.values() {
            coordinator.start_polling();
        }

        tracing::info!(devices = entry.coordinators.len(), "Entry set up");
        Ok(entry)
    }

    /// Polls every device once, concurrently.
    async fn first_refresh(&self) -> Result<(), Error> {
        let mut refreshes = JoinSet::new();
        for coordinator in self.coordinators.values() {
            let coordinator = coordinator.clone();
            refreshes.spawn(async move { coordinator.first_refresh().await });
        }

        while let Some(result) = refreshes.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(Error::NotReady(format!("first refresh aborted: {e}"))),
            }
        }
        Ok(())
    }

    /// Returns the configuration the entry was set up with.
    #[must_use]
    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    /// Returns the API client shared by every coordinator.
    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Returns the coordinators, ordered by device id.
    pub fn coordinators(&self) -> impl Iterator<Item = &DeviceCoordinator> {
        self.coordinators.values()
    }

    /// Returns the coordinator of a device.
    #[must_use]
    pub fn coordinator(&self, duid: &str) -> Option<&DeviceCoordinator> {
        self.coordinators.get(duid)
    }

    /// Returns the coordinator of a device, or [`Error::DeviceNotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if the account has no such device.
    pub fn require(&self, duid: &str) -> Result<&DeviceCoordinator, Error> {
        self.coordinator(duid)
            .ok_or_else(|| Error::DeviceNotFound(duid.to_string()))
    }

    /// Subscribes to the events of every coordinator of this entry.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Starts a manual run of one zone, then refreshes the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Service`] if the run could not be started.
    pub async fn start_watering(&self, call: &StartWatering) -> Result<(), Error> {
        let zones = [ManualRunZone::new(
            &call.device_id,
            &call.zone_id,
            call.duration,
        )];

        self.client
            .manual_run(&call.device_id, MANUAL_RUN_NAME, &zones)
            .await
            .map_err(|e| {
                Error::Service(format!(
                    "unable to start watering zone {} of {}: {e}",
                    call.zone_id, call.device_id
                ))
            })?;
        tracing::debug!(
            duid = %call.device_id,
            zone = %call.zone_id,
            duration = call.duration,
            "Manual run started"
        );

        if let Some(coordinator) = self.coordinators.get(&call.device_id) {
            coordinator.request_refresh().await;
        }
        Ok(())
    }

    /// Stops every background task and drops the coordinators.
    ///
    /// Shadow connections are closed with a DISCONNECT before this returns.
    pub async fn unload(&mut self) {
        self.shutdown().await;
        self.coordinators.clear();
        tracing::info!("Entry unloaded");
    }

    /// Unloads the entry and sets it up again with the current tokens.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`setup`](Self::setup). The entry is left
    /// unloaded on error.
    pub async fn reload(&mut self) -> Result<(), Error> {
        let tokens = self.client.tokens();
        self.config
            .set_tokens(tokens.access_token(), tokens.refresh_token());

        self.unload().await;
        *self = Self::setup(self.config.clone()).await?;
        Ok(())
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        for coordinator in self.coordinators.values() {
            coordinator.shutdown().await;
        }
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("devices", &self.coordinators.keys().collect::<Vec<_>>())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
