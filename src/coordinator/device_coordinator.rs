// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device polling coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, Error, UpdateError};
use crate::event::{ConnectionEvent, ConnectionListener, CoordinatorEvent, EventBus, log_event};
use crate::protocol::{ApiClient, ShadowConfig, ShadowSubscriber};
use crate::state::{DeviceSnapshot, ShadowMessage};
use crate::subscription::{CallbackRegistry, Subscribable, SubscriptionId};
use crate::types::{Device, Schedule};

use super::UpdateStatus;

/// Keeps the snapshot of one device up to date.
///
/// The coordinator polls the REST API every poll interval and, when the
/// API configuration enables it, follows the device shadow in real time.
/// Polls replace the device and schedule data; shadow messages are merged
/// into the shadow state. Listeners receive a copy of the snapshot after
/// every change, in the order the changes were applied.
///
/// The coordinator is cheap to clone; clones share the same state.
///
/// # Examples
///
/// ```no_run
/// use smartwater_lib::coordinator::DeviceCoordinator;
/// use smartwater_lib::event::EventBus;
/// use smartwater_lib::protocol::ApiConfig;
/// use smartwater_lib::types::Device;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> smartwater_lib::Result<()> {
/// let api = ApiConfig::new().into_client("access-token", "refresh-token")?;
/// let cancel = CancellationToken::new();
/// let coordinator = DeviceCoordinator::new(
///     api,
///     Device::new("D1", Some("123456".to_string())),
///     EventBus::new(),
///     &cancel,
/// );
///
/// coordinator.first_refresh().await?;
/// coordinator.start_polling();
///
/// coordinator.add_listener(|snapshot| {
///     println!("{}: {:?}", snapshot.device_name(), snapshot.watering_status());
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DeviceCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    duid: String,
    api: ApiClient,
    snapshot: RwLock<DeviceSnapshot>,
    // Held from mutation through dispatch so listeners never see an older
    // copy after a newer one. Reentrant for listeners that trigger changes.
    notify: ReentrantMutex<()>,
    status: Mutex<UpdateStatus>,
    callbacks: CallbackRegistry<DeviceSnapshot>,
    events: EventBus,
    cancel: CancellationToken,
    polling: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DeviceCoordinator {
    /// Creates the coordinator of a device returned by the device listing.
    ///
    /// When the API configuration carries a [`ShadowConfig`] and the device
    /// has a messaging client id, the shadow subscription is started right
    /// away. Background tasks stop when `parent` is cancelled or on
    /// [`shutdown`](Self::shutdown).
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(
        api: ApiClient,
        device: Device,
        events: EventBus,
        parent: &CancellationToken,
    ) -> Self {
        let client_id = device.client_id.clone();
        let shadow = api.config().shadow().cloned();

        let inner = Arc::new(CoordinatorInner {
            duid: device.duid.clone(),
            api,
            snapshot: RwLock::new(DeviceSnapshot::from_listing(device)),
            notify: ReentrantMutex::new(()),
            status: Mutex::new(UpdateStatus::Idle),
            callbacks: CallbackRegistry::new(),
            events,
            cancel: parent.child_token(),
            polling: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        });

        match (shadow, client_id) {
            (Some(config), Some(client_id)) => {
                let task = spawn_shadow(&inner, config, client_id);
                inner.tasks.lock().push(task);
            }
            (Some(_), None) => {
                tracing::warn!(
                    duid = %inner.duid,
                    "Device has no client id, real-time updates disabled"
                );
            }
            (None, _) => {}
        }

        inner.events.publish(CoordinatorEvent::DeviceAdded {
            duid: inner.duid.clone(),
        });
        Self { inner }
    }

    /// Returns the device unique identifier.
    #[must_use]
    pub fn duid(&self) -> &str {
        &self.inner.duid
    }

    /// Returns the messaging client id of the device.
    #[must_use]
    pub fn client_id(&self) -> Option<String> {
        self.inner.snapshot.read().client_id().map(str::to_string)
    }

    /// Returns the API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.inner.snapshot.read().clone()
    }

    /// Reads the current snapshot without copying it.
    ///
    /// `f` runs under the snapshot lock and must not block.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&DeviceSnapshot) -> R) -> R {
        f(&self.inner.snapshot.read())
    }

    /// Returns the update cycle status.
    #[must_use]
    pub fn status(&self) -> UpdateStatus {
        *self.inner.status.lock()
    }

    /// Returns `true` if the last poll succeeded.
    #[must_use]
    pub fn last_update_success(&self) -> bool {
        self.inner.snapshot.read().last_update_success()
    }

    /// Returns `true` if the last poll succeeded and the controller is online.
    #[must_use]
    pub fn available(&self) -> bool {
        self.inner.snapshot.read().available()
    }

    /// Polls the device and its schedules once.
    ///
    /// On success the device and schedule data are replaced. On failure the
    /// previous data is kept and marked stale. Listeners are notified in
    /// both cases.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ReauthRequired`] if the credentials were
    /// rejected (also for every later call), [`UpdateError::UpdateFailed`]
    /// for any other failure.
    pub async fn refresh(&self) -> Result<(), UpdateError> {
        self.inner.refresh().await
    }

    /// Performs the initial poll of setup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Update`] if the poll fails.
    pub async fn first_refresh(&self) -> Result<(), Error> {
        self.inner.refresh().await.map_err(Error::from)
    }

    /// Polls outside of the regular cycle, typically after a write.
    ///
    /// Failures are reported to listeners and on the event bus only.
    pub async fn request_refresh(&self) {
        if let Err(e) = self.inner.refresh().await {
            tracing::debug!(duid = %self.inner.duid, error = %e, "Requested refresh failed");
        }
    }

    /// Starts the periodic polling task.
    ///
    /// The first poll runs one poll interval from now. Polling stops when
    /// the coordinator is shut down or once the credentials are rejected.
    /// Calling this again has no effect.
    pub fn start_polling(&self) {
        if self.inner.polling.swap(true, Ordering::AcqRel) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let period = inner.api.config().poll_interval();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = inner.cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let result = tokio::select! {
                    biased;
                    () = inner.cancel.cancelled() => break,
                    result = inner.refresh() => result,
                };
                if matches!(result, Err(ref e) if e.is_reauth_required()) {
                    tracing::warn!(duid = %inner.duid, "Polling stopped until re-authentication");
                    break;
                }
            }
            tracing::debug!(duid = %inner.duid, "Polling stopped");
        });
        self.inner.tasks.lock().push(task);
    }

    /// Folds a shadow message into the snapshot.
    ///
    /// Every non-null `reported` section is merged into the shadow state and
    /// listeners are notified. `desired` sections are only logged.
    pub fn handle_shadow_message(&self, message: &ShadowMessage) {
        self.inner.handle_shadow_message(message);
    }

    /// Enables or disables a zone, then refreshes the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the request fails.
    pub async fn set_zone_enabled(&self, zone_id: &str, enabled: bool) -> Result<(), Error> {
        self.inner
            .api
            .set_zone_enabled(&self.inner.duid, zone_id, enabled)
            .await?;
        tracing::debug!(duid = %self.inner.duid, zone = %zone_id, enabled, "Zone updated");
        self.request_refresh().await;
        Ok(())
    }

    /// Registers a listener called with the snapshot after every change.
    pub fn add_listener<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DeviceSnapshot) + Send + Sync + 'static,
    {
        self.inner.callbacks.subscribe(listener)
    }

    /// Removes a listener.
    ///
    /// Returns `true` if the listener was registered.
    pub fn remove_listener(&self, id: SubscriptionId) -> bool {
        self.inner.callbacks.unsubscribe(id)
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.callbacks.len()
    }

    /// Stops the polling and shadow tasks and waits for them to finish.
    ///
    /// The shadow connection is closed with a DISCONNECT. Listeners are
    /// dropped.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await
                && e.is_panic()
            {
                tracing::error!(duid = %self.inner.duid, error = %e, "Coordinator task panicked");
            }
        }

        self.inner.callbacks.clear();
        self.inner.events.publish(CoordinatorEvent::DeviceRemoved {
            duid: self.inner.duid.clone(),
        });
        tracing::debug!(duid = %self.inner.duid, "Coordinator shut down");
    }
}

impl CoordinatorInner {
    async fn refresh(&self) -> Result<(), UpdateError> {
        if self.status.lock().is_terminal() {
            return Err(UpdateError::ReauthRequired(ApiError::Authentication(
                "credentials were rejected, re-authentication required".to_string(),
            )));
        }
        self.set_status(UpdateStatus::Fetching);

        match self.fetch().await {
            Ok((device, schedules)) => {
                let _ordered = self.notify.lock();
                let snapshot = {
                    let mut snapshot = self.snapshot.write();
                    snapshot.replace_polled(device, schedules);
                    snapshot.clone()
                };
                self.set_status(UpdateStatus::Idle);
                tracing::debug!(
                    duid = %self.duid,
                    zones = snapshot.zones().len(),
                    schedules = snapshot.schedules().len(),
                    "Device updated"
                );

                self.callbacks.dispatch(&snapshot);
                self.events.publish(CoordinatorEvent::Updated {
                    duid: self.duid.clone(),
                });
                Ok(())
            }
            Err(e) => {
                let error = UpdateError::from_api(e);
                let _ordered = self.notify.lock();
                let snapshot = {
                    let mut snapshot = self.snapshot.write();
                    snapshot.mark_failed();
                    snapshot.clone()
                };

                if error.is_reauth_required() {
                    self.set_status(UpdateStatus::ReauthRequired);
                    tracing::warn!(duid = %self.duid, error = %error, "Credentials rejected");
                    self.events.publish(CoordinatorEvent::ReauthRequired {
                        duid: self.duid.clone(),
                    });
                } else {
                    self.set_status(UpdateStatus::Degraded);
                    tracing::warn!(duid = %self.duid, error = %error, "Device update failed");
                    self.events.publish(CoordinatorEvent::UpdateFailed {
                        duid: self.duid.clone(),
                        error: error.clone(),
                    });
                }

                self.callbacks.dispatch(&snapshot);
                Err(error)
            }
        }
    }

    async fn fetch(&self) -> Result<(Device, Vec<Schedule>), ApiError> {
        let device = self.api.get_device(&self.duid).await?;
        let schedules = self.api.get_schedules(&self.duid).await?;
        Ok((device, schedules.items))
    }

    fn set_status(&self, outcome: UpdateStatus) {
        let mut status = self.status.lock();
        *status = status.after(outcome);
    }

    fn handle_shadow_message(&self, message: &ShadowMessage) {
        for desired in message.desired() {
            tracing::debug!(duid = %self.duid, ?desired, "Shadow desired state");
        }

        let mut reported = message.reported().peekable();
        if reported.peek().is_none() {
            return;
        }

        let _ordered = self.notify.lock();
        let snapshot = {
            let mut snapshot = self.snapshot.write();
            for section in reported {
                snapshot.merge_reported(section);
            }
            snapshot.clone()
        };
        tracing::debug!(duid = %self.duid, version = ?message.version, "Shadow state merged");

        self.callbacks.dispatch(&snapshot);
        self.events.publish(CoordinatorEvent::ShadowUpdated {
            duid: self.duid.clone(),
        });
    }
}

/// Starts the shadow subscription of a device.
///
/// The task holds the coordinator weakly so dropping every handle ends the
/// message flow even if nobody cancels.
fn spawn_shadow(
    inner: &Arc<CoordinatorInner>,
    config: ShadowConfig,
    client_id: String,
) -> JoinHandle<()> {
    let subscriber = ShadowSubscriber::new(inner.api.clone(), config);
    let listener = ForwardingListener {
        duid: inner.duid.clone(),
        events: inner.events.clone(),
    };
    let weak = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();
    let duid = inner.duid.clone();

    tokio::spawn(async move {
        let on_message = move |message: ShadowMessage| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_shadow_message(&message);
            }
        };

        match subscriber.run(&client_id, on_message, listener, cancel).await {
            Ok(()) => tracing::debug!(duid = %duid, "Shadow subscription stopped"),
            Err(e) => tracing::error!(duid = %duid, error = %e, "Shadow subscription setup failed"),
        }
    })
}

/// Logs connection events and forwards them onto the event bus.
struct ForwardingListener {
    duid: String,
    events: EventBus,
}

impl ConnectionListener for ForwardingListener {
    fn on_event(&self, event: &ConnectionEvent) {
        log_event(event);
        self.events.publish(CoordinatorEvent::Connection {
            duid: self.duid.clone(),
            event: event.clone(),
        });
    }
}

impl Subscribable for DeviceCoordinator {
    type Update = DeviceSnapshot;

    fn on_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Self::Update) + Send + Sync + 'static,
    {
        self.add_listener(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.remove_listener(id)
    }
}

impl std::fmt::Debug for DeviceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCoordinator")
            .field("duid", &self.inner.duid)
            .field("status", &self.status())
            .field("listeners", &self.inner.callbacks.len())
            .finish_non_exhaustive()
    }
}
