// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Combined view of one irrigation controller.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::lenient;
use crate::types::{Device, Schedule, Zone};

use super::merge;

/// Manufacturer reported for every device.
pub const MANUFACTURER: &str = "Moen";

/// The state of one device as seen by the host.
///
/// A snapshot combines two sources that never overwrite each other:
///
/// - the polled REST data (`device` and `schedules`), replaced wholesale by
///   every successful poll and kept as-is when a poll fails;
/// - the shadow state, into which every `reported` section received over the
///   real-time channel is merged and which is never replaced.
///
/// # Examples
///
/// ```
/// use smartwater_lib::state::DeviceSnapshot;
///
/// let snapshot = DeviceSnapshot::new("D1");
/// assert_eq!(snapshot.id(), "D1");
/// assert_eq!(snapshot.device_name(), "Moen");
/// assert!(!snapshot.available());
/// assert!(snapshot.zones().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSnapshot {
    duid: String,
    device: Device,
    schedules: BTreeMap<String, Schedule>,
    shadow: Map<String, Value>,
    last_update_success: bool,
}

impl DeviceSnapshot {
    /// Creates an empty snapshot for a device that has not been polled yet.
    #[must_use]
    pub fn new(duid: impl Into<String>) -> Self {
        Self {
            duid: duid.into(),
            ..Self::default()
        }
    }

    /// Creates an unpolled snapshot seeded with the device listing entry.
    pub(crate) fn from_listing(device: Device) -> Self {
        Self {
            duid: device.duid.clone(),
            device,
            ..Self::default()
        }
    }

    /// Replaces the polled data after a successful poll.
    pub(crate) fn replace_polled(&mut self, device: Device, schedules: Vec<Schedule>) {
        self.device = device;
        self.schedules = schedules
            .into_iter()
            .map(|schedule| (schedule.id.clone(), schedule))
            .collect();
        self.last_update_success = true;
    }

    /// Records a failed poll; the polled data is kept.
    pub(crate) fn mark_failed(&mut self) {
        self.last_update_success = false;
    }

    /// Merges a `reported` shadow section.
    pub(crate) fn merge_reported(&mut self, reported: &Map<String, Value>) {
        merge(&mut self.shadow, reported);
    }

    // ========== Identity ==========

    /// Returns the device unique identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.duid
    }

    /// Returns the messaging client id.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.device.client_id.as_deref()
    }

    /// Returns the manufacturer.
    #[must_use]
    pub fn manufacturer(&self) -> &'static str {
        MANUFACTURER
    }

    /// Returns the nickname, or `"Moen {type}"` if the device has none.
    #[must_use]
    pub fn device_name(&self) -> String {
        match (&self.device.nickname, &self.device.device_type) {
            (Some(nickname), _) => nickname.clone(),
            (None, Some(device_type)) => format!("{MANUFACTURER} {device_type}"),
            (None, None) => MANUFACTURER.to_string(),
        }
    }

    /// Returns the hardware type.
    #[must_use]
    pub fn device_type(&self) -> Option<&str> {
        self.device.device_type.as_deref()
    }

    /// Returns the signal strength in dBm.
    #[must_use]
    pub fn rssi(&self) -> Option<i64> {
        self.device.connectivity.as_ref().and_then(|c| c.rssi)
    }

    /// Returns the firmware version.
    #[must_use]
    pub fn firmware_version(&self) -> Option<&str> {
        self.device
            .firmware
            .as_ref()
            .and_then(|f| f.version.as_deref())
    }

    /// Returns the timestamp of the last cloud connection.
    #[must_use]
    pub fn last_connect_time(&self) -> Option<&str> {
        self.device.last_connect.as_deref()
    }

    // ========== Availability ==========

    /// Returns `true` if the last poll succeeded.
    #[must_use]
    pub fn last_update_success(&self) -> bool {
        self.last_update_success
    }

    /// Returns `true` if the controller reports itself online.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.device.connected
    }

    /// Returns `true` if the last poll succeeded and the controller is online.
    #[must_use]
    pub fn available(&self) -> bool {
        self.last_update_success && self.device.connected
    }

    // ========== Irrigation ==========

    /// Returns `true` if any zone is watering.
    #[must_use]
    pub fn is_watering(&self) -> bool {
        self.device
            .irrigation
            .as_ref()
            .and_then(|i| i.watering_state.as_ref())
            .is_some_and(|s| s.running)
    }

    /// Returns whether a master valve is connected.
    #[must_use]
    pub fn master_valve_connected(&self) -> Option<bool> {
        self.device
            .irrigation
            .as_ref()
            .and_then(|i| i.master_valve_connected)
    }

    /// Returns whether the rain sensor is connected.
    #[must_use]
    pub fn rain_sensor_connected(&self) -> Option<bool> {
        self.device
            .irrigation
            .as_ref()
            .and_then(|i| i.rain_sensor.as_ref())
            .map(|s| s.connected)
    }

    /// Returns whether the flow sensor is connected.
    #[must_use]
    pub fn flow_sensor_connected(&self) -> Option<bool> {
        self.device
            .irrigation
            .as_ref()
            .and_then(|i| i.flow_sensor.as_ref())
            .map(|s| s.connected)
    }

    /// Returns the zones, in the order the API lists them.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        self.device.zones()
    }

    /// Returns the zones with a valve wired.
    pub fn wired_zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones().iter().filter(|zone| zone.is_wired())
    }

    /// Looks up a zone by its client id.
    #[must_use]
    pub fn zone_from_client_id(&self, client_id: &str) -> Option<&Zone> {
        self.zones().iter().find(|zone| zone.client_id == client_id)
    }

    // ========== Shadow ==========

    /// Returns the accumulated shadow state.
    #[must_use]
    pub fn shadow(&self) -> &Map<String, Value> {
        &self.shadow
    }

    /// Returns the `hydraOverview` section of the shadow state.
    #[must_use]
    pub fn hydra_overview(&self) -> Option<&Map<String, Value>> {
        self.shadow.get("hydraOverview").and_then(Value::as_object)
    }

    /// Returns the controller status (`idle`, `running`, ...).
    #[must_use]
    pub fn watering_status(&self) -> Option<&str> {
        self.hydra_overview()
            .and_then(|h| h.get("status"))
            .and_then(Value::as_str)
    }

    /// Returns the client id of the zone the shadow reports as running.
    #[must_use]
    pub fn running_zone_id(&self) -> Option<String> {
        self.hydra_overview()
            .and_then(|h| h.get("zoneID"))
            .and_then(lenient::value_to_string)
    }

    /// Returns the zone the shadow reports as running.
    #[must_use]
    pub fn running_zone(&self) -> Option<&Zone> {
        self.running_zone_id()
            .and_then(|id| self.zone_from_client_id(&id))
    }

    /// Returns `true` if the shadow reports the zone as running.
    #[must_use]
    pub fn is_zone_running(&self, client_id: &str) -> bool {
        self.running_zone_id().as_deref() == Some(client_id)
    }

    // ========== Schedules ==========

    /// Returns the schedules keyed by id.
    #[must_use]
    pub fn schedules(&self) -> &BTreeMap<String, Schedule> {
        &self.schedules
    }

    /// Looks up a schedule by id.
    #[must_use]
    pub fn schedule(&self, id: &str) -> Option<&Schedule> {
        self.schedules.get(id)
    }

    /// Returns `true` if the schedule exists and is active.
    #[must_use]
    pub fn is_schedule_active(&self, id: &str) -> bool {
        self.schedule(id).is_some_and(Schedule::is_active)
    }

    /// Returns the raw device document of the last successful poll.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }
}
