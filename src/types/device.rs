// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device and irrigation documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

/// Response of the device list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicesResponse {
    /// Devices registered to the account.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub devices: Vec<Device>,
    /// Paging fields and anything else the API returns.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A physical irrigation controller as reported by the REST API.
///
/// # Examples
///
/// ```
/// use smartwater_lib::types::Device;
///
/// let device: Device = serde_json::from_value(serde_json::json!({
///     "duid": "D1",
///     "clientId": 1234,
///     "connected": true,
///     "irrigation": { "zones": [{ "clientId": "1", "name": "Lawn", "enabled": true }] }
/// }))
/// .unwrap();
///
/// assert_eq!(device.client_id.as_deref(), Some("1234"));
/// assert_eq!(device.zones()[0].name, "Lawn");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device unique identifier used in REST paths.
    #[serde(default, deserialize_with = "lenient::string")]
    pub duid: String,
    /// Messaging client id (the shadow "thing name").
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<String>,
    /// User-assigned name.
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub nickname: Option<String>,
    /// Hardware type.
    #[serde(
        default,
        rename = "type",
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_type: Option<String>,
    /// Whether the controller is currently online.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub connected: bool,
    /// Timestamp of the last cloud connection.
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_connect: Option<String>,
    /// Network link information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectivity: Option<Connectivity>,
    /// Firmware information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<Firmware>,
    /// Irrigation state: zones, watering state, sensors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irrigation: Option<Irrigation>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    /// Creates an otherwise empty device with the given identifiers.
    #[must_use]
    pub fn new(duid: impl Into<String>, client_id: Option<String>) -> Self {
        Self {
            duid: duid.into(),
            client_id,
            ..Self::default()
        }
    }

    /// Returns the configured zones, empty if the device has no irrigation section.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        self.irrigation.as_ref().map_or(&[], |i| i.zones.as_slice())
    }
}

/// Network link information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connectivity {
    /// Signal strength in dBm, rounded to a whole number.
    #[serde(
        default,
        deserialize_with = "lenient::optional_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub rssi: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Firmware information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Firmware {
    /// Installed firmware version.
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Irrigation section of a device document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Irrigation {
    /// Zones wired to the controller.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub zones: Vec<Zone>,
    /// Current watering state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watering_state: Option<WateringState>,
    /// Whether a master valve is connected.
    #[serde(
        default,
        deserialize_with = "lenient::optional_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub master_valve_connected: Option<bool>,
    /// Rain sensor link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain_sensor: Option<SensorLink>,
    /// Flow sensor link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_sensor: Option<SensorLink>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Watering state of the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WateringState {
    /// Whether any zone is currently running.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub running: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Connection state of an optional sensor (rain, flow).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorLink {
    /// Whether the sensor is connected.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub connected: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An irrigation zone.
///
/// Zones are identified by `clientId`, the numeric zone index the shadow
/// channel reports as a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Zone index, normalized to a string.
    #[serde(default, deserialize_with = "lenient::string")]
    pub client_id: String,
    /// Cloud identifier (`{duid}_{clientId}`).
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Display name.
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    /// Whether the zone takes part in schedules.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub enabled: bool,
    /// Whether a valve is wired to this zone output.
    #[serde(
        default,
        deserialize_with = "lenient::optional_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub wired: Option<bool>,
    /// Irrigation tuning parameters (soil type, slope, flow thresholds, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Zone {
    /// Returns `false` only for zones explicitly reported as not wired.
    #[must_use]
    pub fn is_wired(&self) -> bool {
        self.wired != Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_keeps_unknown_fields() {
        let device: Device = serde_json::from_value(json!({
            "duid": "D1",
            "powerSource": "ac",
            "irrigation": {
                "numZones": 8,
                "zones": [{ "clientId": 3, "name": "Beds", "soilType": "clay" }]
            }
        }))
        .unwrap();

        assert_eq!(device.extra.get("powerSource"), Some(&json!("ac")));
        let irrigation = device.irrigation.as_ref().unwrap();
        assert_eq!(irrigation.extra.get("numZones"), Some(&json!(8)));
        let zone = &irrigation.zones[0];
        assert_eq!(zone.client_id, "3");
        assert_eq!(zone.extra.get("soilType"), Some(&json!("clay")));
    }

    #[test]
    fn device_without_irrigation_has_no_zones() {
        let device = Device::new("D1", None);
        assert!(device.zones().is_empty());
    }

    #[test]
    fn zone_wired_defaults_to_true() {
        let unknown: Zone = serde_json::from_value(json!({ "clientId": "1" })).unwrap();
        let unwired: Zone =
            serde_json::from_value(json!({ "clientId": "2", "wired": false })).unwrap();
        assert!(unknown.is_wired());
        assert!(!unwired.is_wired());
    }

    #[test]
    fn zone_tolerates_null_and_mixed_types() {
        let zone: Zone = serde_json::from_value(json!({
            "clientId": 4,
            "name": null,
            "enabled": "true",
            "wired": 1
        }))
        .unwrap();

        assert_eq!(zone.client_id, "4");
        assert_eq!(zone.name, "");
        assert!(zone.enabled);
        assert_eq!(zone.wired, Some(true));
    }

    #[test]
    fn fractional_rssi_is_rounded() {
        let device: Device = serde_json::from_value(json!({
            "duid": "D1",
            "connectivity": { "rssi": -61.5 }
        }))
        .unwrap();
        assert_eq!(device.connectivity.unwrap().rssi, Some(-62));
    }

    #[test]
    fn null_scalars_fall_back_to_defaults() {
        let device: Device = serde_json::from_value(json!({
            "duid": "D1",
            "nickname": null,
            "connected": null,
            "irrigation": {
                "zones": null,
                "wateringState": { "running": null },
                "rainSensor": { "connected": 0 }
            }
        }))
        .unwrap();

        assert!(device.nickname.is_none());
        assert!(!device.connected);
        assert!(device.zones().is_empty());
        let irrigation = device.irrigation.unwrap();
        assert!(!irrigation.watering_state.unwrap().running);
        assert!(!irrigation.rain_sensor.unwrap().connected);
    }

    #[test]
    fn device_type_uses_type_key() {
        let device: Device =
            serde_json::from_value(json!({ "duid": "D1", "type": "NAB" })).unwrap();
        assert_eq!(device.device_type.as_deref(), Some("NAB"));

        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["type"], json!("NAB"));
    }
}
