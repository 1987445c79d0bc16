// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed documents exchanged with the vendor API.
//!
//! Every document keeps the keys it does not model in a flattened `extra`
//! map, so nothing the cloud returns is lost when it passes through the
//! library.

mod device;
mod requests;
mod schedule;

pub use device::{
    Connectivity, Device, DevicesResponse, Firmware, Irrigation, SensorLink, WateringState, Zone,
};
pub use requests::{
    AppShadowBody, AppShadowRequest, AuthResponse, ManualRunRequest, ManualRunZone,
    RefreshRequest, TokenGrant, User, ZoneEnableRequest,
};
pub use schedule::{Schedule, ScheduleStatus, SchedulesResponse};

/// Serde helpers for scalars the API sends with varying JSON types.
///
/// Every helper reads a raw [`Value`] first, treats `null` like a missing
/// field, and coerces the common alternatives (numbers as strings, floats
/// as integers, `"true"`/`1` as booleans) instead of failing the document.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn stringify(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn truthy(value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Some(true),
                "false" | "0" | "off" | "no" | "" => Some(false),
                _ => None,
            },
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn integer(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
            }
            Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Deserializes a string or number into a `String` (null → empty).
    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(stringify(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    /// Deserializes a string or number into an `Option<String>`.
    pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(stringify(Value::deserialize(deserializer)?))
    }

    /// Deserializes a boolean, number or boolean-like string (null → `false`).
    pub fn boolean<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(truthy(&Value::deserialize(deserializer)?).unwrap_or_default())
    }

    /// Deserializes a boolean, number or boolean-like string into an `Option<bool>`.
    pub fn optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(truthy(&Value::deserialize(deserializer)?))
    }

    /// Deserializes an integer, float (rounded) or numeric string into an `Option<i64>`.
    pub fn optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(integer(&Value::deserialize(deserializer)?))
    }

    /// Deserializes `T`, mapping `null` to `T::default()`.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Renders an arbitrary JSON value as an identifier string.
    pub fn value_to_string(value: &Value) -> Option<String> {
        stringify(value.clone())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn booleans_from_mixed_types() {
            assert_eq!(truthy(&json!(true)), Some(true));
            assert_eq!(truthy(&json!(0)), Some(false));
            assert_eq!(truthy(&json!(1.0)), Some(true));
            assert_eq!(truthy(&json!("True")), Some(true));
            assert_eq!(truthy(&json!("off")), Some(false));
            assert_eq!(truthy(&json!("maybe")), None);
            assert_eq!(truthy(&Value::Null), None);
        }

        #[test]
        fn integers_from_mixed_types() {
            assert_eq!(integer(&json!(-61)), Some(-61));
            assert_eq!(integer(&json!(-61.5)), Some(-62));
            assert_eq!(integer(&json!("-70")), Some(-70));
            assert_eq!(integer(&json!(" -70.2 ")), Some(-70));
            assert_eq!(integer(&json!("weak")), None);
            assert_eq!(integer(&Value::Null), None);
        }

        #[test]
        fn strings_from_mixed_types() {
            assert_eq!(stringify(json!(17)), Some("17".to_string()));
            assert_eq!(stringify(json!("S1")), Some("S1".to_string()));
            assert_eq!(stringify(Value::Null), None);
            assert_eq!(stringify(json!([1])), None);
        }
    }
}
