// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recursive merge of JSON objects.

use serde_json::{Map, Value};

/// Merges `patch` into `base` and returns `base`.
///
/// For every key of `patch`: when both sides hold an object the two are
/// merged recursively, otherwise the patch value replaces (or adds) the base
/// value. Keys missing from `patch` are left untouched, so merging never
/// removes data. Applying the same patch twice is a no-op.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use smartwater_lib::state::merge;
///
/// let mut base = json!({ "a": 1, "b": { "c": 2 } });
/// let patch = json!({ "b": { "d": 3 } });
///
/// merge(base.as_object_mut().unwrap(), patch.as_object().unwrap());
/// assert_eq!(base, json!({ "a": 1, "b": { "c": 2, "d": 3 } }));
/// ```
pub fn merge<'a>(
    base: &'a mut Map<String, Value>,
    patch: &Map<String, Value>,
) -> &'a mut Map<String, Value> {
    for (key, value) in patch {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge(existing, nested);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
    base
}

/// Merges two arbitrary values with the rule of [`merge`]: objects merge,
/// anything else is replaced by `patch`.
pub fn merge_value(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(existing), Value::Object(nested)) => {
            merge(existing, nested);
        }
        (base, patch) => *base = patch.clone(),
    }
}
