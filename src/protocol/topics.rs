// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device shadow topics.
//!
//! ```text
//! iot/HYD/<client_id>/subscription               → logged only
//! $aws/things/<client_id>/shadow/update/accepted  ┐
//! $aws/things/<client_id>/shadow/get/accepted     ├→ ShadowMessage → merge
//! $aws/things/<client_id>/shadow/update/documents ┘
//! $aws/things/<client_id>/shadow/get              ← "{}" primes the full state
//! ```

/// Kind of an inbound message, derived from its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowTopic {
    /// Generic device subscription channel.
    Subscription,
    /// A shadow update was accepted.
    UpdateAccepted,
    /// Response to a "get shadow" request.
    GetAccepted,
    /// Full previous/current documents of an update.
    UpdateDocuments,
}

impl ShadowTopic {
    /// Returns `true` for topics carrying a shadow document.
    #[must_use]
    pub fn carries_shadow(self) -> bool {
        !matches!(self, Self::Subscription)
    }
}

/// The topics of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowTopics {
    client_id: String,
}

impl ShadowTopics {
    /// Creates the topic set for a device's messaging client id.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    /// Returns the device's client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// `iot/HYD/{client_id}/subscription`
    #[must_use]
    pub fn subscription(&self) -> String {
        format!("iot/HYD/{}/subscription", self.client_id)
    }

    /// `$aws/things/{client_id}/shadow/update/accepted`
    #[must_use]
    pub fn update_accepted(&self) -> String {
        format!("{}/update/accepted", self.shadow_prefix())
    }

    /// `$aws/things/{client_id}/shadow/get/accepted`
    #[must_use]
    pub fn get_accepted(&self) -> String {
        format!("{}/get/accepted", self.shadow_prefix())
    }

    /// `$aws/things/{client_id}/shadow/update/documents`
    #[must_use]
    pub fn update_documents(&self) -> String {
        format!("{}/update/documents", self.shadow_prefix())
    }

    /// `$aws/things/{client_id}/shadow/get`, the topic of the state request.
    #[must_use]
    pub fn get_request(&self) -> String {
        format!("{}/get", self.shadow_prefix())
    }

    /// Returns every topic to subscribe to, in subscription order.
    #[must_use]
    pub fn subscriptions(&self) -> [String; 4] {
        [
            self.subscription(),
            self.update_accepted(),
            self.get_accepted(),
            self.update_documents(),
        ]
    }

    /// Classifies an inbound topic, `None` if it does not belong to this device.
    #[must_use]
    pub fn classify(&self, topic: &str) -> Option<ShadowTopic> {
        if topic == self.subscription() {
            return Some(ShadowTopic::Subscription);
        }
        let suffix = topic
            .strip_prefix(&self.shadow_prefix())?
            .strip_prefix('/')?;
        match suffix {
            "update/accepted" => Some(ShadowTopic::UpdateAccepted),
            "get/accepted" => Some(ShadowTopic::GetAccepted),
            "update/documents" => Some(ShadowTopic::UpdateDocuments),
            _ => None,
        }
    }

    fn shadow_prefix(&self) -> String {
        format!("$aws/things/{}/shadow", self.client_id)
    }
}
