// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud protocol implementations.
//!
//! - [`ApiClient`]: REST client with OAuth token refresh
//! - [`ShadowSubscriber`]: real-time device shadow over MQTT
//! - [`CognitoCredentialsProvider`]: AWS credentials for the MQTT connection
//!
//! The default endpoints live in [`endpoints`]; every client takes them from
//! its configuration so tests can point them at local servers.

mod cognito;
pub mod endpoints;
mod http;
mod shadow;
pub mod sigv4;
mod topics;

pub use cognito::{AwsCredentials, CognitoCredentialsProvider, CredentialsProvider};
pub use http::{ApiClient, ApiConfig};
pub use shadow::{MqttEndpoint, ShadowConfig, ShadowSubscriber};
pub use topics::{ShadowTopic, ShadowTopics};
