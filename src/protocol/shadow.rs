// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Real-time device shadow subscription over MQTT.
//!
//! The subscription runs until it is cancelled:
//!
//! ```text
//! get_user ──► legacyId ─┐
//! access token ► issuer ─┼► CognitoCredentialsProvider (called on every connect)
//!                        │
//!                        ▼
//! wss://<iot endpoint>/mqtt?X-Amz-...  (SigV4, persistent session)
//!                        │
//!    subscribe ×4, publish "{}" to shadow/get
//!                        │
//!    inbound shadow documents ──► on_message(ShadowMessage)
//!                        │
//!    cancel ──► DISCONNECT ──► return
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport,
};
use secrecy::ExposeSecret;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::jwt;
use crate::error::{Error, ProtocolError};
use crate::event::{ConnectionEvent, ConnectionListener};
use crate::protocol::cognito::{CognitoCredentialsProvider, CredentialsProvider};
use crate::protocol::topics::ShadowTopics;
use crate::protocol::{ApiClient, endpoints, sigv4};
use crate::state::ShadowMessage;

/// Largest packet accepted or sent; full shadow documents exceed the
/// transport's default.
const MAX_PACKET_SIZE: usize = 256 * 1024;

/// Broker the shadow subscription connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEndpoint {
    /// AWS IoT data endpoint over WebSocket, presigned with Cognito credentials.
    AwsIot {
        /// Endpoint host name.
        host: String,
        /// AWS region used for signing.
        region: String,
    },
    /// Plain MQTT over TCP without authentication, for local brokers.
    Tcp {
        /// Broker host.
        host: String,
        /// Broker port.
        port: u16,
    },
}

impl Default for MqttEndpoint {
    fn default() -> Self {
        Self::AwsIot {
            host: endpoints::IOT_ENDPOINT.to_string(),
            region: endpoints::AWS_REGION.to_string(),
        }
    }
}

/// Configuration of the real-time shadow subscription.
///
/// # Examples
///
/// ```
/// use smartwater_lib::protocol::{MqttEndpoint, ShadowConfig};
/// use std::time::Duration;
///
/// let config = ShadowConfig::new()
///     .with_endpoint(MqttEndpoint::Tcp { host: "127.0.0.1".into(), port: 1883 })
///     .with_connection_timeout(Duration::from_secs(2));
///
/// assert_eq!(config.keep_alive(), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ShadowConfig {
    endpoint: MqttEndpoint,
    cognito_url: String,
    keep_alive: Duration,
    connection_timeout: Duration,
    reconnect_delay: Duration,
    disconnect_timeout: Duration,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowConfig {
    /// Default keep-alive interval.
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
    /// Default wait for the first connection acknowledgement.
    pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default pause before reconnecting after a connection error.
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
    /// Default wait for the disconnect to be flushed on cancellation.
    pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration for the production AWS IoT endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: MqttEndpoint::default(),
            cognito_url: format!("https://{}/", endpoints::COGNITO_HOST),
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            connection_timeout: Self::DEFAULT_CONNECTION_TIMEOUT,
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
            disconnect_timeout: Self::DEFAULT_DISCONNECT_TIMEOUT,
        }
    }

    /// Sets the broker endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: MqttEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the Cognito identity service URL.
    #[must_use]
    pub fn with_cognito_url(mut self, url: impl Into<String>) -> Self {
        self.cognito_url = url.into();
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets how long setup waits for the first connection acknowledgement.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the pause before reconnecting after a connection error.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets how long cancellation waits for the disconnect to be sent.
    #[must_use]
    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Returns the broker endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &MqttEndpoint {
        &self.endpoint
    }

    /// Returns the Cognito identity service URL.
    #[must_use]
    pub fn cognito_url(&self) -> &str {
        &self.cognito_url
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Returns the reconnect delay.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Returns the disconnect timeout.
    #[must_use]
    pub fn disconnect_timeout(&self) -> Duration {
        self.disconnect_timeout
    }
}

/// Subscribes to the shadow of one device.
///
/// # Examples
///
/// ```no_run
/// use smartwater_lib::event::LoggingListener;
/// use smartwater_lib::protocol::{ApiConfig, ShadowConfig, ShadowSubscriber};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> smartwater_lib::Result<()> {
/// let api = ApiConfig::new().into_client("access-token", "refresh-token")?;
/// let subscriber = ShadowSubscriber::new(api, ShadowConfig::new());
/// let cancel = CancellationToken::new();
///
/// subscriber
///     .run(
///         "client-id",
///         |message| println!("reported: {:?}", message.reported().collect::<Vec<_>>()),
///         LoggingListener,
///         cancel.child_token(),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ShadowSubscriber {
    api: ApiClient,
    config: ShadowConfig,
}

impl ShadowSubscriber {
    /// Creates a subscriber using the account of `api`.
    #[must_use]
    pub fn new(api: ApiClient, config: ShadowConfig) -> Self {
        Self { api, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Subscribes to the shadow of `client_id` and delivers every shadow
    /// message to `on_message` until `cancel` fires.
    ///
    /// The transport runs in its own task and reconnects on its own after
    /// the first connection; `listener` receives its lifecycle events.
    /// Returns `Ok(())` once cancelled and disconnected.
    ///
    /// # Errors
    ///
    /// Returns error if the user profile or the token issuer cannot be read,
    /// if the first connection is not acknowledged within the connection
    /// timeout, or if the subscriptions cannot be queued. Setup is not
    /// retried.
    pub async fn run<F, L>(
        &self,
        client_id: &str,
        on_message: F,
        listener: L,
        cancel: CancellationToken,
    ) -> Result<(), Error>
    where
        F: Fn(ShadowMessage) + Send + Sync + 'static,
        L: ConnectionListener,
    {
        let user = self.api.get_user().await?;
        let issuer = jwt::identity_pool_issuer(self.api.tokens().access_token().expose_secret())?;
        let provider = CognitoCredentialsProvider::new(
            self.api.clone(),
            self.config.cognito_url.clone(),
            user.legacy_id,
            issuer,
        );

        let topics = ShadowTopics::new(client_id);
        let (client, event_loop) = AsyncClient::new(self.mqtt_options(provider), 10);
        let (connack_tx, connack_rx) = oneshot::channel();

        let mut events = tokio::spawn(handle_shadow_events(
            event_loop,
            topics.clone(),
            on_message,
            listener,
            connack_tx,
            self.config.reconnect_delay,
        ));

        let timeout = self.config.connection_timeout;
        let connack = tokio::select! {
            () = cancel.cancelled() => {
                events.abort();
                return Ok(());
            }
            result = tokio::time::timeout(timeout, connack_rx) => result,
        };
        match connack {
            Ok(Ok(())) => {
                tracing::debug!(client_id = %client_id, "Connected to shadow broker");
            }
            Ok(Err(_)) => {
                events.abort();
                return Err(ProtocolError::ConnectionFailed(
                    "MQTT event loop terminated unexpectedly".to_string(),
                )
                .into());
            }
            Err(_) => {
                events.abort();
                return Err(ProtocolError::ConnectionFailed(format!(
                    "MQTT connection timeout after {}s",
                    timeout.as_secs()
                ))
                .into());
            }
        }

        if let Err(e) = subscribe(&client, &topics).await {
            events.abort();
            return Err(e.into());
        }

        cancel.cancelled().await;
        tracing::debug!(client_id = %client_id, "Shadow subscription cancelled, disconnecting");

        if let Err(e) = client.disconnect().await {
            tracing::warn!(error = %e, "Failed to queue MQTT disconnect");
        }
        if tokio::time::timeout(self.config.disconnect_timeout, &mut events)
            .await
            .is_err()
        {
            tracing::warn!(client_id = %client_id, "MQTT disconnect not flushed in time");
            events.abort();
        }
        Ok(())
    }

    fn mqtt_options<P: CredentialsProvider>(&self, provider: P) -> MqttOptions {
        let session_id = Uuid::new_v4().to_string();

        let mut options = match &self.config.endpoint {
            MqttEndpoint::AwsIot { host, region } => {
                let mut options = MqttOptions::new(&session_id, format!("wss://{host}/mqtt"), 443);
                options.set_transport(Transport::wss_with_default_config());

                let provider = Arc::new(provider);
                let host = host.clone();
                let region = region.clone();
                options.set_request_modifier(move |request| {
                    let provider = Arc::clone(&provider);
                    let host = host.clone();
                    let region = region.clone();
                    async move { presign_request(request, provider.as_ref(), &host, &region).await }
                });
                options
            }
            MqttEndpoint::Tcp { host, port } => MqttOptions::new(&session_id, host, *port),
        };

        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(false);
        options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        options
    }
}

/// Subscribes to the device topics and asks for the full shadow.
async fn subscribe(client: &AsyncClient, topics: &ShadowTopics) -> Result<(), ProtocolError> {
    for topic in topics.subscriptions() {
        client.subscribe(&topic, QoS::AtLeastOnce).await?;
        tracing::debug!(topic = %topic, "Subscribed to shadow topic");
    }

    let get_topic = topics.get_request();
    client
        .publish(&get_topic, QoS::AtLeastOnce, false, "{}")
        .await?;
    tracing::debug!(topic = %get_topic, "Requested shadow state");
    Ok(())
}

/// Replaces the WebSocket request URI with a freshly presigned one.
///
/// Runs on every (re)connect. On failure the request is sent unsigned and
/// the broker's rejection surfaces as a connection event.
async fn presign_request<P: CredentialsProvider>(
    mut request: http::Request<()>,
    provider: &P,
    host: &str,
    region: &str,
) -> http::Request<()> {
    let signed = match provider.credentials().await {
        Ok(credentials) => sigv4::presign_url(host, region, &credentials, Utc::now()),
        Err(e) => Err(e),
    }
    .and_then(|url| {
        url.parse::<http::Uri>()
            .map_err(|e| ProtocolError::Credentials(format!("invalid presigned URL: {e}")))
    });

    match signed {
        Ok(uri) => *request.uri_mut() = uri,
        Err(e) => tracing::error!(error = %e, "Could not presign shadow connection"),
    }
    request
}

/// Drives the MQTT event loop until the client disconnects or is dropped.
async fn handle_shadow_events<F, L>(
    mut event_loop: EventLoop,
    topics: ShadowTopics,
    on_message: F,
    listener: L,
    connack_tx: oneshot::Sender<()>,
    reconnect_delay: Duration,
) where
    F: Fn(ShadowMessage) + Send + Sync + 'static,
    L: ConnectionListener,
{
    let mut connack_tx = Some(connack_tx);
    let mut connected = false;
    let mut was_connected = false;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                let session_present = connack.session_present;
                let event = if was_connected {
                    ConnectionEvent::Resumed { session_present }
                } else {
                    ConnectionEvent::Success { session_present }
                };
                connected = true;
                was_connected = true;
                listener.on_event(&event);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                dispatch_publish(&topics, &publish.topic, &publish.payload, &on_message);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected = false;
                listener.on_event(&ConnectionEvent::Closed);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                listener.on_event(&ConnectionEvent::Closed);
                break;
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                tracing::debug!(client_id = %topics.client_id(), "MQTT client dropped");
                break;
            }
            Err(e) => {
                let error = e.to_string();
                let event = if connected {
                    ConnectionEvent::Interrupted { error }
                } else {
                    ConnectionEvent::Failed { error }
                };
                connected = false;
                listener.on_event(&event);
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

/// Decodes a message of one of the shadow topics and hands it to `on_message`.
fn dispatch_publish<F>(topics: &ShadowTopics, topic: &str, payload: &[u8], on_message: &F)
where
    F: Fn(ShadowMessage),
{
    match topics.classify(topic) {
        Some(kind) if kind.carries_shadow() => match ShadowMessage::from_slice(payload) {
            Ok(message) => {
                tracing::debug!(topic = %topic, ?kind, "Shadow message received");
                on_message(message);
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Ignoring undecodable shadow message");
            }
        },
        Some(_) => {
            tracing::debug!(
                topic = %topic,
                payload = %String::from_utf8_lossy(payload),
                "Subscription message received"
            );
        }
        None => {
            tracing::trace!(topic = %topic, "Ignoring message on unexpected topic");
        }
    }
}
