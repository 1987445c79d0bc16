// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lifecycle events of the real-time connection.

/// Connection lifecycle event of a shadow subscription.
///
/// Events are informational: the transport reconnects on its own and no
/// event is escalated to the update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The first connection attempt succeeded.
    Success {
        /// Whether the broker resumed a persistent session.
        session_present: bool,
    },
    /// The connection was re-established after an interruption.
    Resumed {
        /// Whether the broker resumed a persistent session.
        session_present: bool,
    },
    /// An established connection was lost; a reconnect follows.
    Interrupted {
        /// Description of the failure.
        error: String,
    },
    /// A connection attempt failed.
    Failed {
        /// Description of the failure.
        error: String,
    },
    /// The connection was closed.
    Closed,
}

impl ConnectionEvent {
    /// Returns `true` if the connection is up after this event.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Resumed { .. })
    }
}

impl std::fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { session_present } => {
                write!(f, "connected (session present: {session_present})")
            }
            Self::Resumed { session_present } => {
                write!(f, "resumed (session present: {session_present})")
            }
            Self::Interrupted { error } => write!(f, "interrupted: {error}"),
            Self::Failed { error } => write!(f, "connection failed: {error}"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Receives the connection events of a shadow subscription.
///
/// Any `Fn(&ConnectionEvent)` closure is a listener.
pub trait ConnectionListener: Send + Sync + 'static {
    /// Called from the transport task for every connection event.
    fn on_event(&self, event: &ConnectionEvent);
}

impl<F> ConnectionListener for F
where
    F: Fn(&ConnectionEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &ConnectionEvent) {
        self(event);
    }
}

/// Listener that only logs: failures at error level, everything else at
/// debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl ConnectionListener for LoggingListener {
    fn on_event(&self, event: &ConnectionEvent) {
        log_event(event);
    }
}

pub(crate) fn log_event(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Failed { error } => {
            tracing::error!(error = %error, "Shadow connection failed");
        }
        other => tracing::debug!(event = %other, "Shadow connection event"),
    }
}
