// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Error types for the multiplexed client and its transports.

use std::time::Duration;

use strum::{AsRefStr, Display};
use thiserror::Error;

/// Result alias for multiplexed client operations.
pub type MuxResult<T> = Result<T, MuxError>;

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// The lifecycle point at which a hook callback failed.
#[derive(Clone, Copy, Debug, Display, AsRefStr, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum HookPhase {
    Init,
    BeforeConnect,
    AfterConnect,
    BeforeDisconnect,
    AfterDisconnect,
}

/// Error type for transport failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport is not currently connected.
    #[error("Transport not connected")]
    NotConnected,

    /// Failed to establish the connection.
    #[error("Transport connect error: {0}")]
    Connect(String),

    /// Failed to write a message.
    #[error("Transport send error: {0}")]
    Send(String),

    /// The remote side closed the connection.
    #[error("Transport closed: {0}")]
    Closed(String),

    /// Protocol level failure reported while reading.
    #[error("Transport protocol error: {0}")]
    Protocol(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Protocol(error.to_string())
    }
}

/// Error type for multiplexed client failures.
///
/// Every variant is delivered to the registered error handlers. Variants for which
/// [`MuxError::is_connection_breaking`] returns `true` additionally drive the
/// disconnect and reconnect sequence when raised while connected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MuxError {
    /// Underlying transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A business subscription already exists for the topic.
    #[error("Duplicate subscription for topic '{topic}'")]
    DuplicateSubscription { topic: String },

    /// A lifecycle hook callback returned an error.
    #[error("Hook error during {phase}: {message}")]
    Hook { phase: HookPhase, message: String },

    /// The heartbeat interval is configured but the hook supplied no message.
    #[error("Heartbeat interval configured but hook returned no heartbeat message")]
    MissingHeartbeatMessage,

    /// No heartbeat response arrived within the configured window.
    #[error("No heartbeat response received within {timeout:?}")]
    HeartbeatTimeout { timeout: Duration },

    /// No message of any kind arrived within the configured window.
    #[error("No message received within {timeout:?}")]
    NoMessageTimeout { timeout: Duration },

    /// The client has been disposed.
    #[error("Client disposed")]
    Disposed,

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A matcher specification could not be built.
    #[error("Invalid matcher: {0}")]
    InvalidMatcher(String),
}

impl MuxError {
    /// Creates a hook error for the given `phase`.
    pub fn hook(phase: HookPhase, error: &anyhow::Error) -> Self {
        Self::Hook {
            phase,
            message: format!("{error:#}"),
        }
    }

    /// Returns `true` if the error means the physical connection can no longer be trusted.
    #[must_use]
    pub const fn is_connection_breaking(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HeartbeatTimeout { .. } | Self::NoMessageTimeout { .. }
        )
    }
}
