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

//! Lifecycle hook supplying protocol specifics to the multiplexed client.
//!
//! The client knows nothing about a venue's wire protocol. A [`LifecycleHook`] provides
//! the text of subscribe, unsubscribe and heartbeat messages, and may run logic around
//! connecting and disconnecting, e.g. authenticating after connect. All hook methods are
//! called from the client's sequential worker, one at a time.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::{
    client::MultiplexClient,
    error::{HookPhase, MuxError, MuxResult},
};

/// Access to the connection handed to hook callbacks.
///
/// Only exists while the worker runs a hook, so writes through it never race the
/// worker's own connection management.
pub struct WorkerContext<'a> {
    client: &'a MultiplexClient,
    phase: HookPhase,
}

impl Debug for WorkerContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(WorkerContext))
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<'a> WorkerContext<'a> {
    pub(crate) const fn new(client: &'a MultiplexClient, phase: HookPhase) -> Self {
        Self { client, phase }
    }

    /// Writes `text` directly to the transport and waits for the write to complete.
    ///
    /// Never connects on its own: during `before_connect` and `after_disconnect` the
    /// transport is not connected and the write fails.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Transport`] if the transport is not connected or the write fails.
    pub async fn send(&mut self, text: &str) -> MuxResult<()> {
        tracing::trace!("Sending during {}: {text}", self.phase);
        self.client
            .transport()
            .send(text)
            .await
            .map_err(MuxError::from)
    }

    /// Returns the lifecycle point being run.
    #[must_use]
    pub const fn phase(&self) -> HookPhase {
        self.phase
    }

    /// Returns the client running the hook.
    #[must_use]
    pub const fn client(&self) -> &MultiplexClient {
        self.client
    }
}

/// Protocol specifics and lifecycle callbacks for a [`MultiplexClient`].
///
/// Every method has a no-op default.
///
/// # Errors
///
/// Errors returned by the callbacks are reported to the client's error handlers as
/// [`MuxError::Hook`]. Errors from `before_connect` and `after_connect` also fail the
/// connect.
#[async_trait]
pub trait LifecycleHook: Send + 'static {
    /// Called once, as the first command the worker runs.
    ///
    /// Typically registers system message handlers (heartbeat responses, errors).
    async fn init(&mut self, _client: &MultiplexClient) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called before the transport connects. An error aborts the connect.
    async fn before_connect(&mut self, _ctx: &mut WorkerContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once the transport has connected. An error aborts the connect and
    /// disconnects the transport.
    async fn after_connect(&mut self, _ctx: &mut WorkerContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called before the transport disconnects. Errors are reported and never block.
    async fn before_disconnect(&mut self, _ctx: &mut WorkerContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after the transport has disconnected. Errors are reported.
    async fn after_disconnect(&mut self, _ctx: &mut WorkerContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Returns the message subscribing `topic`, or `None` if nothing needs sending.
    fn subscribe_request(&self, _topic: &str) -> Option<String> {
        None
    }

    /// Returns the message unsubscribing `topic`, or `None` if nothing needs sending.
    fn unsubscribe_request(&self, _topic: &str) -> Option<String> {
        None
    }

    /// Returns the client heartbeat message.
    fn heartbeat_message(&self) -> Option<String> {
        None
    }
}

/// A hook which does nothing, for protocols without subscribe messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHook;

impl LifecycleHook for NoopHook {}
