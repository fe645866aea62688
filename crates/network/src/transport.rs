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

//! The socket transport contract the multiplexed client drives.
//!
//! A transport owns one physical bidirectional text connection. It reports inbound
//! messages and failures to its registered [`TransportListener`]s from its own read
//! task, and never retries on its own: recovery belongs to the client.

pub mod websocket;

use std::{fmt::Debug, sync::Arc, sync::Mutex};

use async_trait::async_trait;
use wiremux_core::MUTEX_POISONED;

use crate::error::{TransportError, TransportResult};

/// Receives inbound messages and failures from a transport.
pub trait TransportListener: Send + Sync {
    /// Called for every inbound text message.
    fn on_message(&self, text: &str);

    /// Called when the transport detects a failure on an established connection.
    fn on_error(&self, error: TransportError);
}

/// A raw bidirectional text socket.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establishes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established, in which case the
    /// transport is left disconnected.
    async fn connect(&self) -> TransportResult<()>;

    /// Closes the connection and releases its resources. Never fails.
    async fn disconnect(&self);

    /// Writes one text message.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected or the write fails.
    async fn send(&self, text: &str) -> TransportResult<()>;

    fn add_listener(&self, listener: Arc<dyn TransportListener>);

    fn remove_listener(&self, listener: &Arc<dyn TransportListener>);

    fn url(&self) -> String;

    fn set_url(&self, url: &str);
}

/// Listener registry shared by transport implementations.
#[derive(Default)]
pub struct TransportListeners {
    listeners: Mutex<Vec<Arc<dyn TransportListener>>>,
}

impl Debug for TransportListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(TransportListeners))
            .field("count", &self.len())
            .finish()
    }
}

impl TransportListeners {
    pub fn add(&self, listener: Arc<dyn TransportListener>) {
        self.listeners.lock().expect(MUTEX_POISONED).push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn TransportListener>) {
        self.listeners
            .lock()
            .expect(MUTEX_POISONED)
            .retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().expect(MUTEX_POISONED).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `text` to every listener registered at the time of the call.
    pub fn notify_message(&self, text: &str) {
        for listener in self.snapshot() {
            listener.on_message(text);
        }
    }

    /// Delivers `error` to every listener registered at the time of the call.
    pub fn notify_error(&self, error: &TransportError) {
        for listener in self.snapshot() {
            listener.on_error(error.clone());
        }
    }

    // Callbacks run outside the lock so listeners may (un)register themselves
    fn snapshot(&self) -> Vec<Arc<dyn TransportListener>> {
        self.listeners.lock().expect(MUTEX_POISONED).clone()
    }
}
