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

//! Handler type definitions for the multiplexed client.

use std::sync::Arc;

use crate::error::MuxError;

/// Function type for handling messages routed to a topic.
///
/// Receives the raw message text. Called from the transport's read task, so handlers
/// should return quickly and hand heavier work off to a channel.
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Function type for handling errors raised by the client.
pub type ErrorHandler = Arc<dyn Fn(&MuxError) + Send + Sync>;

/// Identifies a registered error handler so it can be removed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorHandlerId(pub(crate) u64);

/// Creates a channel-based message handler.
///
/// Returns a tuple containing the message handler and a receiver for owned copies of
/// the routed messages.
#[must_use]
pub fn channel_message_handler() -> (MessageHandler, tokio::sync::mpsc::UnboundedReceiver<String>)
{
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let handler = Arc::new(move |msg: &str| {
        if let Err(e) = tx.send(msg.to_string()) {
            tracing::debug!("Failed to send message to channel: {e}");
        }
    });
    (handler, rx)
}

/// Creates a channel-based error handler.
#[must_use]
pub fn channel_error_handler() -> (ErrorHandler, tokio::sync::mpsc::UnboundedReceiver<MuxError>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let handler = Arc::new(move |error: &MuxError| {
        if let Err(e) = tx.send(error.clone()) {
            tracing::debug!("Failed to send error to channel: {e}");
        }
    });
    (handler, rx)
}
