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

//! Multiplexed websocket client runtime for the wiremux workspace.
//!
//! The `wiremux-network` crate keeps one long-lived websocket connection shared by many
//! independent subscribers, routing each inbound message to its subscribers by
//! inspecting the message content:
//!
//! - Streaming field matchers deciding message ownership in a single pass.
//! - A zero-tree JSON field scanner feeding the matchers.
//! - A sequential worker serializing connection management and subscriptions.
//! - Reconnection with resubscription, heartbeat and idle watchdogs.
//! - A `tokio-tungstenite` transport, plus in-memory doubles for tests.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod hook;
pub mod matcher;
pub mod mode;
pub mod pool;
pub mod scan;
pub mod testing;
pub mod tls;
pub mod transport;
pub mod types;
