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

//! WebSocket [`Transport`] built on `tokio-tungstenite`.
//!
//! **Design**:
//! - Split read/write halves.
//! - Read half runs in a dedicated task which forwards text to the listeners.
//! - Write half runs in a dedicated task fed by a channel, each write is acknowledged.
//! - No reconnection: the multiplexed client owns recovery.

use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use http::HeaderName;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, client::IntoClientRequest, http::HeaderValue},
};
use tokio_util::sync::CancellationToken;
use wiremux_common::runtime::spawn;
use wiremux_core::{
    MUTEX_POISONED,
    correctness::{check_predicate_false, check_valid_string},
};

use super::{Transport, TransportListener, TransportListeners};
use crate::{
    error::{TransportError, TransportResult},
    tls::install_cryptographic_provider,
};

type MessageWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type MessageReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for a [`WebSocketTransport`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketTransportConfig {
    /// The URL to connect to.
    pub url: String,
    /// The headers sent with the upgrade request.
    pub headers: Vec<(String, String)>,
    /// The timeout (milliseconds) for establishing the connection.
    pub connect_timeout_ms: u64,
}

impl Default for WebSocketTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: Vec::new(),
            connect_timeout_ms: 10_000,
        }
    }
}

impl WebSocketTransportConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or non-ASCII, or the connect timeout is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        check_valid_string(&self.url, "url")?;
        check_predicate_false(
            self.connect_timeout_ms == 0,
            "connect_timeout_ms must be positive",
        )
    }
}

/// Represents a command for the writer task.
#[derive(Debug)]
enum WriterCommand {
    /// Write a message and report the outcome.
    Send {
        message: Message,
        reply: oneshot::Sender<TransportResult<()>>,
    },
}

struct Connection {
    writer_tx: tokio::sync::mpsc::UnboundedSender<WriterCommand>,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
    cancel: CancellationToken,
}

/// `WebSocketTransport` holds at most one websocket connection at a time.
///
/// It assumes a single reader and multiple writers: the read half is moved into a
/// task which calls the registered listeners, and writes from any task are funnelled
/// through a channel into the write task.
pub struct WebSocketTransport {
    config: Mutex<WebSocketTransportConfig>,
    listeners: Arc<TransportListeners>,
    connection: tokio::sync::Mutex<Option<Connection>>,
}

impl Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(WebSocketTransport))
            .field("config", &*self.config.lock().expect(MUTEX_POISONED))
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    #[must_use]
    pub fn new(config: WebSocketTransportConfig) -> Self {
        Self {
            config: Mutex::new(config),
            listeners: Arc::new(TransportListeners::default()),
            connection: tokio::sync::Mutex::new(None),
        }
    }

    /// Returns `true` if a connection is established and its read task is still running.
    pub async fn is_active(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| !c.read_task.is_finished())
    }

    /// Connects with the server creating a tokio-tungstenite websocket stream.
    async fn connect_with_server(
        url: &str,
        headers: Vec<(String, String)>,
    ) -> TransportResult<(MessageWriter, MessageReader)> {
        let mut request = url.into_client_request().map_err(connect_error)?;
        let req_headers = request.headers_mut();

        for (key, val) in headers {
            let header_value = HeaderValue::from_str(&val).map_err(connect_error)?;
            let header_name = key.parse::<HeaderName>().map_err(connect_error)?;
            req_headers.insert(header_name, header_value);
        }

        connect_async(request)
            .await
            .map(|resp| resp.0.split())
            .map_err(connect_error)
    }

    fn spawn_read_task(
        mut reader: MessageReader,
        listeners: Arc<TransportListeners>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tracing::debug!("Started task 'read'");

        spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    next = reader.next() => next,
                };

                match next {
                    Some(Ok(Message::Text(data))) => {
                        tracing::trace!("Received message: {data}");
                        listeners.notify_message(data.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => listeners.notify_message(text),
                        Err(_) => {
                            tracing::trace!("Ignoring non-UTF-8 binary message {} bytes", data.len());
                        }
                    },
                    Some(Ok(Message::Ping(ping))) => tracing::trace!("Received ping: {ping:?}"),
                    Some(Ok(Message::Pong(_))) => tracing::trace!("Received pong"),
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!("Received close message - terminating");
                        let reason = frame.map_or_else(
                            || "no close frame".to_string(),
                            |f| format!("{}: {}", f.code, f.reason),
                        );
                        listeners.notify_error(&TransportError::Closed(reason));
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        tracing::debug!("Received error message - terminating: {e}");
                        listeners.notify_error(&TransportError::from(e));
                        break;
                    }
                    // Internally tungstenite considers the connection closed when polling
                    // for the next message in the stream returns None.
                    None => {
                        tracing::debug!("No message received - terminating");
                        listeners.notify_error(&TransportError::Closed("stream ended".to_string()));
                        break;
                    }
                }
            }

            tracing::debug!("Completed task 'read'");
        })
    }

    fn spawn_write_task(
        mut writer: MessageWriter,
        mut writer_rx: tokio::sync::mpsc::UnboundedReceiver<WriterCommand>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tracing::debug!("Started task 'write'");

        spawn(async move {
            loop {
                let command = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    command = writer_rx.recv() => command,
                };

                match command {
                    Some(WriterCommand::Send { message, reply }) => {
                        let result = writer
                            .send(message)
                            .await
                            .map_err(|e| TransportError::Send(e.to_string()));
                        if let Err(e) = &result {
                            tracing::error!("Failed to send message: {e}");
                        }
                        // Caller may have stopped waiting
                        let _ = reply.send(result);
                    }
                    None => {
                        tracing::debug!("Writer channel closed, terminating writer task");
                        break;
                    }
                }
            }

            // Attempt to close the writer gracefully before exiting,
            // we ignore any error as the writer may already be closed.
            _ = writer.close().await;

            tracing::debug!("Completed task 'write'");
        })
    }

    async fn shutdown(connection: Connection) {
        let Connection {
            writer_tx,
            read_task,
            mut write_task,
            cancel,
        } = connection;

        cancel.cancel();
        drop(writer_tx);

        if tokio::time::timeout(CLOSE_TIMEOUT, &mut write_task)
            .await
            .is_err()
        {
            write_task.abort();
            tracing::debug!("Aborted task 'write'");
        }

        if !read_task.is_finished() {
            read_task.abort();
            tracing::debug!("Aborted task 'read'");
        }
    }
}

fn connect_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Connect(e.to_string())
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> TransportResult<()> {
        let mut connection = self.connection.lock().await;

        if let Some(existing) = connection.take() {
            if !existing.read_task.is_finished() {
                *connection = Some(existing);
                return Ok(());
            }
            Self::shutdown(existing).await;
        }

        install_cryptographic_provider();

        let config = self.config.lock().expect(MUTEX_POISONED).clone();
        config.validate().map_err(connect_error)?;
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        tracing::debug!("Connecting to {}", config.url);

        let (writer, reader) =
            tokio::time::timeout(timeout, Self::connect_with_server(&config.url, config.headers))
                .await
                .map_err(|_| {
                    TransportError::Connect(format!(
                        "connection timed out after {}s",
                        timeout.as_secs_f64()
                    ))
                })??;

        let cancel = CancellationToken::new();
        let (writer_tx, writer_rx) = tokio::sync::mpsc::unbounded_channel();
        let write_task = Self::spawn_write_task(writer, writer_rx, cancel.clone());
        let read_task = Self::spawn_read_task(reader, self.listeners.clone(), cancel.clone());

        *connection = Some(Connection {
            writer_tx,
            read_task,
            write_task,
            cancel,
        });

        tracing::debug!("Connected to {}", config.url);
        Ok(())
    }

    async fn disconnect(&self) {
        let Some(connection) = self.connection.lock().await.take() else {
            return;
        };
        tracing::debug!("Disconnecting");
        Self::shutdown(connection).await;
        tracing::debug!("Disconnected");
    }

    async fn send(&self, text: &str) -> TransportResult<()> {
        let writer_tx = self
            .connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.writer_tx.clone())
            .ok_or(TransportError::NotConnected)?;

        let (reply, rx) = oneshot::channel();
        let command = WriterCommand::Send {
            message: Message::text(text.to_string()),
            reply,
        };
        writer_tx
            .send(command)
            .map_err(|_| TransportError::NotConnected)?;

        rx.await
            .map_err(|_| TransportError::Closed("writer stopped".to_string()))?
    }

    fn add_listener(&self, listener: Arc<dyn TransportListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn TransportListener>) {
        self.listeners.remove(listener);
    }

    fn url(&self) -> String {
        self.config.lock().expect(MUTEX_POISONED).url.clone()
    }

    fn set_url(&self, url: &str) {
        self.config.lock().expect(MUTEX_POISONED).url = url.to_string();
    }
}
