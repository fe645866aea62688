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

//! Test doubles for exercising the multiplexed client.
//!
//! [`RecordingTransport`] is an in-memory transport which records traffic and lets a
//! test inject inbound messages and failures. [`TestServer`] is a local websocket
//! server for end-to-end tests of [`crate::transport::websocket::WebSocketTransport`].

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{Callback, ErrorResponse, Request, Response},
    },
};
use wiremux_common::runtime::spawn;
use wiremux_core::MUTEX_POISONED;

use crate::{
    error::{TransportError, TransportResult},
    transport::{Transport, TransportListener, TransportListeners},
};

#[derive(Debug, Default)]
struct RecordingState {
    connected: bool,
    sent: Vec<String>,
    connects: usize,
    disconnects: usize,
    failing_connects: usize,
    failing_sends: usize,
}

/// An in-memory [`Transport`] which records every interaction.
#[derive(Debug)]
pub struct RecordingTransport {
    url: Mutex<String>,
    listeners: TransportListeners,
    state: Mutex<RecordingState>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new("mem://recording")
    }
}

impl RecordingTransport {
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            listeners: TransportListeners::default(),
            state: Mutex::new(RecordingState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().expect(MUTEX_POISONED)
    }

    /// Makes the next `count` connect attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.state().failing_connects = count;
    }

    /// Makes the next `count` sends fail.
    pub fn fail_next_sends(&self, count: usize) {
        self.state().failing_sends = count;
    }

    /// Delivers `text` to the listeners as if it arrived from the server.
    pub fn inject_message(&self, text: &str) {
        self.listeners.notify_message(text);
    }

    /// Reports `error` to the listeners as if raised by the read task.
    pub fn inject_error(&self, error: TransportError) {
        self.listeners.notify_error(&error);
    }

    /// Simulates the server dropping the connection.
    pub fn drop_connection(&self) {
        self.state().connected = false;
        self.inject_error(TransportError::Closed("connection reset".to_string()));
    }

    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    /// Returns and clears the recorded sends.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.state().sent)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state().connects
    }

    #[must_use]
    pub fn disconnect_count(&self) -> usize {
        self.state().disconnects
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn connect(&self) -> TransportResult<()> {
        let mut state = self.state();
        state.connects += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut state = self.state();
        if state.connected {
            state.connected = false;
            state.disconnects += 1;
        }
    }

    async fn send(&self, text: &str) -> TransportResult<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(TransportError::Send("broken pipe".to_string()));
        }
        state.sent.push(text.to_string());
        Ok(())
    }

    fn add_listener(&self, listener: Arc<dyn TransportListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn TransportListener>) {
        self.listeners.remove(listener);
    }

    fn url(&self) -> String {
        self.url.lock().expect(MUTEX_POISONED).clone()
    }

    fn set_url(&self, url: &str) {
        *self.url.lock().expect(MUTEX_POISONED) = url.to_string();
    }
}

#[derive(Clone, Debug)]
struct HeaderRecorder(Arc<Mutex<Vec<(String, String)>>>);

impl Callback for HeaderRecorder {
    fn on_request(self, request: &Request, response: Response) -> Result<Response, ErrorResponse> {
        let mut headers = self.0.lock().expect(MUTEX_POISONED);
        headers.clear();
        for (name, value) in request.headers() {
            if let Ok(value) = value.to_str() {
                headers.push((name.to_string(), value.to_string()));
            }
        }
        Ok(response)
    }
}

#[derive(Clone, Debug)]
enum ServerCommand {
    Send(String),
    Close,
}

/// A local websocket server recording inbound text and pushing outbound text.
///
/// Receiving the text `close-now` makes the server close that connection.
#[derive(Debug)]
pub struct TestServer {
    port: u16,
    task: JoinHandle<()>,
    received: Arc<Mutex<Vec<String>>>,
    headers: Arc<Mutex<Vec<(String, String)>>>,
    connections: Arc<AtomicUsize>,
    commands: broadcast::Sender<ServerCommand>,
}

impl TestServer {
    /// Binds to an ephemeral local port and starts accepting connections.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn setup() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let port = listener.local_addr().expect("No local address").port();

        let received = Arc::new(Mutex::new(Vec::new()));
        let headers = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (commands, _) = broadcast::channel(64);

        let task = {
            let received = received.clone();
            let headers = headers.clone();
            let connections = connections.clone();
            let commands = commands.clone();

            spawn(async move {
                // Keep accepting connections
                while let Ok((stream, _)) = listener.accept().await {
                    let callback = HeaderRecorder(headers.clone());
                    let Ok(websocket) = accept_hdr_async(stream, callback).await else {
                        continue;
                    };

                    connections.fetch_add(1, Ordering::SeqCst);
                    spawn(Self::serve(
                        websocket,
                        received.clone(),
                        connections.clone(),
                        commands.subscribe(),
                    ));
                }
            })
        };

        Self {
            port,
            task,
            received,
            headers,
            connections,
            commands,
        }
    }

    async fn serve(
        mut websocket: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
        received: Arc<Mutex<Vec<String>>>,
        connections: Arc<AtomicUsize>,
        mut commands: broadcast::Receiver<ServerCommand>,
    ) {
        loop {
            tokio::select! {
                msg = websocket.next() => match msg {
                    Some(Ok(Message::Text(text))) if text.as_str() == "close-now" => {
                        tracing::debug!("Forcibly closing from server side");
                        let _ = websocket.close(None).await;
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        received.lock().expect(MUTEX_POISONED).push(text.to_string());
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                command = commands.recv() => match command {
                    Ok(ServerCommand::Send(text)) => {
                        if websocket.send(Message::text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(ServerCommand::Close) | Err(broadcast::error::RecvError::Closed) => {
                        let _ = websocket.close(None).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                },
            }
        }
        connections.fetch_sub(1, Ordering::SeqCst);
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Returns the text messages received so far, across all connections.
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        self.received.lock().expect(MUTEX_POISONED).clone()
    }

    pub fn clear_received(&self) {
        self.received.lock().expect(MUTEX_POISONED).clear();
    }

    /// Returns the value of header `name` from the most recent upgrade request.
    #[must_use]
    pub fn last_header(&self, name: &str) -> Option<String> {
        self.headers
            .lock()
            .expect(MUTEX_POISONED)
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// Sends `text` to every open connection.
    pub fn broadcast(&self, text: &str) {
        let _ = self.commands.send(ServerCommand::Send(text.to_string()));
    }

    /// Closes every open connection, the server keeps accepting new ones.
    pub fn close_connections(&self) {
        let _ = self.commands.send(ServerCommand::Close);
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
