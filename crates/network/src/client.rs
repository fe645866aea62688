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

//! The multiplexed websocket client.
//!
//! [`MultiplexClient`] keeps one physical connection alive on behalf of many
//! independent subscribers. Inbound messages are routed to topics by inspecting their
//! content with streaming matchers; failures are recovered by reconnecting and
//! resubscribing every active topic; an optional heartbeat protocol detects silent
//! connections.
//!
//! **Design**:
//! - Cheap-clone handle over shared state.
//! - All management operations run on one sequential worker task, in order.
//! - Dispatch runs on the transport's read task and only reads shared state.
//! - Timers are tasks which enqueue commands for the worker, guarded by cancellation
//!   tokens so a stale timer never acts.

mod dispatch;
mod registry;
mod worker;

use std::{
    fmt::Debug,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use wiremux_common::runtime::spawn;
use wiremux_core::MUTEX_POISONED;

use self::{
    registry::{Registry, TopicManager},
    worker::{Worker, WorkerCommand},
};
use crate::{
    config::{MultiplexConfig, duration_to_millis},
    error::{MuxError, MuxResult, TransportError},
    hook::LifecycleHook,
    matcher::MatcherFactory,
    mode::ConnectionMode,
    transport::{Transport, TransportListener},
    types::{ErrorHandler, ErrorHandlerId, MessageHandler},
};

pub(crate) struct ClientInner {
    transport: Arc<dyn Transport>,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    mode: AtomicU8,
    dispose_token: CancellationToken,
    registry: Registry,
    config: Mutex<MultiplexConfig>,
    has_hook: bool,
    error_handlers: Mutex<Vec<(ErrorHandlerId, ErrorHandler)>>,
    next_error_handler_id: AtomicU64,
    message_count: AtomicU64,
    // Incremented on every successful connect to tag transport errors
    epoch: AtomicU64,
    started: tokio::time::Instant,
    last_heartbeat_nanos: AtomicU64,
}

impl ClientInner {
    fn enqueue(&self, command: WorkerCommand) -> MuxResult<()> {
        self.commands.send(command).map_err(|_| MuxError::Disposed)
    }

    fn ensure_active(&self) -> MuxResult<()> {
        if self.connection_mode().is_disposed() {
            return Err(MuxError::Disposed);
        }
        Ok(())
    }

    fn connection_mode(&self) -> ConnectionMode {
        ConnectionMode::from_atomic(&self.mode)
    }

    fn config(&self) -> MultiplexConfig {
        self.config.lock().expect(MUTEX_POISONED).clone()
    }

    /// Delivers `error` to every registered error handler.
    fn report(&self, error: &MuxError) {
        if error.is_connection_breaking() {
            tracing::warn!("{error}");
        } else {
            tracing::debug!("{error}");
        }

        let handlers: Vec<ErrorHandler> = self
            .error_handlers
            .lock()
            .expect(MUTEX_POISONED)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in handlers {
            handler(error);
        }
    }

    fn record_heartbeat(&self) {
        let nanos = u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.last_heartbeat_nanos.store(nanos, Ordering::SeqCst);
    }

    fn since_last_heartbeat(&self) -> Duration {
        let last = Duration::from_nanos(self.last_heartbeat_nanos.load(Ordering::SeqCst));
        self.started.elapsed().saturating_sub(last)
    }
}

/// Routes transport callbacks into the client without keeping it alive.
struct ClientListener {
    inner: Weak<ClientInner>,
}

impl TransportListener for ClientListener {
    fn on_message(&self, text: &str) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if inner.connection_mode().is_disposed() {
            return;
        }

        inner.message_count.fetch_add(1, Ordering::SeqCst);
        let delivered = dispatch::dispatch(&inner.registry, text);
        tracing::trace!("Dispatched message to {delivered} handler(s)");
    }

    fn on_error(&self, error: TransportError) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let epoch = inner.epoch.load(Ordering::SeqCst);
        if let Err(e) = inner.enqueue(WorkerCommand::TransportError { error, epoch }) {
            tracing::debug!("Dropping transport error: {e}");
        }
    }
}

/// Resolves once the worker has written the message, or failed to.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct SendFuture {
    rx: oneshot::Receiver<MuxResult<()>>,
}

impl Future for SendFuture {
    type Output = MuxResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(MuxError::Disposed)))
    }
}

/// A long-lived connection multiplexing many topic subscriptions.
///
/// Cloning is cheap and every clone drives the same connection. Call
/// [`MultiplexClient::dispose`] to release the connection and background tasks.
#[derive(Clone)]
pub struct MultiplexClient {
    inner: Arc<ClientInner>,
}

impl Debug for MultiplexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(MultiplexClient))
            .field("url", &self.url())
            .field("mode", &self.connection_mode())
            .field("config", &self.inner.config())
            .finish_non_exhaustive()
    }
}

impl MultiplexClient {
    /// Creates a new client over `transport`.
    ///
    /// Registers the client as a transport listener and starts the worker, whose first
    /// command runs [`LifecycleHook::init`]. No connection is made until a subscribe or
    /// send needs one.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::InvalidConfig`] if `config` is invalid, or enables the
    /// heartbeat without a hook.
    pub fn new(
        transport: Arc<dyn Transport>,
        hook: Option<Box<dyn LifecycleHook>>,
        config: MultiplexConfig,
    ) -> MuxResult<Self> {
        config.validate()?;
        if config.heartbeat_interval_ms > 0 && hook.is_none() {
            return Err(MuxError::InvalidConfig(
                "heartbeat_interval_ms requires a lifecycle hook".to_string(),
            ));
        }

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ClientInner {
            transport,
            commands,
            mode: AtomicU8::new(ConnectionMode::Disconnected.as_u8()),
            dispose_token: CancellationToken::new(),
            registry: Registry::default(),
            config: Mutex::new(config),
            has_hook: hook.is_some(),
            error_handlers: Mutex::new(Vec::new()),
            next_error_handler_id: AtomicU64::new(0),
            message_count: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            started: tokio::time::Instant::now(),
            last_heartbeat_nanos: AtomicU64::new(0),
        });

        let listener: Arc<dyn TransportListener> = Arc::new(ClientListener {
            inner: Arc::downgrade(&inner),
        });
        inner.transport.add_listener(listener.clone());

        let client = Self { inner };
        client.inner.enqueue(WorkerCommand::Init)?;

        let worker = Worker::new(client.clone(), hook, commands_rx, listener);
        spawn(worker.run());

        Ok(client)
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// Subscribes `topic`, routing messages accepted by `factory`'s matchers to `handler`.
    ///
    /// The subscription is queued. A topic already subscribed is rejected with
    /// [`MuxError::DuplicateSubscription`] delivered to the error handlers. When
    /// disconnected, the client connects and subscribes every registered topic.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Disposed`] if the client has been disposed.
    pub fn subscribe<F>(
        &self,
        topic: impl Into<String>,
        factory: F,
        handler: MessageHandler,
    ) -> MuxResult<()>
    where
        F: MatcherFactory + 'static,
    {
        self.inner.ensure_active()?;
        self.inner.enqueue(WorkerCommand::Subscribe {
            topic: topic.into(),
            factory: Arc::new(factory),
            handler,
        })
    }

    /// Unsubscribes `topic`. Unknown topics are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Disposed`] if the client has been disposed.
    pub fn unsubscribe(&self, topic: impl Into<String>) -> MuxResult<()> {
        self.inner.ensure_active()?;
        self.inner.enqueue(WorkerCommand::Unsubscribe {
            topic: topic.into(),
        })
    }

    /// Registers a permanent system handler, evaluated before business topics.
    ///
    /// Once a system handler matches a message, no other handler sees it. Takes effect
    /// immediately rather than through the worker.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Disposed`] if the client has been disposed.
    pub fn add_system_message_handler<F>(
        &self,
        topic: impl Into<String>,
        factory: F,
        handler: MessageHandler,
    ) -> MuxResult<()>
    where
        F: MatcherFactory + 'static,
    {
        self.inner.ensure_active()?;
        let manager = TopicManager::new(topic.into(), Arc::new(factory), handler, true);
        tracing::debug!("Added system message handler '{}'", manager.topic());
        self.inner.registry.add_system(Arc::new(manager));
        Ok(())
    }

    /// Queues `text` for sending, connecting first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Disposed`] if the client has been disposed. The returned
    /// future resolves to the outcome of the write.
    pub fn send_async(&self, text: impl Into<String>) -> MuxResult<SendFuture> {
        self.inner.ensure_active()?;
        let (reply, rx) = oneshot::channel();
        self.inner.enqueue(WorkerCommand::Send {
            text: text.into(),
            reply,
        })?;
        Ok(SendFuture { rx })
    }

    /// Queues a disconnect. The client stays disconnected until a subscribe or send
    /// needs the connection again.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Disposed`] if the client has been disposed.
    pub fn disconnect(&self) -> MuxResult<()> {
        self.inner.ensure_active()?;
        self.inner.enqueue(WorkerCommand::Disconnect)
    }

    /// Registers `handler` to receive every error the client raises.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Disposed`] if the client has been disposed.
    pub fn subscribe_error_handler(&self, handler: ErrorHandler) -> MuxResult<ErrorHandlerId> {
        self.inner.ensure_active()?;
        let id = ErrorHandlerId(
            self.inner
                .next_error_handler_id
                .fetch_add(1, Ordering::SeqCst),
        );
        self.inner
            .error_handlers
            .lock()
            .expect(MUTEX_POISONED)
            .push((id, handler));
        Ok(id)
    }

    /// Removes an error handler, returning `false` if it was not registered.
    pub fn unsubscribe_error_handler(&self, id: ErrorHandlerId) -> bool {
        let mut handlers = self.inner.error_handlers.lock().expect(MUTEX_POISONED);
        let len = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != len
    }

    /// Records that a heartbeat response was received now. Ignored once disposed.
    pub fn heartbeat_received(&self) {
        if self.is_disposed() {
            return;
        }
        self.inner.record_heartbeat();
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.inner.config().reconnect_delay()
    }

    /// Sets the reconnect delay, `None` disables automatic reconnection.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::InvalidConfig`] if the delay exceeds the maximum reconnect delay.
    pub fn set_reconnect_delay(&self, delay: Option<Duration>) -> MuxResult<()> {
        self.update_config(|config| config.reconnect_delay_ms = delay.map(duration_to_millis))
    }

    #[must_use]
    pub fn no_message_timeout(&self) -> Duration {
        self.inner.config().no_message_timeout()
    }

    /// Sets the idle window, zero disables the idle watchdog.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Disposed`] if the client has been disposed.
    pub fn set_no_message_timeout(&self, timeout: Duration) -> MuxResult<()> {
        self.update_config(|config| config.no_message_timeout_ms = duration_to_millis(timeout))
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.inner.config().heartbeat_interval()
    }

    /// Sets the client heartbeat interval, zero disables the heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::InvalidConfig`] if `interval` is positive and the client has
    /// no lifecycle hook to supply heartbeat messages.
    pub fn set_heartbeat_interval(&self, interval: Duration) -> MuxResult<()> {
        if !interval.is_zero() && !self.inner.has_hook {
            return Err(MuxError::InvalidConfig(
                "heartbeat interval requires a lifecycle hook".to_string(),
            ));
        }
        self.update_config(|config| config.heartbeat_interval_ms = duration_to_millis(interval))
    }

    #[must_use]
    pub fn no_heartbeat_response_timeout(&self) -> Duration {
        self.inner.config().no_heartbeat_response_timeout()
    }

    /// Sets the heartbeat response window, zero disables the response watchdog.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Disposed`] if the client has been disposed.
    pub fn set_no_heartbeat_response_timeout(&self, timeout: Duration) -> MuxResult<()> {
        self.update_config(|config| {
            config.no_heartbeat_response_timeout_ms = duration_to_millis(timeout);
        })
    }

    // Changes take effect the next time the policies are armed
    fn update_config<F>(&self, update: F) -> MuxResult<()>
    where
        F: FnOnce(&mut MultiplexConfig),
    {
        self.inner.ensure_active()?;
        let mut config = self.inner.config.lock().expect(MUTEX_POISONED);
        let mut updated = config.clone();
        update(&mut updated);
        updated.validate()?;
        *config = updated;
        Ok(())
    }

    #[must_use]
    pub fn connection_mode(&self) -> ConnectionMode {
        self.inner.connection_mode()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_mode().is_connected()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.connection_mode().is_disposed()
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.inner.transport.url()
    }

    /// Returns the number of messages received since the client was created.
    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.inner.message_count.load(Ordering::SeqCst)
    }

    /// Disposes the client. Idempotent.
    ///
    /// Cancels every scheduled task and stops the worker, which disconnects (running the
    /// disconnect hooks) and unregisters from the transport. Queued commands are dropped
    /// and later operations fail with [`MuxError::Disposed`].
    pub fn dispose(&self) {
        let previous = self
            .inner
            .mode
            .swap(ConnectionMode::Disposed.as_u8(), Ordering::SeqCst);
        if ConnectionMode::from_u8(previous).is_disposed() {
            return;
        }

        tracing::debug!("Disposing client");
        self.inner.dispose_token.cancel();
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests;
