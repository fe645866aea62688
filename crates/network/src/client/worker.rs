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

//! The sequential worker owning connection management for a client.

use std::{
    fmt::Debug,
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use wiremux_common::runtime::spawn;

use super::{MultiplexClient, registry::TopicManager};
use crate::{
    backoff::ExponentialBackoff,
    error::{HookPhase, MuxError, MuxResult, TransportError},
    hook::{LifecycleHook, WorkerContext},
    matcher::MatcherFactory,
    mode::ConnectionMode,
    transport::TransportListener,
    types::MessageHandler,
};

/// Represents a command for the worker task.
pub(crate) enum WorkerCommand {
    /// Run the hook's initialization.
    Init,
    Subscribe {
        topic: String,
        factory: Arc<dyn MatcherFactory>,
        handler: MessageHandler,
    },
    Unsubscribe {
        topic: String,
    },
    /// Write a message, connecting first if needed.
    Send {
        text: String,
        reply: oneshot::Sender<MuxResult<()>>,
    },
    Disconnect,
    /// A failure reported by the transport during connection `epoch`.
    TransportError {
        error: TransportError,
        epoch: u64,
    },
    /// Retry a failed reconnect.
    Reconnect,
    HeartbeatTick {
        token: CancellationToken,
        interval: Duration,
    },
    HeartbeatCheck {
        token: CancellationToken,
        timeout: Duration,
    },
    IdleCheck {
        token: CancellationToken,
        timeout: Duration,
        snapshot: u64,
    },
}

impl Debug for WorkerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::Subscribe { topic, .. } => write!(f, "Subscribe({topic})"),
            Self::Unsubscribe { topic } => write!(f, "Unsubscribe({topic})"),
            Self::Send { text, .. } => write!(f, "Send({text})"),
            Self::Disconnect => write!(f, "Disconnect"),
            Self::TransportError { error, epoch } => write!(f, "TransportError({error}, {epoch})"),
            Self::Reconnect => write!(f, "Reconnect"),
            Self::HeartbeatTick { .. } => write!(f, "HeartbeatTick"),
            Self::HeartbeatCheck { .. } => write!(f, "HeartbeatCheck"),
            Self::IdleCheck { snapshot, .. } => write!(f, "IdleCheck({snapshot})"),
        }
    }
}

/// Tokens for the policies armed on connect, cancelled on disconnect.
#[derive(Default)]
struct Timers {
    heartbeat: Option<CancellationToken>,
    heartbeat_check: Option<CancellationToken>,
    idle: Option<CancellationToken>,
}

impl Timers {
    fn cancel(&mut self) {
        for token in [
            self.heartbeat.take(),
            self.heartbeat_check.take(),
            self.idle.take(),
        ]
        .into_iter()
        .flatten()
        {
            token.cancel();
        }
    }
}

pub(crate) struct Worker {
    client: MultiplexClient,
    hook: Option<Box<dyn LifecycleHook>>,
    commands_rx: mpsc::UnboundedReceiver<WorkerCommand>,
    listener: Arc<dyn TransportListener>,
    connected: bool,
    last_connect_attempt: Option<Instant>,
    backoff: Option<ExponentialBackoff>,
    timers: Timers,
}

impl Worker {
    pub(crate) fn new(
        client: MultiplexClient,
        hook: Option<Box<dyn LifecycleHook>>,
        commands_rx: mpsc::UnboundedReceiver<WorkerCommand>,
        listener: Arc<dyn TransportListener>,
    ) -> Self {
        Self {
            client,
            hook,
            commands_rx,
            listener,
            connected: false,
            last_connect_attempt: None,
            backoff: None,
            timers: Timers::default(),
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!("Started task 'worker'");
        let dispose_token = self.client.inner.dispose_token.clone();

        loop {
            let command = tokio::select! {
                biased;
                () = dispose_token.cancelled() => break,
                command = self.commands_rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            tracing::trace!("Handling {command:?}");
            self.handle(command).await;
        }

        self.shutdown().await;
        tracing::debug!("Completed task 'worker'");
    }

    async fn handle(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::Init => self.init().await,
            WorkerCommand::Subscribe {
                topic,
                factory,
                handler,
            } => self.subscribe(topic, factory, handler).await,
            WorkerCommand::Unsubscribe { topic } => self.unsubscribe(&topic).await,
            WorkerCommand::Send { text, reply } => {
                let result = self.send(&text).await;
                if let Err(e) = &result {
                    self.handle_error(e.clone()).await;
                }
                // Caller may have dropped the future
                let _ = reply.send(result);
            }
            WorkerCommand::Disconnect => {
                self.backoff = None;
                self.disconnect().await;
            }
            WorkerCommand::TransportError { error, epoch } => {
                let current = self.client.inner.epoch.load(Ordering::SeqCst);
                if epoch == current {
                    self.handle_error(error.into()).await;
                } else {
                    tracing::debug!("Error from previous connection: {error}");
                    self.client.inner.report(&error.into());
                }
            }
            WorkerCommand::Reconnect => {
                if !self.connected {
                    self.reconnect().await;
                }
            }
            WorkerCommand::HeartbeatTick { token, interval } => {
                if !token.is_cancelled() {
                    self.heartbeat(token, interval).await;
                }
            }
            WorkerCommand::HeartbeatCheck { token, timeout } => {
                if !token.is_cancelled() {
                    self.check_heartbeat(token, timeout).await;
                }
            }
            WorkerCommand::IdleCheck {
                token,
                timeout,
                snapshot,
            } => {
                if !token.is_cancelled() {
                    self.check_idle(token, timeout, snapshot).await;
                }
            }
        }
    }

    async fn init(&mut self) {
        if let Err(e) = self.run_hook(HookPhase::Init).await {
            self.client.inner.report(&e);
        }
    }

    async fn subscribe(
        &mut self,
        topic: String,
        factory: Arc<dyn MatcherFactory>,
        handler: MessageHandler,
    ) {
        let manager = Arc::new(TopicManager::new(topic.clone(), factory, handler, false));
        if !self.client.inner.registry.insert(manager) {
            self.client
                .inner
                .report(&MuxError::DuplicateSubscription { topic });
            return;
        }
        tracing::debug!("Subscribed '{topic}'");

        let result = if self.connected {
            self.send_request(self.subscribe_request(&topic)).await
        } else {
            // Connecting resubscribes every registered topic, this one included
            self.connect_and_resubscribe().await
        };

        if let Err(e) = result {
            self.handle_error(e).await;
        }
    }

    async fn unsubscribe(&mut self, topic: &str) {
        if self.client.inner.registry.remove(topic).is_none() {
            tracing::debug!("Not subscribed '{topic}'");
            return;
        }
        tracing::debug!("Unsubscribed '{topic}'");

        if !self.connected {
            return;
        }

        let request = self
            .hook
            .as_ref()
            .and_then(|hook| hook.unsubscribe_request(topic));
        if let Err(e) = self.send_request(request).await {
            self.handle_error(e).await;
        }
    }

    fn subscribe_request(&self, topic: &str) -> Option<String> {
        self.hook
            .as_ref()
            .and_then(|hook| hook.subscribe_request(topic))
    }

    async fn send_request(&mut self, request: Option<String>) -> MuxResult<()> {
        match request {
            Some(text) => write(&self.client, &text).await,
            None => Ok(()),
        }
    }

    /// Writes `text`, connecting first when disconnected.
    async fn send(&mut self, text: &str) -> MuxResult<()> {
        if !self.connected {
            self.connect_and_resubscribe().await?;
        }
        write(&self.client, text).await
    }

    async fn resubscribe(&mut self) -> MuxResult<()> {
        let topics = self.client.inner.registry.topics();
        tracing::debug!("Resubscribing {} topic(s)", topics.len());

        for topic in topics {
            self.send_request(self.subscribe_request(&topic)).await?;
        }
        Ok(())
    }

    /// Connects and resubscribes. On failure the client is left disconnected.
    async fn connect_and_resubscribe(&mut self) -> MuxResult<()> {
        self.connect().await?;
        if let Err(e) = self.resubscribe().await {
            self.disconnect().await;
            return Err(e);
        }
        Ok(())
    }

    async fn connect(&mut self) -> MuxResult<()> {
        if self.connected {
            return Ok(());
        }
        if self.client.inner.connection_mode().is_disposed() {
            return Err(MuxError::Disposed);
        }

        self.try_connect().await
    }

    async fn try_connect(&mut self) -> MuxResult<()> {
        self.last_connect_attempt = Some(Instant::now());
        tracing::debug!("Connecting to {}", self.client.url());

        self.run_hook(HookPhase::BeforeConnect).await?;
        self.client.inner.transport.connect().await?;

        self.connected = true;
        self.client.inner.epoch.fetch_add(1, Ordering::SeqCst);
        ConnectionMode::transition(
            &self.client.inner.mode,
            ConnectionMode::Disconnected,
            ConnectionMode::Connected,
        );

        if let Err(e) = self.run_hook(HookPhase::AfterConnect).await {
            self.client.inner.transport.disconnect().await;
            self.mark_disconnected();
            return Err(e);
        }

        self.backoff = None;
        self.client.inner.record_heartbeat();
        self.arm_timers();

        tracing::info!("Connected to {}", self.client.url());
        Ok(())
    }

    async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        tracing::debug!("Disconnecting");
        self.timers.cancel();

        if let Err(e) = self.run_hook(HookPhase::BeforeDisconnect).await {
            self.client.inner.report(&e);
        }

        self.client.inner.transport.disconnect().await;
        self.mark_disconnected();

        if let Err(e) = self.run_hook(HookPhase::AfterDisconnect).await {
            self.client.inner.report(&e);
        }
        tracing::info!("Disconnected");
    }

    fn mark_disconnected(&mut self) {
        self.connected = false;
        ConnectionMode::transition(
            &self.client.inner.mode,
            ConnectionMode::Connected,
            ConnectionMode::Disconnected,
        );
    }

    async fn run_hook(&mut self, phase: HookPhase) -> MuxResult<()> {
        let Some(hook) = self.hook.as_mut() else {
            return Ok(());
        };
        let mut ctx = WorkerContext::new(&self.client, phase);

        let result = match phase {
            HookPhase::BeforeConnect => hook.before_connect(&mut ctx).await,
            HookPhase::AfterConnect => hook.after_connect(&mut ctx).await,
            HookPhase::BeforeDisconnect => hook.before_disconnect(&mut ctx).await,
            HookPhase::AfterDisconnect => hook.after_disconnect(&mut ctx).await,
            HookPhase::Init => hook.init(&self.client).await,
        };
        result.map_err(|e| MuxError::hook(phase, &e))
    }

    /// Reports `error`, then recovers the connection if the error breaks it.
    async fn handle_error(&mut self, error: MuxError) {
        self.client.inner.report(&error);

        if error.is_connection_breaking() && self.connected {
            self.disconnect().await;
            self.backoff = match self.client.inner.config().reconnect_backoff() {
                Ok(backoff) => backoff,
                Err(e) => {
                    self.client.inner.report(&e);
                    None
                }
            };
            self.reconnect().await;
        }
    }

    /// Waits out the reconnect delay, then reconnects and resubscribes.
    ///
    /// A failed attempt is reported and a further attempt is queued behind pending
    /// commands with a grown delay.
    async fn reconnect(&mut self) {
        if self.client.inner.config().reconnect_delay().is_none() {
            self.backoff = None;
        }
        let Some(backoff) = self.backoff.as_mut() else {
            tracing::debug!("Reconnection disabled");
            return;
        };

        let delay = backoff.next_duration();
        let deadline = self
            .last_connect_attempt
            .map_or_else(Instant::now, |attempt| attempt + delay);
        tracing::debug!(
            "Reconnecting in {:?}",
            deadline.saturating_duration_since(Instant::now())
        );

        let dispose_token = self.client.inner.dispose_token.clone();
        tokio::select! {
            biased;
            () = dispose_token.cancelled() => return,
            () = tokio::time::sleep_until(deadline) => {}
        }

        match self.connect_and_resubscribe().await {
            Ok(()) => tracing::info!("Reconnect succeeded"),
            Err(e) => {
                tracing::warn!("Reconnect failed: {e}");
                self.client.inner.report(&e);
                if self.client.inner.enqueue(WorkerCommand::Reconnect).is_err() {
                    tracing::debug!("Worker stopped, abandoning reconnect");
                }
            }
        }
    }

    fn arm_timers(&mut self) {
        self.timers.cancel();
        let config = self.client.inner.config();
        let dispose_token = &self.client.inner.dispose_token;

        let interval = config.heartbeat_interval();
        if !interval.is_zero() && self.hook.is_some() {
            let token = dispose_token.child_token();
            self.schedule(
                interval,
                token.clone(),
                WorkerCommand::HeartbeatTick {
                    token: token.clone(),
                    interval,
                },
            );
            self.timers.heartbeat = Some(token);
        }

        let timeout = config.no_heartbeat_response_timeout();
        if !timeout.is_zero() {
            let token = dispose_token.child_token();
            self.schedule(
                timeout,
                token.clone(),
                WorkerCommand::HeartbeatCheck {
                    token: token.clone(),
                    timeout,
                },
            );
            self.timers.heartbeat_check = Some(token);
        }

        let timeout = config.no_message_timeout();
        if !timeout.is_zero() {
            let token = dispose_token.child_token();
            let snapshot = self.client.message_count();
            self.schedule(
                timeout,
                token.clone(),
                WorkerCommand::IdleCheck {
                    token: token.clone(),
                    timeout,
                    snapshot,
                },
            );
            self.timers.idle = Some(token);
        }
    }

    /// Enqueues `command` after `delay` unless `token` is cancelled first.
    fn schedule(&self, delay: Duration, token: CancellationToken, command: WorkerCommand) {
        let commands = self.client.inner.commands.clone();
        spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    // Worker gone means the client was disposed
                    let _ = commands.send(command);
                }
            }
        });
    }

    async fn heartbeat(&mut self, token: CancellationToken, interval: Duration) {
        let message = self.hook.as_ref().and_then(|hook| hook.heartbeat_message());

        match message {
            Some(text) => {
                tracing::trace!("Sending heartbeat");
                if let Err(e) = write(&self.client, &text).await {
                    // Disconnecting cancels `token`, ending the heartbeat
                    self.handle_error(e).await;
                }
            }
            None => self.client.inner.report(&MuxError::MissingHeartbeatMessage),
        }

        if !token.is_cancelled() {
            self.schedule(
                interval,
                token.clone(),
                WorkerCommand::HeartbeatTick { token, interval },
            );
        }
    }

    async fn check_heartbeat(&mut self, token: CancellationToken, timeout: Duration) {
        let elapsed = self.client.inner.since_last_heartbeat();
        if elapsed >= timeout {
            self.handle_error(MuxError::HeartbeatTimeout { timeout }).await;
        } else {
            self.schedule(
                timeout - elapsed,
                token.clone(),
                WorkerCommand::HeartbeatCheck { token, timeout },
            );
        }
    }

    async fn check_idle(&mut self, token: CancellationToken, timeout: Duration, snapshot: u64) {
        let count = self.client.message_count();
        if count == snapshot {
            self.handle_error(MuxError::NoMessageTimeout { timeout }).await;
        } else {
            self.schedule(
                timeout,
                token.clone(),
                WorkerCommand::IdleCheck {
                    token,
                    timeout,
                    snapshot: count,
                },
            );
        }
    }

    async fn shutdown(&mut self) {
        tracing::debug!("Shutting down worker");
        self.timers.cancel();
        self.disconnect().await;
        self.client.inner.transport.remove_listener(&self.listener);

        // Queued commands are dropped, pending sends resolve as disposed
        self.commands_rx.close();
        while self.commands_rx.try_recv().is_ok() {}
    }
}

async fn write(client: &MultiplexClient, text: &str) -> MuxResult<()> {
    tracing::trace!("Sending: {text}");
    client.transport().send(text).await.map_err(MuxError::from)
}
