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

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rstest::rstest;
use tokio::time::{Instant, sleep, sleep_until};
use wiremux_core::MUTEX_POISONED;

use super::*;
use crate::{
    error::HookPhase,
    hook::WorkerContext,
    matcher::{any, value},
    testing::RecordingTransport,
    types::{channel_error_handler, channel_message_handler},
};

#[derive(Clone, Debug, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().expect(MUTEX_POISONED).push(event.into());
    }

    fn snapshot(&self) -> Vec<String> {
        self.0.lock().expect(MUTEX_POISONED).clone()
    }

    fn count(&self, event: &str) -> usize {
        self.snapshot().iter().filter(|e| *e == event).count()
    }
}

#[derive(Debug, Default)]
struct TestHook {
    events: Events,
    heartbeat: Option<String>,
    fail_before_connect: bool,
    fail_after_connect: bool,
    fail_before_disconnect: bool,
}

impl TestHook {
    fn new(events: &Events) -> Self {
        Self {
            events: events.clone(),
            ..Default::default()
        }
    }

    fn with_heartbeat(mut self, message: &str) -> Self {
        self.heartbeat = Some(message.to_string());
        self
    }
}

#[async_trait::async_trait]
impl LifecycleHook for TestHook {
    async fn init(&mut self, _client: &MultiplexClient) -> anyhow::Result<()> {
        self.events.push("init");
        Ok(())
    }

    async fn before_connect(&mut self, ctx: &mut WorkerContext<'_>) -> anyhow::Result<()> {
        self.events.push(ctx.phase().to_string());
        if self.fail_before_connect {
            anyhow::bail!("credentials missing");
        }
        Ok(())
    }

    async fn after_connect(&mut self, ctx: &mut WorkerContext<'_>) -> anyhow::Result<()> {
        self.events.push(ctx.phase().to_string());
        if self.fail_after_connect {
            anyhow::bail!("auth rejected");
        }
        ctx.send("auth").await?;
        Ok(())
    }

    async fn before_disconnect(&mut self, ctx: &mut WorkerContext<'_>) -> anyhow::Result<()> {
        self.events.push(ctx.phase().to_string());
        if self.fail_before_disconnect {
            anyhow::bail!("logout rejected");
        }
        Ok(())
    }

    async fn after_disconnect(&mut self, ctx: &mut WorkerContext<'_>) -> anyhow::Result<()> {
        self.events.push(ctx.phase().to_string());
        Ok(())
    }

    fn subscribe_request(&self, topic: &str) -> Option<String> {
        Some(format!("subscribe:{topic}"))
    }

    fn unsubscribe_request(&self, topic: &str) -> Option<String> {
        Some(format!("unsubscribe:{topic}"))
    }

    fn heartbeat_message(&self) -> Option<String> {
        self.heartbeat.clone()
    }
}

fn create_client(
    transport: &Arc<RecordingTransport>,
    hook: Option<TestHook>,
    config: MultiplexConfig,
) -> MultiplexClient {
    let hook = hook.map(|hook| Box::new(hook) as Box<dyn LifecycleHook>);
    MultiplexClient::new(transport.clone(), hook, config).unwrap()
}

// Lets the worker drain its queue, advancing a paused clock by 1ms
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

fn drain<T>(rx: &mut tokio::sync::mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

fn requests(transport: &RecordingTransport) -> Vec<String> {
    transport
        .sent()
        .into_iter()
        .filter(|text| text != "auth")
        .collect()
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_subscribe_connects_and_sends_request() {
    let transport = Arc::new(RecordingTransport::default());
    let events = Events::default();
    let client = create_client(
        &transport,
        Some(TestHook::new(&events)),
        MultiplexConfig::default(),
    );
    let (handler, mut rx) = channel_message_handler();

    client
        .subscribe("topic1", value("myTopic", "topic1"), handler)
        .unwrap();
    settle().await;

    assert!(client.is_connected());
    assert_eq!(requests(&transport), vec!["subscribe:topic1".to_string()]);
    assert_eq!(
        events.snapshot(),
        vec!["init", "before_connect", "after_connect"]
    );

    let message = r#"{"myTopic":"topic1","payload":"Hello!"}"#;
    transport.inject_message(message);
    transport.inject_message(r#"{"myTopic":"topic2","payload":"Bye!"}"#);

    assert_eq!(drain(&mut rx), vec![message.to_string()]);
    assert_eq!(client.message_count(), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_duplicate_subscribe_sends_once_and_reports() {
    let transport = Arc::new(RecordingTransport::default());
    let client = create_client(
        &transport,
        Some(TestHook::default()),
        MultiplexConfig::default(),
    );
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();
    let (handler, _rx) = channel_message_handler();

    client
        .subscribe("topic1", value("myTopic", "topic1"), handler.clone())
        .unwrap();
    client
        .subscribe("topic1", value("myTopic", "topic1"), handler)
        .unwrap();
    settle().await;

    assert_eq!(requests(&transport), vec!["subscribe:topic1".to_string()]);
    assert_eq!(
        drain(&mut errors),
        vec![MuxError::DuplicateSubscription {
            topic: "topic1".to_string()
        }]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_heartbeat_not_sent_before_interval() {
    let start = Instant::now();
    let transport = Arc::new(RecordingTransport::default());
    let config = MultiplexConfig {
        heartbeat_interval_ms: 200,
        no_heartbeat_response_timeout_ms: 225,
        ..Default::default()
    };
    let client = create_client(
        &transport,
        Some(TestHook::default().with_heartbeat("ping")),
        config,
    );
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();
    let (handler, _rx) = channel_message_handler();

    client.subscribe("topic1", any(), handler).unwrap();

    sleep_until(start + Duration::from_millis(199)).await;
    assert!(!transport.sent().contains(&"ping".to_string()));

    sleep_until(start + Duration::from_millis(201)).await;
    assert_eq!(
        transport.sent().iter().filter(|text| *text == "ping").count(),
        1
    );

    // Response arrives within the window
    sleep_until(start + Duration::from_millis(210)).await;
    client.heartbeat_received();

    sleep_until(start + Duration::from_millis(300)).await;
    assert!(drain(&mut errors).is_empty());
    assert!(client.is_connected());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_heartbeat_timeout_without_response() {
    let start = Instant::now();
    let transport = Arc::new(RecordingTransport::default());
    let config = MultiplexConfig {
        heartbeat_interval_ms: 200,
        no_heartbeat_response_timeout_ms: 225,
        ..Default::default()
    };
    let client = create_client(
        &transport,
        Some(TestHook::default().with_heartbeat("ping")),
        config,
    );
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();
    let (handler, _rx) = channel_message_handler();

    client.subscribe("topic1", any(), handler).unwrap();

    sleep_until(start + Duration::from_millis(224)).await;
    assert!(drain(&mut errors).is_empty());

    sleep_until(start + Duration::from_millis(226)).await;
    assert_eq!(
        drain(&mut errors),
        vec![MuxError::HeartbeatTimeout {
            timeout: Duration::from_millis(225)
        }]
    );
    assert!(!client.is_connected());

    // Reconnection is disabled, so the watchdog stays down
    sleep_until(start + Duration::from_millis(1_000)).await;
    assert!(drain(&mut errors).is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_unsubscribe_unknown_topic_is_silent() {
    let transport = Arc::new(RecordingTransport::default());
    let client = create_client(
        &transport,
        Some(TestHook::default()),
        MultiplexConfig::default(),
    );
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();

    client.unsubscribe("foo").unwrap();
    settle().await;

    assert!(transport.sent().is_empty());
    assert_eq!(transport.connect_count(), 0);
    assert!(drain(&mut errors).is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_delivery() {
    let transport = Arc::new(RecordingTransport::default());
    let client = create_client(
        &transport,
        Some(TestHook::default()),
        MultiplexConfig::default(),
    );
    let (handler, mut rx) = channel_message_handler();

    client
        .subscribe("topic1", value("myTopic", "topic1"), handler)
        .unwrap();
    settle().await;
    client.unsubscribe("topic1").unwrap();
    settle().await;

    transport.inject_message(r#"{"myTopic":"topic1"}"#);

    assert!(drain(&mut rx).is_empty());
    assert_eq!(
        requests(&transport),
        vec!["subscribe:topic1".to_string(), "unsubscribe:topic1".to_string()]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_transport_error_reconnects_and_resubscribes() {
    let start = Instant::now();
    let transport = Arc::new(RecordingTransport::default());
    let events = Events::default();
    let config = MultiplexConfig {
        reconnect_delay_ms: Some(100),
        ..Default::default()
    };
    let client = create_client(&transport, Some(TestHook::new(&events)), config);
    {
        let events = events.clone();
        client
            .subscribe_error_handler(Arc::new(move |_: &MuxError| events.push("error")))
            .unwrap();
    }
    let (handler, _rx) = channel_message_handler();

    client.subscribe("topic1", any(), handler.clone()).unwrap();
    client.subscribe("topic2", any(), handler).unwrap();
    settle().await;
    transport.take_sent();

    transport.inject_error(TransportError::Protocol("reset by peer".to_string()));
    settle().await;

    assert_eq!(events.count("error"), 1);
    assert_eq!(transport.disconnect_count(), 1);
    assert!(!client.is_connected());

    sleep_until(start + Duration::from_millis(99)).await;
    assert!(transport.sent().is_empty());
    assert_eq!(transport.connect_count(), 1);

    sleep_until(start + Duration::from_millis(102)).await;
    assert_eq!(transport.connect_count(), 2);
    assert!(client.is_connected());

    let mut resent = requests(&transport);
    resent.sort();
    assert_eq!(resent, vec!["subscribe:topic1", "subscribe:topic2"]);

    assert_eq!(
        events.snapshot(),
        vec![
            "init",
            "before_connect",
            "after_connect",
            "error",
            "before_disconnect",
            "after_disconnect",
            "before_connect",
            "after_connect",
        ]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_transport_error_while_disconnected_only_reports() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MultiplexConfig {
        reconnect_delay_ms: Some(100),
        ..Default::default()
    };
    let client = create_client(&transport, Some(TestHook::default()), config);
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();
    let (handler, _rx) = channel_message_handler();

    client.subscribe("topic1", any(), handler).unwrap();
    settle().await;
    client.disconnect().unwrap();
    settle().await;

    transport.inject_error(TransportError::Closed("late".to_string()));
    sleep(Duration::from_millis(500)).await;

    assert_eq!(drain(&mut errors).len(), 1);
    assert_eq!(transport.connect_count(), 1);
    assert!(!client.is_connected());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_retries() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MultiplexConfig {
        reconnect_delay_ms: Some(100),
        ..Default::default()
    };
    let client = create_client(&transport, Some(TestHook::default()), config);
    let (handler, _rx) = channel_message_handler();

    client.subscribe("topic1", any(), handler).unwrap();
    settle().await;

    transport.fail_next_connects(2);
    transport.drop_connection();

    sleep(Duration::from_millis(1_000)).await;

    assert_eq!(transport.connect_count(), 4);
    assert!(client.is_connected());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_send_async_connects_and_writes() {
    let transport = Arc::new(RecordingTransport::default());
    let client = create_client(&transport, None, MultiplexConfig::default());

    client.send_async("hello").unwrap().await.unwrap();

    assert!(client.is_connected());
    assert_eq!(transport.sent(), vec!["hello".to_string()]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_send_async_failure_resolves_with_error() {
    let transport = Arc::new(RecordingTransport::default());
    let client = create_client(&transport, None, MultiplexConfig::default());
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();

    client.send_async("hello").unwrap().await.unwrap();
    transport.fail_next_sends(1);

    let error = TransportError::Send("broken pipe".to_string());
    let result = client.send_async("lost").unwrap().await;

    assert_eq!(result, Err(MuxError::Transport(error.clone())));
    assert_eq!(drain(&mut errors), vec![MuxError::Transport(error)]);
    assert!(!client.is_connected());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_dispose_is_idempotent() {
    let transport = Arc::new(RecordingTransport::default());
    let events = Events::default();
    let client = create_client(
        &transport,
        Some(TestHook::new(&events)),
        MultiplexConfig::default(),
    );
    let (handler, mut rx) = channel_message_handler();

    client.subscribe("topic1", any(), handler.clone()).unwrap();
    settle().await;

    client.dispose();
    client.dispose();
    settle().await;

    assert!(client.is_disposed());
    assert_eq!(transport.disconnect_count(), 1);
    assert_eq!(transport.listener_count(), 0);
    assert_eq!(events.count("before_disconnect"), 1);
    assert_eq!(events.count("after_disconnect"), 1);

    assert_eq!(
        client.subscribe("topic2", any(), handler),
        Err(MuxError::Disposed)
    );
    assert_eq!(client.unsubscribe("topic1"), Err(MuxError::Disposed));
    assert!(matches!(client.send_async("hello"), Err(MuxError::Disposed)));
    assert_eq!(
        client.set_no_message_timeout(Duration::from_secs(1)),
        Err(MuxError::Disposed)
    );
    let (error_handler, _errors) = channel_error_handler();
    assert!(matches!(
        client.subscribe_error_handler(error_handler),
        Err(MuxError::Disposed)
    ));
    client.heartbeat_received();

    transport.inject_message("{}");
    assert!(drain(&mut rx).is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_dispose_cancels_timers() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MultiplexConfig {
        heartbeat_interval_ms: 100,
        no_heartbeat_response_timeout_ms: 150,
        no_message_timeout_ms: 150,
        ..Default::default()
    };
    let client = create_client(
        &transport,
        Some(TestHook::default().with_heartbeat("ping")),
        config,
    );
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();

    client.send_async("hello").unwrap().await.unwrap();
    client.dispose();
    transport.take_sent();

    sleep(Duration::from_millis(1_000)).await;

    assert!(transport.sent().is_empty());
    assert!(drain(&mut errors).is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_after_connect_failure_leaves_disconnected() {
    let transport = Arc::new(RecordingTransport::default());
    let hook = TestHook {
        fail_after_connect: true,
        ..Default::default()
    };
    let client = create_client(&transport, Some(hook), MultiplexConfig::default());
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();
    let (handler, _rx) = channel_message_handler();

    client.subscribe("topic1", any(), handler).unwrap();
    settle().await;

    assert!(!client.is_connected());
    assert!(!transport.is_connected());
    assert!(transport.sent().is_empty());
    assert_eq!(
        drain(&mut errors),
        vec![MuxError::Hook {
            phase: HookPhase::AfterConnect,
            message: "auth rejected".to_string(),
        }]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_idle_timeout_reports_and_disconnects() {
    let start = Instant::now();
    let transport = Arc::new(RecordingTransport::default());
    let config = MultiplexConfig {
        no_message_timeout_ms: 100,
        ..Default::default()
    };
    let client = create_client(&transport, None, config);
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();

    client.send_async("hello").unwrap().await.unwrap();

    sleep_until(start + Duration::from_millis(50)).await;
    transport.inject_message("{}");

    sleep_until(start + Duration::from_millis(150)).await;
    assert!(drain(&mut errors).is_empty());
    assert!(client.is_connected());

    sleep_until(start + Duration::from_millis(201)).await;
    assert_eq!(
        drain(&mut errors),
        vec![MuxError::NoMessageTimeout {
            timeout: Duration::from_millis(100)
        }]
    );
    assert!(!client.is_connected());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_missing_heartbeat_message_is_reported() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MultiplexConfig {
        heartbeat_interval_ms: 100,
        ..Default::default()
    };
    let client = create_client(&transport, Some(TestHook::default()), config);
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();

    client.send_async("hello").unwrap().await.unwrap();
    sleep(Duration::from_millis(101)).await;

    assert_eq!(drain(&mut errors), vec![MuxError::MissingHeartbeatMessage]);
    assert!(client.is_connected());
}

#[rstest]
#[tokio::test]
async fn test_heartbeat_requires_hook() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MultiplexConfig {
        heartbeat_interval_ms: 100,
        ..Default::default()
    };

    assert!(matches!(
        MultiplexClient::new(transport.clone(), None, config),
        Err(MuxError::InvalidConfig(_))
    ));

    let client = create_client(&transport, None, MultiplexConfig::default());
    assert!(matches!(
        client.set_heartbeat_interval(Duration::from_millis(100)),
        Err(MuxError::InvalidConfig(_))
    ));
    client.set_heartbeat_interval(Duration::ZERO).unwrap();
    client.dispose();
}

#[rstest]
#[tokio::test]
async fn test_config_setters() {
    let transport = Arc::new(RecordingTransport::default());
    let client = create_client(
        &transport,
        Some(TestHook::default()),
        MultiplexConfig::default(),
    );

    client
        .set_reconnect_delay(Some(Duration::from_millis(250)))
        .unwrap();
    client
        .set_no_message_timeout(Duration::from_secs(5))
        .unwrap();
    client
        .set_heartbeat_interval(Duration::from_secs(10))
        .unwrap();
    client
        .set_no_heartbeat_response_timeout(Duration::from_secs(12))
        .unwrap();

    assert_eq!(client.reconnect_delay(), Some(Duration::from_millis(250)));
    assert_eq!(client.no_message_timeout(), Duration::from_secs(5));
    assert_eq!(client.heartbeat_interval(), Duration::from_secs(10));
    assert_eq!(
        client.no_heartbeat_response_timeout(),
        Duration::from_secs(12)
    );

    client.set_reconnect_delay(None).unwrap();
    assert_eq!(client.reconnect_delay(), None);
    assert_eq!(client.url(), "mem://recording");
    client.dispose();
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_system_handler_takes_precedence() {
    let transport = Arc::new(RecordingTransport::default());
    let client = create_client(
        &transport,
        Some(TestHook::default()),
        MultiplexConfig::default(),
    );
    let (system_handler, mut system_rx) = channel_message_handler();
    let (business_handler, mut business_rx) = channel_message_handler();

    client
        .add_system_message_handler("pong", value("type", "pong"), system_handler)
        .unwrap();
    client.subscribe("all", any(), business_handler).unwrap();
    settle().await;

    transport.inject_message(r#"{"type":"pong"}"#);
    transport.inject_message(r#"{"type":"trade"}"#);

    assert_eq!(drain(&mut system_rx), vec![r#"{"type":"pong"}"#.to_string()]);
    assert_eq!(
        drain(&mut business_rx),
        vec![r#"{"type":"trade"}"#.to_string()]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_unsubscribed_error_handler_is_silent() {
    let transport = Arc::new(RecordingTransport::default());
    let client = create_client(
        &transport,
        Some(TestHook::default()),
        MultiplexConfig::default(),
    );
    let (error_handler, mut errors) = channel_error_handler();
    let id = client.subscribe_error_handler(error_handler).unwrap();

    assert!(client.unsubscribe_error_handler(id));
    assert!(!client.unsubscribe_error_handler(id));

    let (handler, _rx) = channel_message_handler();
    client.subscribe("topic1", any(), handler.clone()).unwrap();
    client.subscribe("topic1", any(), handler).unwrap();
    settle().await;

    assert!(drain(&mut errors).is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_before_connect_failure_skips_transport() {
    let transport = Arc::new(RecordingTransport::default());
    let events = Events::default();
    let hook = TestHook {
        fail_before_connect: true,
        ..TestHook::new(&events)
    };
    let client = create_client(&transport, Some(hook), MultiplexConfig::default());
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();
    let (handler, _rx) = channel_message_handler();

    client.subscribe("topic1", any(), handler).unwrap();
    settle().await;

    assert_eq!(transport.connect_count(), 0);
    assert!(!client.is_connected());
    assert!(transport.sent().is_empty());
    assert_eq!(events.count("after_connect"), 0);
    assert_eq!(
        drain(&mut errors),
        vec![MuxError::Hook {
            phase: HookPhase::BeforeConnect,
            message: "credentials missing".to_string(),
        }]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_before_disconnect_failure_still_disconnects() {
    let transport = Arc::new(RecordingTransport::default());
    let events = Events::default();
    let hook = TestHook {
        fail_before_disconnect: true,
        ..TestHook::new(&events)
    };
    let client = create_client(&transport, Some(hook), MultiplexConfig::default());
    let (error_handler, mut errors) = channel_error_handler();
    client.subscribe_error_handler(error_handler).unwrap();
    let (handler, _rx) = channel_message_handler();

    client.subscribe("topic1", any(), handler).unwrap();
    settle().await;
    client.disconnect().unwrap();
    settle().await;

    assert_eq!(transport.disconnect_count(), 1);
    assert!(!transport.is_connected());
    assert!(!client.is_connected());
    assert_eq!(events.count("after_disconnect"), 1);
    assert_eq!(
        drain(&mut errors),
        vec![MuxError::Hook {
            phase: HookPhase::BeforeDisconnect,
            message: "logout rejected".to_string(),
        }]
    );
}

#[rstest]
#[tokio::test]
async fn test_excessive_reconnect_jitter_rejected_on_create() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MultiplexConfig {
        reconnect_delay_ms: Some(100),
        reconnect_jitter_ms: 120_000,
        ..Default::default()
    };

    let result = MultiplexClient::new(transport, Some(Box::new(TestHook::default())), config);

    assert!(matches!(result, Err(MuxError::InvalidConfig(_))));
}
