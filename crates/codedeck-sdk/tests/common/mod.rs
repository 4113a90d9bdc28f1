// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for codedeck-sdk integration tests.
//!
//! Provides a scripted backend, a registration-counting activity source,
//! recording navigator/notifier and a local status channel server.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codedeck_protocol::{
    ClientMessage, HeartbeatRequest, HeartbeatResponse, SetupCodebaseRequest,
    SetupCodebaseResponse,
};
use codedeck_sdk::activity::{ActivityListener, ListenerId};
use codedeck_sdk::setup::{Destination, Navigator, Notification, Notifier};
use codedeck_sdk::{ActivityEvent, ActivityHub, ActivityKind, ActivitySource, LifecycleBackend};
use codedeck_sdk::{Result, SdkError};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Let spawned tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance the (paused) clock and let everything that woke up run.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}

/// Ordered log of side effects across fixtures.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Scripted answer to one heartbeat.
#[derive(Debug, Clone)]
pub enum HeartbeatReply {
    Ok,
    Recreated(Option<String>),
    Unauthorized,
    Fail,
    /// Answer after a delay.
    Delayed(Duration, Box<HeartbeatReply>),
}

/// Scripted answer to a setup request.
#[derive(Debug, Clone)]
pub enum SetupReply {
    Token(&'static str),
    NoToken,
    Fail(u16),
}

/// Backend that records requests and answers from a script.
///
/// Heartbeats not covered by the script answer `ok`.
pub struct ScriptedBackend {
    heartbeats: Mutex<Vec<HeartbeatRequest>>,
    heartbeat_script: Mutex<VecDeque<HeartbeatReply>>,
    setups: Mutex<Vec<SetupCodebaseRequest>>,
    setup_reply: Mutex<SetupReply>,
    log: EventLog,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Self::with_log(EventLog::default())
    }

    pub fn with_log(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            heartbeats: Mutex::new(Vec::new()),
            heartbeat_script: Mutex::new(VecDeque::new()),
            setups: Mutex::new(Vec::new()),
            setup_reply: Mutex::new(SetupReply::Token("real-token")),
            log,
        })
    }

    pub fn script_heartbeats(&self, replies: impl IntoIterator<Item = HeartbeatReply>) {
        self.heartbeat_script.lock().unwrap().extend(replies);
    }

    pub fn set_setup_reply(&self, reply: SetupReply) {
        *self.setup_reply.lock().unwrap() = reply;
    }

    pub fn heartbeat_count(&self) -> usize {
        self.heartbeats.lock().unwrap().len()
    }

    pub fn heartbeat_requests(&self) -> Vec<HeartbeatRequest> {
        self.heartbeats.lock().unwrap().clone()
    }

    pub fn setup_requests(&self) -> Vec<SetupCodebaseRequest> {
        self.setups.lock().unwrap().clone()
    }

    async fn answer(reply: HeartbeatReply) -> Result<HeartbeatResponse> {
        let mut reply = reply;
        while let HeartbeatReply::Delayed(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }
        match reply {
            HeartbeatReply::Ok => Ok(HeartbeatResponse::ok()),
            HeartbeatReply::Recreated(url) => Ok(HeartbeatResponse::recreated(url)),
            HeartbeatReply::Unauthorized => Err(SdkError::Unauthorized),
            HeartbeatReply::Fail => Err(SdkError::Http("connection refused".to_string())),
            HeartbeatReply::Delayed(..) => unreachable!(),
        }
    }
}

#[async_trait]
impl LifecycleBackend for ScriptedBackend {
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatResponse> {
        self.heartbeats.lock().unwrap().push(request.clone());
        self.log.push("heartbeat");
        let reply = self
            .heartbeat_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(HeartbeatReply::Ok);
        Self::answer(reply).await
    }

    async fn setup_codebase(
        &self,
        request: &SetupCodebaseRequest,
    ) -> Result<SetupCodebaseResponse> {
        self.setups.lock().unwrap().push(request.clone());
        self.log.push(format!("setup:{}", request.question_id));
        match self.setup_reply.lock().unwrap().clone() {
            SetupReply::Token(token) => Ok(SetupCodebaseResponse {
                container_token: Some(token.to_string()),
                container_url: Some("https://containers.test/c1".to_string()),
            }),
            SetupReply::NoToken => Ok(SetupCodebaseResponse::default()),
            SetupReply::Fail(status) => Err(SdkError::Server {
                status,
                message: "provisioning unavailable".to_string(),
            }),
        }
    }
}

/// [`ActivityHub`] that also counts registrations per kind.
#[derive(Default)]
pub struct CountingActivity {
    hub: ActivityHub,
    registrations: Mutex<HashMap<ActivityKind, usize>>,
}

impl CountingActivity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emit(&self, event: ActivityEvent) {
        self.hub.emit(event);
    }

    /// Total `add_listener` calls for `kind`, removals not subtracted.
    pub fn registrations(&self, kind: ActivityKind) -> usize {
        self.registrations
            .lock()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn active(&self, kind: ActivityKind) -> usize {
        self.hub.listener_count(kind)
    }
}

impl ActivitySource for CountingActivity {
    fn add_listener(&self, kind: ActivityKind, listener: ActivityListener) -> ListenerId {
        *self.registrations.lock().unwrap().entry(kind).or_default() += 1;
        self.hub.add_listener(kind, listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.hub.remove_listener(id);
    }
}

pub const ALL_KINDS: [ActivityKind; 5] = [
    ActivityKind::PointerMove,
    ActivityKind::KeyInput,
    ActivityKind::Click,
    ActivityKind::Scroll,
    ActivityKind::VisibilityChange,
];

pub struct RecordingNavigator {
    pub log: EventLog,
    pub destinations: Mutex<Vec<Destination>>,
}

impl RecordingNavigator {
    pub fn new(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            destinations: Mutex::new(Vec::new()),
        })
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: &Destination) {
        self.log.push(format!("navigate:{}", destination.token));
        self.destinations.lock().unwrap().push(destination.clone());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

/// Local status channel server.
pub struct StatusServer {
    pub url: String,
    /// Token of every subscribe message received, in order.
    pub subscriptions: mpsc::UnboundedReceiver<String>,
    /// Token of every connection whose scripted frames were all written.
    pub flushed: mpsc::UnboundedReceiver<String>,
    /// Token of every connection the client closed with a close frame.
    pub closes: mpsc::UnboundedReceiver<String>,
}

/// Start a server that answers each subscription with `script(token)` frames.
pub async fn spawn_status_server<F>(script: F) -> StatusServer
where
    F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (sub_tx, subscriptions) = mpsc::unbounded_channel();
    let (flush_tx, flushed) = mpsc::unbounded_channel();
    let (close_tx, closes) = mpsc::unbounded_channel();
    let script = Arc::new(script);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let sub_tx = sub_tx.clone();
            let flush_tx = flush_tx.clone();
            let close_tx = close_tx.clone();
            let script = script.clone();

            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };

                let token = match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(ClientMessage::Subscribe { token }) => token,
                            Err(_) => return,
                        }
                    }
                    _ => return,
                };
                let _ = sub_tx.send(token.clone());

                for frame in script(&token) {
                    if ws.send(Message::text(frame)).await.is_err() {
                        return;
                    }
                }
                let _ = flush_tx.send(token.clone());

                while let Some(message) = ws.next().await {
                    match message {
                        Ok(Message::Close(_)) => {
                            let _ = close_tx.send(token.clone());
                            break;
                        }
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
            });
        }
    });

    StatusServer {
        url: format!("ws://{}/ws/container-status", addr),
        subscriptions,
        flushed,
        closes,
    }
}

/// A `containerStatus` frame.
pub fn status_frame(token: &str, status: &str) -> String {
    serde_json::json!({
        "type": "containerStatus",
        "token": token,
        "status": status,
    })
    .to_string()
}
