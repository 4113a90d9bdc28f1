// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Container status push channel.
//!
//! A [`StatusChannel`] holds one WebSocket connection subscribed to a single
//! session token. Every `containerStatus` message for that token replaces the
//! observable [`ContainerStatus`]; messages for other tokens, unknown message
//! types and malformed frames are dropped. There is no reconnection: a lost
//! connection leaves the last observed status in place.
//!
//! The `creating -> ready | error` order is not enforced. Whatever the server
//! sends last is the current status.

use std::sync::Arc;

use codedeck_protocol::{ClientMessage, ContainerState, ContainerStatusUpdate, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SdkError};
use crate::token::SessionToken;

/// Latest known state of the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub state: ContainerState,
    pub message: Option<String>,
    pub container_url: Option<String>,
}

impl From<ContainerStatusUpdate> for ContainerStatus {
    fn from(update: ContainerStatusUpdate) -> Self {
        Self {
            state: update.status,
            message: update.message,
            container_url: update.container_url,
        }
    }
}

type StatusSender = Arc<watch::Sender<Option<ContainerStatus>>>;

/// What happened to an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameOutcome {
    Applied,
    ForeignToken,
    Ignored,
    Malformed,
}

/// Subscription to status updates for one session token.
///
/// Dropping the channel closes the connection.
pub struct StatusChannel {
    token: SessionToken,
    status_rx: watch::Receiver<Option<ContainerStatus>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StatusChannel {
    /// Connect to `url` and subscribe to `token`.
    ///
    /// Connecting happens in the background; failures are logged and leave the
    /// status at `None`. Must be called from within a tokio runtime.
    pub fn open(url: impl Into<String>, token: SessionToken) -> Result<Self> {
        let (tx, _) = watch::channel(None);
        Self::open_with(url.into(), token, Arc::new(tx))
    }

    fn open_with(url: String, token: SessionToken, status_tx: StatusSender) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| SdkError::Runtime(e.to_string()))?;
        let status_rx = status_tx.subscribe();
        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_connection(
            url,
            token.clone(),
            status_tx,
            cancel.clone(),
        ));

        Ok(Self {
            token,
            status_rx,
            cancel,
            task: Some(task),
        })
    }

    /// Follow whatever token is current on `token_rx`.
    ///
    /// Each new token gets a fresh connection; the previous one is closed
    /// first and the status resets to `None`.
    pub fn follow(
        url: impl Into<String>,
        token_rx: watch::Receiver<Option<SessionToken>>,
    ) -> Result<StatusFollower> {
        let runtime = Handle::try_current().map_err(|e| SdkError::Runtime(e.to_string()))?;
        let (tx, status_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_follower(
            url.into(),
            token_rx,
            Arc::new(tx),
            cancel.clone(),
        ));

        Ok(StatusFollower {
            status_rx,
            cancel,
            task: Some(task),
        })
    }

    /// Observable status, `None` until the first matching update.
    pub fn status(&self) -> watch::Receiver<Option<ContainerStatus>> {
        self.status_rx.clone()
    }

    pub fn current(&self) -> Option<ContainerStatus> {
        self.status_rx.borrow().clone()
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Close the connection and wait for it to shut down.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for StatusChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Status channel that re-subscribes whenever the session token changes.
pub struct StatusFollower {
    status_rx: watch::Receiver<Option<ContainerStatus>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StatusFollower {
    pub fn status(&self) -> watch::Receiver<Option<ContainerStatus>> {
        self.status_rx.clone()
    }

    pub fn current(&self) -> Option<ContainerStatus> {
        self.status_rx.borrow().clone()
    }

    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for StatusFollower {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_connection(
    url: String,
    token: SessionToken,
    status_tx: StatusSender,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = connect_async(url.as_str()) => result,
    };
    let mut ws = match connected {
        Ok((ws, _)) => ws,
        Err(e) => {
            warn!(%url, error = %e, "Failed to connect to container status channel");
            return;
        }
    };

    let subscribe = match ClientMessage::subscribe(token.as_str()).to_json() {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "Failed to encode subscribe message");
            return;
        }
    };
    if let Err(e) = ws.send(Message::text(subscribe)).await {
        warn!(error = %e, "Failed to subscribe to container status");
        return;
    }
    info!(token = %token, "Subscribed to container status");

    let mut open = true;
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    apply_frame(text.as_str(), token.as_str(), &status_tx);
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Container status channel closed by server");
                    open = false;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Container status channel failed");
                    open = false;
                    break;
                }
                None => {
                    open = false;
                    break;
                }
            }
        }
    }

    if open {
        if let Err(e) = ws.close(None).await {
            debug!(error = %e, "Failed to close container status channel cleanly");
        }
    }
    debug!(token = %token, "Container status channel closed");
}

async fn run_follower(
    url: String,
    mut token_rx: watch::Receiver<Option<SessionToken>>,
    status_tx: StatusSender,
    cancel: CancellationToken,
) {
    let mut current: Option<StatusChannel> = None;

    loop {
        let token = token_rx.borrow_and_update().clone();
        let unchanged = matches!(
            (&current, &token),
            (Some(channel), Some(token)) if channel.token() == token
        );

        if !unchanged {
            if let Some(previous) = current.take() {
                previous.close().await;
            }
            status_tx.send_replace(None);

            if let Some(token) = token {
                debug!(token = %token, "Following new session token");
                match StatusChannel::open_with(url.clone(), token, status_tx.clone()) {
                    Ok(channel) => current = Some(channel),
                    Err(e) => error!(error = %e, "Failed to open container status channel"),
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = token_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(channel) = current {
        channel.close().await;
    }
}

/// Parse one text frame and publish it if it belongs to `token`.
pub(crate) fn apply_frame(
    text: &str,
    token: &str,
    status_tx: &watch::Sender<Option<ContainerStatus>>,
) -> FrameOutcome {
    let message = match ServerMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Dropping malformed container status message");
            return FrameOutcome::Malformed;
        }
    };

    match message {
        ServerMessage::ContainerStatus(update) if update.token == token => {
            debug!(status = update.status.as_str(), "Container status updated");
            status_tx.send_replace(Some(update.into()));
            FrameOutcome::Applied
        }
        ServerMessage::ContainerStatus(update) => {
            debug!(other_token = %update.token, "Ignoring status for another session");
            FrameOutcome::ForeignToken
        }
        ServerMessage::Unknown => FrameOutcome::Ignored,
    }
}
