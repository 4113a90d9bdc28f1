// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recovery hook for server-side container recreation.
//!
//! When a heartbeat reports `container_recreated`, the new URL is written to
//! storage and a [`ResyncRequired`] event is raised. The default recovery is a
//! full reinitialization of the client session; the handler decides how.

use tokio::sync::mpsc;
use tracing::{info, warn};

/// The platform recreated the container; client state must be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncRequired {
    /// URL of the recreated container (also stored under `container_redirect_url`).
    pub container_url: String,
}

/// Receives resync events.
pub trait ResyncHandler: Send + Sync {
    fn resync_required(&self, event: ResyncRequired);
}

impl<F> ResyncHandler for F
where
    F: Fn(ResyncRequired) + Send + Sync,
{
    fn resync_required(&self, event: ResyncRequired) {
        (self)(event)
    }
}

/// Forwards resync events to a channel, for an outer loop that reinitializes
/// the session.
#[derive(Debug, Clone)]
pub struct ChannelResync {
    tx: mpsc::UnboundedSender<ResyncRequired>,
}

impl ChannelResync {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ResyncRequired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResyncHandler for ChannelResync {
    fn resync_required(&self, event: ResyncRequired) {
        if self.tx.send(event).is_err() {
            warn!("Resync requested but nobody is listening");
        }
    }
}

/// Only logs. Used when the embedder did not install a handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyResync;

impl ResyncHandler for LogOnlyResync {
    fn resync_required(&self, event: ResyncRequired) {
        info!(container_url = %event.container_url, "Container recreated; reload required");
    }
}
