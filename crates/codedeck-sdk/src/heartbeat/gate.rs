// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ties the heartbeat scheduler to the user's authentication state.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::HeartbeatScheduler;
use crate::error::{Result, SdkError};

/// Authentication state of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    Authenticated,
    #[default]
    Anonymous,
}

/// Run the scheduler only while the user is authenticated.
///
/// The current value of `auth_rx` is applied immediately. The gate exits, and
/// stops the scheduler, once every sender is dropped.
///
/// Returns [`SdkError::Runtime`] when called outside a tokio runtime.
pub fn spawn_auth_gate(
    scheduler: HeartbeatScheduler,
    mut auth_rx: watch::Receiver<AuthState>,
    interval: Duration,
) -> Result<JoinHandle<()>> {
    let runtime = Handle::try_current().map_err(|e| SdkError::Runtime(e.to_string()))?;
    Ok(runtime.spawn(async move {
        debug!("Auth gate started");
        loop {
            let state = *auth_rx.borrow_and_update();
            match state {
                AuthState::Authenticated if !scheduler.is_running() => {
                    info!("User authenticated, starting heartbeats");
                    if let Err(e) = scheduler.start(interval) {
                        error!(error = %e, "Failed to start heartbeats");
                    }
                }
                AuthState::Authenticated => {}
                AuthState::Anonymous => scheduler.stop(),
            }

            if auth_rx.changed().await.is_err() {
                break;
            }
        }
        scheduler.stop();
        debug!("Auth gate stopped");
    }))
}
