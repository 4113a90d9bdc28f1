// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Codedeck SDK - client-side lifecycle of a per-user coding container.
//!
//! Each user working on a problem gets a remote container. This crate keeps
//! that container alive and tells the client when it is ready.
//!
//! # Features
//!
//! - **Heartbeats**: periodic and activity-driven liveness signals, with
//!   throttling, 401 handling and resync on container recreation
//! - **Status Channel**: WebSocket subscription to `creating` / `ready` /
//!   `error` updates for one session token
//! - **Session Setup**: optimistic start with a pending token, immediate
//!   navigation and delayed provisioning
//! - **Auth Gate**: heartbeats run only while the user is authenticated
//!
//! # Quick Start
//!
//! ```ignore
//! use codedeck_sdk::{LifecycleService, SdkConfig, SetupRequest};
//!
//! #[tokio::main]
//! async fn main() -> codedeck_sdk::Result<()> {
//!     let service = LifecycleService::builder(SdkConfig::from_env()?).build()?;
//!     service.start_heartbeats()?;
//!
//!     let handle = service.setup_codebase(
//!         SetupRequest::new("two-sum").with_question_id("q-17"),
//!     )?;
//!     let mut status = service.follow_status()?.status();
//!
//!     while status.changed().await.is_ok() {
//!         if let Some(s) = status.borrow().as_ref() {
//!             println!("container is {}", s.state.as_str());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CODEDECK_API_URL` | `http://127.0.0.1:3000` | REST base URL |
//! | `CODEDECK_STATUS_URL` | derived | Status channel URL |
//! | `CODEDECK_AUTH_TOKEN` | - | Bearer token for REST calls |
//! | `CODEDECK_STORAGE_PATH` | - | JSON file for durable storage |
//! | `CODEDECK_HEARTBEAT_INTERVAL_MS` | `300000` | Heartbeat interval |
//! | `CODEDECK_ACTIVITY_THROTTLE_MS` | `60000` | Activity throttle |
//! | `CODEDECK_ACTIVITY_BATCH_MS` | `250` | Activity batching delay |
//! | `CODEDECK_PROVISION_DELAY_MS` | `100` | Delay before provisioning |

pub mod activity;
pub mod backend;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod resync;
pub mod service;
pub mod setup;
pub mod status;
pub mod storage;
pub mod token;

pub use activity::{ActivityEvent, ActivityHub, ActivityKind, ActivitySource, Visibility};
pub use backend::LifecycleBackend;
pub use backend::http::HttpBackend;
pub use config::SdkConfig;
pub use error::{Result, SdkError};
pub use heartbeat::gate::{AuthState, spawn_auth_gate};
pub use heartbeat::retry::{FixedDelayRetry, NextTriggerRetry, RetryDecision, RetryPolicy};
pub use heartbeat::{
    ACTIVITY_BATCH_DELAY, ACTIVITY_THROTTLE_INTERVAL, DEFAULT_HEARTBEAT_INTERVAL,
    HeartbeatScheduler, ProblemContext,
};
pub use resync::{ChannelResync, LogOnlyResync, ResyncHandler, ResyncRequired};
pub use service::{LifecycleService, LifecycleServiceBuilder};
pub use setup::{
    Destination, Navigator, Notification, NotificationLevel, Notifier, SetupHandle,
    SetupOrchestrator, SetupOutcome, SetupRequest,
};
pub use status::{ContainerStatus, StatusChannel, StatusFollower};
pub use storage::{ClientStorage, FileStorage, MemoryStorage};
pub use token::SessionToken;

// Re-export wire types callers match on
pub use codedeck_protocol::{ContainerState, HeartbeatStatus};
