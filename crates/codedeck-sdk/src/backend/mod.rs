// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK backend implementations.
//!
//! The backend is the only place that talks to the platform's REST API:
//! - `http`: reqwest-based client (default)
//!
//! Tests and embedders substitute their own [`LifecycleBackend`].

pub mod http;

use async_trait::async_trait;
use codedeck_protocol::{
    HeartbeatRequest, HeartbeatResponse, SetupCodebaseRequest, SetupCodebaseResponse,
};

use crate::error::Result;

/// Backend trait for container lifecycle calls.
#[async_trait]
pub trait LifecycleBackend: Send + Sync {
    /// Send a heartbeat. A 401 must surface as [`crate::SdkError::Unauthorized`].
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatResponse>;

    /// Ask the platform to provision a container for a question.
    async fn setup_codebase(&self, request: &SetupCodebaseRequest)
    -> Result<SetupCodebaseResponse>;
}
