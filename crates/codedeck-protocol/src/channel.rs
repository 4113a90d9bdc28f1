// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Messages carried by the container status push channel.
//!
//! Messages are internally tagged JSON objects (`{"type": "subscribe", ...}`).

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Messages sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Route status updates for `token` to this connection.
    Subscribe { token: String },
}

impl ClientMessage {
    pub fn subscribe(token: impl Into<String>) -> Self {
        ClientMessage::Subscribe {
            token: token.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Out-of-band container state transition.
    ContainerStatus(ContainerStatusUpdate),
    /// Any message type this client does not handle.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Lifecycle state of a provisioned container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Creating,
    Ready,
    Error,
}

impl ContainerState {
    /// `ready` and `error` end the provisioning flow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContainerState::Ready | ContainerState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Creating => "creating",
            ContainerState::Ready => "ready",
            ContainerState::Error => "error",
        }
    }
}

/// Payload of a `containerStatus` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatusUpdate {
    /// Session token the update belongs to.
    pub token: String,
    pub status: ContainerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_url: Option<String>,
}
