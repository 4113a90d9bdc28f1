// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Codedeck Protocol - wire types for the container lifecycle
//!
//! This crate holds the JSON messages exchanged between a codedeck client and
//! the platform while a per-user coding container is provisioned and kept alive.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    codedeck-protocol                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  REST: POST /api/container-heartbeat, /api/setup-codebase   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Push: subscribe / containerStatus over WebSocket           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Serialization: JSON (serde, camelCase field names)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use codedeck_protocol::channel::{ClientMessage, ServerMessage};
//!
//! let subscribe = ClientMessage::subscribe("tok-1").to_json().unwrap();
//! assert_eq!(subscribe, r#"{"type":"subscribe","token":"tok-1"}"#);
//!
//! let inbound = r#"{"type":"containerStatus","token":"tok-1","status":"ready"}"#;
//! let message = ServerMessage::from_json(inbound).unwrap();
//! assert!(matches!(message, ServerMessage::ContainerStatus(_)));
//! ```

pub mod channel;
pub mod error;
pub mod http;

pub use channel::{ClientMessage, ContainerState, ContainerStatusUpdate, ServerMessage};
pub use error::{ProtocolError, Result};
pub use http::{
    ContainerInfo, HeartbeatRequest, HeartbeatResponse, HeartbeatStatus, SetupCodebaseRequest,
    SetupCodebaseResponse,
};

/// Path of the heartbeat endpoint.
pub const HEARTBEAT_PATH: &str = "/api/container-heartbeat";

/// Path of the provisioning endpoint.
pub const SETUP_CODEBASE_PATH: &str = "/api/setup-codebase";

/// Path of the container status push channel.
pub const STATUS_CHANNEL_PATH: &str = "/ws/container-status";
