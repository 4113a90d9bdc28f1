// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload was not valid JSON or did not match the message shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type using ProtocolError.
pub type Result<T> = std::result::Result<T, ProtocolError>;
