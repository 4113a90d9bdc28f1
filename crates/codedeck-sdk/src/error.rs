// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK-specific error types.

use thiserror::Error;

/// Errors that can occur in the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid environment variable)
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP request could not be sent or its body could not be read
    #[error("http error: {0}")]
    Http(String),

    /// Server answered 401; the session is no longer authenticated
    #[error("unauthorized: session is no longer authenticated")]
    Unauthorized,

    /// Server returned a non-success status
    #[error("server error: {status} - {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// Push channel connection failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Caller supplied an unusable value
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Durable client storage could not be read or written
    #[error("storage error: {0}")]
    Storage(String),

    /// No tokio runtime available, or a background task died
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SdkError::Serialization(err.to_string())
        } else {
            SdkError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<codedeck_protocol::ProtocolError> for SdkError {
    fn from(err: codedeck_protocol::ProtocolError) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SdkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SdkError::Connection(err.to_string())
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        SdkError::Storage(err.to_string())
    }
}

/// Type alias for SDK results.
pub type Result<T> = std::result::Result<T, SdkError>;
