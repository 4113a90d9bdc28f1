// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request and response bodies for the container REST endpoints.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/container-heartbeat`.
///
/// Both fields are optional; an empty context serializes to `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    /// Problem the user is currently working on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_id: Option<String>,
    /// Language of the current problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl HeartbeatRequest {
    /// Heartbeat carrying a problem context.
    pub fn for_problem(problem_id: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            problem_id: Some(problem_id.into()),
            lang: Some(lang.into()),
        }
    }
}

/// Status reported by the heartbeat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatStatus {
    /// Container is alive and unchanged.
    Ok,
    /// Container was evicted and created again; the client must resynchronize.
    ContainerRecreated,
    /// Status this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Container details attached to a heartbeat response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_url: Option<String>,
}

/// Body returned by `POST /api/container-heartbeat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub status: HeartbeatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_info: Option<ContainerInfo>,
}

impl HeartbeatResponse {
    /// Plain acknowledgement.
    pub fn ok() -> Self {
        Self {
            status: HeartbeatStatus::Ok,
            container_info: None,
        }
    }

    /// Recreation notice, optionally carrying the new container URL.
    pub fn recreated(container_url: Option<String>) -> Self {
        Self {
            status: HeartbeatStatus::ContainerRecreated,
            container_info: Some(ContainerInfo { container_url }),
        }
    }

    /// URL of the (new) container, if the server sent one.
    pub fn container_url(&self) -> Option<&str> {
        self.container_info
            .as_ref()
            .and_then(|info| info.container_url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

/// Body of `POST /api/setup-codebase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupCodebaseRequest {
    pub question_id: String,
    pub language: String,
}

/// Body returned by `POST /api/setup-codebase`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupCodebaseResponse {
    /// Server-issued session token replacing the client's pending one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_url: Option<String>,
}
