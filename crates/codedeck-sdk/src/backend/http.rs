// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP backend for the platform REST API.

use async_trait::async_trait;
use codedeck_protocol::{
    HEARTBEAT_PATH, HeartbeatRequest, HeartbeatResponse, SETUP_CODEBASE_PATH,
    SetupCodebaseRequest, SetupCodebaseResponse,
};
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::LifecycleBackend;
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};

/// reqwest-based backend.
///
/// No request timeout is configured beyond reqwest's defaults; heartbeats and
/// provisioning calls are best-effort and retried by their callers' triggers.
pub struct HttpBackend {
    client: reqwest::Client,
    api_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    /// Create a new HTTP backend with the given configuration.
    pub fn new(config: &SdkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("codedeck-sdk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "Received response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(SdkError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SdkError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl LifecycleBackend for HttpBackend {
    #[instrument(skip(self, request), fields(problem_id = ?request.problem_id))]
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatResponse> {
        self.post_json(HEARTBEAT_PATH, request).await
    }

    #[instrument(skip(self, request), fields(question_id = %request.question_id, language = %request.language))]
    async fn setup_codebase(
        &self,
        request: &SetupCodebaseRequest,
    ) -> Result<SetupCodebaseResponse> {
        self.post_json(SETUP_CODEBASE_PATH, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedeck_protocol::HeartbeatStatus;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpBackend {
        HttpBackend::new(&SdkConfig::new(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_heartbeat_posts_problem_context() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/container-heartbeat"))
            .and(body_json(serde_json::json!({"problemId": "p1", "lang": "c"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let resp = backend_for(&mock_server)
            .heartbeat(&HeartbeatRequest::for_problem("p1", "c"))
            .await
            .unwrap();

        assert_eq!(resp.status, HeartbeatStatus::Ok);
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_dedicated_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/container-heartbeat"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let err = backend_for(&mock_server)
            .heartbeat(&HeartbeatRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Unauthorized));
    }

    #[tokio::test]
    async fn test_server_error_keeps_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/setup-codebase"))
            .respond_with(ResponseTemplate::new(503).set_body_string("no capacity"))
            .mount(&mock_server)
            .await;

        let err = backend_for(&mock_server)
            .setup_codebase(&SetupCodebaseRequest {
                question_id: "q1".to_string(),
                language: "c".to_string(),
            })
            .await
            .unwrap_err();

        match err {
            SdkError::Server { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "no capacity");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bearer_token_is_attached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/setup-codebase"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"containerToken": "real-1"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = SdkConfig::new(mock_server.uri()).with_auth_token("s3cret");
        let resp = HttpBackend::new(&config)
            .unwrap()
            .setup_codebase(&SetupCodebaseRequest {
                question_id: "q1".to_string(),
                language: "c".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(resp.container_token.as_deref(), Some("real-1"));
    }

    #[tokio::test]
    async fn test_invalid_body_is_serialization_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/container-heartbeat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let err = backend_for(&mock_server)
            .heartbeat(&HeartbeatRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Serialization(_)));
    }
}
