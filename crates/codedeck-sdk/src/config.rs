// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK configuration for talking to the codedeck platform.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use codedeck_protocol::STATUS_CHANNEL_PATH;

use crate::error::{Result, SdkError};

/// Default API base URL for local development.
const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

/// SDK configuration.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Base URL of the REST API (default: "http://127.0.0.1:3000")
    pub api_url: String,
    /// WebSocket URL of the status channel (default: derived from `api_url`)
    pub status_url: String,
    /// Bearer token attached to REST calls, if the platform requires one
    pub auth_token: Option<String>,
    /// File backing durable client storage (default: in-memory only)
    pub storage_path: Option<PathBuf>,
    /// Recurring heartbeat interval in milliseconds (default: 300_000)
    pub heartbeat_interval_ms: u64,
    /// Minimum gap between activity-triggered heartbeats (default: 60_000)
    pub activity_throttle_ms: u64,
    /// Delay used to coalesce bursts of activity events (default: 250)
    pub activity_batch_ms: u64,
    /// Delay between navigation and the provisioning request (default: 100)
    pub provision_delay_ms: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl SdkConfig {
    /// Create a configuration for the given API base URL.
    ///
    /// The status channel URL is derived from it (`http` -> `ws`, `https` -> `wss`).
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let status_url = derive_status_url(&api_url);
        Self {
            api_url,
            status_url,
            auth_token: None,
            storage_path: None,
            heartbeat_interval_ms: 300_000,
            activity_throttle_ms: 60_000,
            activity_batch_ms: 250,
            provision_delay_ms: 100,
        }
    }

    /// Create a configuration for local development.
    pub fn localhost() -> Self {
        Self::new(DEFAULT_API_URL)
    }

    /// Load configuration from environment variables.
    ///
    /// # Optional Environment Variables
    /// - `CODEDECK_API_URL` - REST base URL (default: "http://127.0.0.1:3000")
    /// - `CODEDECK_STATUS_URL` - Status channel URL (default: derived from the API URL)
    /// - `CODEDECK_AUTH_TOKEN` - Bearer token for REST calls
    /// - `CODEDECK_STORAGE_PATH` - JSON file used as durable client storage
    /// - `CODEDECK_HEARTBEAT_INTERVAL_MS` - Heartbeat interval (default: 300000)
    /// - `CODEDECK_ACTIVITY_THROTTLE_MS` - Activity throttle (default: 60000)
    /// - `CODEDECK_ACTIVITY_BATCH_MS` - Activity batching delay (default: 250)
    /// - `CODEDECK_PROVISION_DELAY_MS` - Provisioning delay (default: 100)
    pub fn from_env() -> Result<Self> {
        let api_url = env::var("CODEDECK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(SdkError::Config(format!(
                "invalid CODEDECK_API_URL: {} (expected http:// or https://)",
                api_url
            )));
        }

        let mut config = Self::new(api_url);

        if let Ok(status_url) = env::var("CODEDECK_STATUS_URL") {
            config.status_url = status_url;
        }

        config.auth_token = env::var("CODEDECK_AUTH_TOKEN")
            .ok()
            .filter(|v| !v.is_empty());

        config.storage_path = env::var("CODEDECK_STORAGE_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        config.heartbeat_interval_ms = parse_ms("CODEDECK_HEARTBEAT_INTERVAL_MS", 300_000)?;
        config.activity_throttle_ms = parse_ms("CODEDECK_ACTIVITY_THROTTLE_MS", 60_000)?;
        config.activity_batch_ms = parse_ms("CODEDECK_ACTIVITY_BATCH_MS", 250)?;
        config.provision_delay_ms = parse_ms("CODEDECK_PROVISION_DELAY_MS", 100)?;

        if config.heartbeat_interval_ms == 0 {
            return Err(SdkError::Config(
                "CODEDECK_HEARTBEAT_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    /// Set the API base URL and derive the status channel URL from it.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self.status_url = derive_status_url(&self.api_url);
        self
    }

    /// Set the status channel URL.
    pub fn with_status_url(mut self, url: impl Into<String>) -> Self {
        self.status_url = url.into();
        self
    }

    /// Set the bearer token for REST calls.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Persist client storage to the given file.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Set the recurring heartbeat interval.
    pub fn with_heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = interval_ms;
        self
    }

    /// Set the activity throttle interval.
    pub fn with_activity_throttle_ms(mut self, throttle_ms: u64) -> Self {
        self.activity_throttle_ms = throttle_ms;
        self
    }

    /// Set the activity batching delay.
    pub fn with_activity_batch_ms(mut self, batch_ms: u64) -> Self {
        self.activity_batch_ms = batch_ms;
        self
    }

    /// Set the provisioning delay.
    pub fn with_provision_delay_ms(mut self, delay_ms: u64) -> Self {
        self.provision_delay_ms = delay_ms;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn activity_throttle(&self) -> Duration {
        Duration::from_millis(self.activity_throttle_ms)
    }

    pub fn activity_batch(&self) -> Duration {
        Duration::from_millis(self.activity_batch_ms)
    }

    pub fn provision_delay(&self) -> Duration {
        Duration::from_millis(self.provision_delay_ms)
    }
}

fn parse_ms(var: &str, default: u64) -> Result<u64> {
    match env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|e| SdkError::Config(format!("invalid {}: {}", var, e))),
        Err(_) => Ok(default),
    }
}

/// Build the status channel URL that belongs to an API base URL.
pub(crate) fn derive_status_url(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}{}", ws_base, STATUS_CHANNEL_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SdkConfig::default();
        assert_eq!(config.api_url, "http://127.0.0.1:3000");
        assert_eq!(config.status_url, "ws://127.0.0.1:3000/ws/container-status");
        assert_eq!(config.heartbeat_interval_ms, 300_000);
        assert_eq!(config.activity_throttle_ms, 60_000);
        assert_eq!(config.activity_batch_ms, 250);
        assert_eq!(config.provision_delay_ms, 100);
        assert!(config.auth_token.is_none());
        assert!(config.storage_path.is_none());
    }

    #[test]
    fn test_https_derives_wss() {
        let config = SdkConfig::new("https://prep.example.com/");
        assert_eq!(config.api_url, "https://prep.example.com");
        assert_eq!(
            config.status_url,
            "wss://prep.example.com/ws/container-status"
        );
    }

    #[test]
    fn test_builder_pattern() {
        let config = SdkConfig::localhost()
            .with_status_url("ws://10.0.0.5:9000/ws")
            .with_auth_token("secret")
            .with_storage_path("/tmp/codedeck.json")
            .with_heartbeat_interval_ms(1_000)
            .with_activity_throttle_ms(500)
            .with_activity_batch_ms(10)
            .with_provision_delay_ms(5);

        assert_eq!(config.status_url, "ws://10.0.0.5:9000/ws");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(
            config.storage_path,
            Some(PathBuf::from("/tmp/codedeck.json"))
        );
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(config.activity_throttle(), Duration::from_millis(500));
        assert_eq!(config.activity_batch(), Duration::from_millis(10));
        assert_eq!(config.provision_delay(), Duration::from_millis(5));
    }
}
