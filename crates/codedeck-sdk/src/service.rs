// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! One client session's container lifecycle, wired together.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::activity::{ActivityHub, ActivitySource};
use crate::backend::LifecycleBackend;
use crate::backend::http::HttpBackend;
use crate::config::SdkConfig;
use crate::error::Result;
use crate::heartbeat::gate::{AuthState, spawn_auth_gate};
use crate::heartbeat::retry::{NextTriggerRetry, RetryPolicy};
use crate::heartbeat::HeartbeatScheduler;
use crate::resync::{LogOnlyResync, ResyncHandler};
use crate::setup::{
    Navigator, Notifier, SetupHandle, SetupOrchestrator, SetupRequest, TracingNavigator,
    TracingNotifier,
};
use crate::status::{StatusChannel, StatusFollower};
use crate::storage::{ClientStorage, FileStorage, MemoryStorage, load_token, take_redirect_url};
use crate::token::SessionToken;

/// Owns the heartbeat scheduler, the setup orchestrator and the token channel
/// for one client session.
///
/// # Example
///
/// ```ignore
/// let service = LifecycleService::builder(SdkConfig::from_env()?).build()?;
/// service.start_heartbeats()?;
///
/// let handle = service.setup_codebase(SetupRequest::new("two-sum").with_question_id("q-17"))?;
/// let status = service.follow_status()?;
/// ```
pub struct LifecycleService {
    config: SdkConfig,
    storage: Arc<dyn ClientStorage>,
    activity_hub: Option<Arc<ActivityHub>>,
    scheduler: HeartbeatScheduler,
    orchestrator: SetupOrchestrator,
}

/// Builder for [`LifecycleService`]. Unset parts get working defaults.
pub struct LifecycleServiceBuilder {
    config: SdkConfig,
    backend: Option<Arc<dyn LifecycleBackend>>,
    storage: Option<Arc<dyn ClientStorage>>,
    activity: Option<Arc<dyn ActivitySource>>,
    resync: Arc<dyn ResyncHandler>,
    retry: Arc<dyn RetryPolicy>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl LifecycleServiceBuilder {
    pub fn backend(mut self, backend: Arc<dyn LifecycleBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn ClientStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn activity(mut self, activity: Arc<dyn ActivitySource>) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn resync(mut self, resync: Arc<dyn ResyncHandler>) -> Self {
        self.resync = resync;
        self
    }

    pub fn retry(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Build the service.
    ///
    /// Defaults: [`HttpBackend`] for the configured API, [`FileStorage`] when
    /// a storage path is configured (otherwise [`MemoryStorage`]) and a fresh
    /// [`ActivityHub`].
    pub fn build(self) -> Result<LifecycleService> {
        let backend: Arc<dyn LifecycleBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(HttpBackend::new(&self.config)?),
        };

        let storage: Arc<dyn ClientStorage> = match (self.storage, &self.config.storage_path) {
            (Some(storage), _) => storage,
            (None, Some(path)) => Arc::new(FileStorage::open(path.clone())?),
            (None, None) => Arc::new(MemoryStorage::new()),
        };

        let (activity, activity_hub): (Arc<dyn ActivitySource>, _) = match self.activity {
            Some(activity) => (activity, None),
            None => {
                let hub = Arc::new(ActivityHub::new());
                (hub.clone(), Some(hub))
            }
        };

        let scheduler = HeartbeatScheduler::builder(backend.clone(), storage.clone(), activity)
            .resync(self.resync)
            .retry(self.retry)
            .throttle_interval(self.config.activity_throttle())
            .batch_delay(self.config.activity_batch())
            .build();

        let stored = match load_token(storage.as_ref()) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored session token");
                None
            }
        };
        let (token_tx, _) = watch::channel(stored);

        let orchestrator =
            SetupOrchestrator::new(backend, storage.clone(), self.navigator, self.notifier)
                .with_provision_delay(self.config.provision_delay())
                .with_token_sender(Arc::new(token_tx));

        info!(api_url = %self.config.api_url, "Lifecycle service ready");

        Ok(LifecycleService {
            config: self.config,
            storage,
            activity_hub,
            scheduler,
            orchestrator,
        })
    }
}

impl LifecycleService {
    pub fn builder(config: SdkConfig) -> LifecycleServiceBuilder {
        LifecycleServiceBuilder {
            config,
            backend: None,
            storage: None,
            activity: None,
            resync: Arc::new(LogOnlyResync),
            retry: Arc::new(NextTriggerRetry),
            navigator: Arc::new(TracingNavigator),
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &HeartbeatScheduler {
        &self.scheduler
    }

    pub fn orchestrator(&self) -> &SetupOrchestrator {
        &self.orchestrator
    }

    /// The built-in activity hub, unless a custom source was supplied.
    pub fn activity_hub(&self) -> Option<&Arc<ActivityHub>> {
        self.activity_hub.as_ref()
    }

    /// Start heartbeats with the configured interval.
    pub fn start_heartbeats(&self) -> Result<()> {
        self.scheduler.start(self.config.heartbeat_interval())
    }

    /// Start a session and point heartbeats at its problem.
    pub fn setup_codebase(&self, request: SetupRequest) -> Result<SetupHandle> {
        self.scheduler
            .set_problem_context(request.problem_id.clone(), Some(&request.language));
        self.orchestrator.setup_codebase(request)
    }

    /// Status of whatever session is current, re-subscribing as tokens change.
    pub fn follow_status(&self) -> Result<StatusFollower> {
        StatusChannel::follow(self.config.status_url.clone(), self.orchestrator.tokens())
    }

    /// Status of one specific session.
    pub fn open_status(&self, token: SessionToken) -> Result<StatusChannel> {
        StatusChannel::open(self.config.status_url.clone(), token)
    }

    /// Run heartbeats only while `auth_rx` reports an authenticated user.
    pub fn spawn_auth_gate(
        &self,
        auth_rx: watch::Receiver<AuthState>,
    ) -> Result<JoinHandle<()>> {
        spawn_auth_gate(
            self.scheduler.clone(),
            auth_rx,
            self.config.heartbeat_interval(),
        )
    }

    pub fn current_token(&self) -> Result<Option<SessionToken>> {
        load_token(self.storage.as_ref())
    }

    /// Consume the container URL left behind by a resync.
    pub fn take_redirect_url(&self) -> Result<Option<String>> {
        take_redirect_url(self.storage.as_ref())
    }

    pub fn shutdown(&self) {
        self.scheduler.stop();
        info!("Lifecycle service shut down");
    }
}
